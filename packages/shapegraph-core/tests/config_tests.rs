//! Options loaded from YAML drive the builtin semantics

mod common;

use common::*;
use pretty_assertions::assert_eq;
use shapegraph_core::config::{ConfigError, SymbolicSizeHandling, UnknownFunctionHandling};
use shapegraph_core::shared::models::{CExpression, CType};
use shapegraph_core::{evaluate, Preset, SmgOptions};
use std::io::Write;
use tempfile::NamedTempFile;

fn load(yaml: &str) -> SmgOptions {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(yaml.as_bytes()).unwrap();
    SmgOptions::from_yaml(file.path().to_str().unwrap()).unwrap()
}

#[test]
fn test_thorough_preset_from_file() {
    let options = load("version: 1\npreset: thorough\n");
    assert_eq!(options, SmgOptions::from_preset(Preset::Thorough));
    assert_eq!(options.unknown_function_handling, UnknownFunctionHandling::Strict);
}

#[test]
fn test_malloc_failure_successor_from_overrides() {
    let options = load(
        r#"
version: 1
preset: balanced
overrides:
  enable_malloc_failure: true
"#,
    );
    let malloc = CExpression::call("malloc", vec![CExpression::int(8)], CType::void_pointer());
    let results = evaluate(&main_state_with(options), &malloc).unwrap();

    assert_eq!(results.len(), 2);
    assert!(results[0].state.pointer_target(&results[0].value).is_some());
    assert!(results[1].value.is_zero());
}

#[test]
fn test_custom_allocator_names() {
    let options = load(
        r#"
version: 1
preset: custom
overrides:
  memory_allocation_functions: [my_alloc]
  symbolic_size_handling: guess_size
"#,
    );
    assert_eq!(options.symbolic_size_handling, SymbolicSizeHandling::GuessSize);

    let alloc = CExpression::call("my_alloc", vec![CExpression::int(4)], CType::void_pointer());
    let state = declare_init(&main_state_with(options), "p", &int_pointer(), alloc);
    let object = target_of(&state, "p");
    assert!(state.spc().is_heap_object(object));
    assert_no_errors(&state);
}

#[test]
fn test_invalid_safe_pattern_is_rejected() {
    let yaml = "version: 1\npreset: balanced\noverrides:\n  safe_unknown_function_patterns: ['(']\n";
    assert!(matches!(SmgOptions::from_yaml_str(yaml), Err(ConfigError::Pattern { .. })));
}

#[test]
fn test_missing_file() {
    assert!(matches!(
        SmgOptions::from_yaml("/nonexistent/shapegraph.yaml"),
        Err(ConfigError::Io(_))
    ));
}
