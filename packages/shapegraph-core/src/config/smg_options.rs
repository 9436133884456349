//! Symbolic memory graph options
//!
//! Shapes how builtin functions and memory accesses are modeled. The option
//! set is owned by the surrounding analysis; this crate only consumes it.

use super::error::{ConfigError, ConfigResult};
use super::preset::Preset;
use regex::Regex;
use serde::{Deserialize, Serialize};

// ═══════════════════════════════════════════════════════════════════════════
// Policy Enums
// ═══════════════════════════════════════════════════════════════════════════

/// How calls to functions without a model are treated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownFunctionHandling {
    /// Abort the path unless the name matches a safe pattern
    Strict,
    /// Return an unknown value, no checks on the arguments
    AssumeSafe,
    /// Check pointer arguments, then return fresh external memory
    AssumeExternalAllocated,
}

/// How allocation sizes that are not concrete numbers are treated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolicSizeHandling {
    /// Hard failure
    Abort,
    /// Use `guess_size` bytes
    GuessSize,
    /// Allocate a region of unknown size; no access to it is out of bounds
    Overapproximate,
    /// Branch on the solver: a zero-size successor and a successor that
    /// assumes a positive size
    SolverSplit,
}

// ═══════════════════════════════════════════════════════════════════════════
// SmgOptions
// ═══════════════════════════════════════════════════════════════════════════

/// Options of the symbolic memory graph domain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmgOptions {
    /// Functions behaving like `malloc(size)`
    pub memory_allocation_functions: Vec<String>,

    /// Functions behaving like `calloc(count, size)`
    pub array_allocation_functions: Vec<String>,

    /// Allocation functions that zero the returned memory
    pub zeroing_allocation_functions: Vec<String>,

    /// Functions behaving like `free(ptr)`
    pub deallocation_functions: Vec<String>,

    /// Functions behaving like `realloc(ptr, size)`
    pub reallocation_functions: Vec<String>,

    /// Stub functions that return externally allocated memory
    pub external_allocation_functions: Vec<String>,

    /// Regex patterns of unknown functions that are safe even in strict mode
    pub safe_unknown_function_patterns: Vec<String>,

    /// Policy for functions without a model
    pub unknown_function_handling: UnknownFunctionHandling,

    /// Policy for non-concrete allocation sizes
    pub symbolic_size_handling: SymbolicSizeHandling,

    /// Guessed allocation size in bytes (1..=4096)
    pub guess_size: u64,

    /// Size in bytes of externally allocated regions (1..=1048576)
    pub external_allocation_size: u64,

    /// Add a successor in which the allocation returns NULL
    pub enable_malloc_failure: bool,

    /// `malloc(0)` returns NULL instead of a valid zero-size region
    pub malloc_zero_returns_null: bool,

    /// Add a successor in which `atexit` fails to register
    pub enable_atexit_failure: bool,

    /// Accept `realloc` with a symbolic size; without it such calls are a
    /// hard failure
    pub track_predicates: bool,

    /// Derive values from partially overlapping numeric edges on read
    pub precise_read: bool,

    /// Dereferencing an `Unknown` pointer value is not reported as an invalid read
    pub unknown_dereference_as_safe: bool,

    /// memcpy with unresolvable operands reports an invalid read
    pub unresolved_copy_is_error: bool,

    /// Report unreachable, still valid heap regions
    pub check_memory_leaks: bool,

    /// Upper bound of concrete assignments enumerated per symbolic split (1..=1024)
    pub max_symbolic_assignments: usize,

    /// When a split hits the bound, havoc the remaining cases instead of aborting
    pub overapproximate_split_overflow: bool,
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

impl SmgOptions {
    /// Validate configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if self.guess_size == 0 || self.guess_size > 4096 {
            return Err(ConfigError::range_with_hint(
                "guess_size",
                self.guess_size,
                1,
                4096,
                "Guessed allocation size must be a small positive byte count",
            ));
        }

        if self.external_allocation_size == 0 || self.external_allocation_size > 1_048_576 {
            return Err(ConfigError::range_with_hint(
                "external_allocation_size",
                self.external_allocation_size,
                1,
                1_048_576,
                "External allocation size must be 1 byte to 1 MiB",
            ));
        }

        if self.max_symbolic_assignments == 0 || self.max_symbolic_assignments > 1024 {
            return Err(ConfigError::range_with_hint(
                "max_symbolic_assignments",
                self.max_symbolic_assignments,
                1,
                1024,
                "Symbolic split bound must be 1-1024",
            ));
        }

        for pattern in &self.safe_unknown_function_patterns {
            Regex::new(pattern).map_err(|source| ConfigError::Pattern {
                pattern: pattern.clone(),
                source,
            })?;
        }

        let allocators = self
            .memory_allocation_functions
            .iter()
            .chain(&self.array_allocation_functions);
        for name in allocators {
            if self.deallocation_functions.contains(name) {
                return Err(ConfigError::ConflictingRoles {
                    function: name.clone(),
                    first: "allocator".to_string(),
                    second: "deallocator".to_string(),
                });
            }
        }

        Ok(())
    }

    /// Compile the safe-function patterns
    pub fn compiled_safe_patterns(&self) -> ConfigResult<Vec<Regex>> {
        self.safe_unknown_function_patterns
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|source| ConfigError::Pattern {
                    pattern: pattern.clone(),
                    source,
                })
            })
            .collect()
    }

    /// Builder: Set unknown_function_handling
    pub fn unknown_function_handling(mut self, v: UnknownFunctionHandling) -> Self {
        self.unknown_function_handling = v;
        self
    }

    /// Builder: Set symbolic_size_handling
    pub fn symbolic_size_handling(mut self, v: SymbolicSizeHandling) -> Self {
        self.symbolic_size_handling = v;
        self
    }

    /// Builder: Set guess_size
    pub fn guess_size(mut self, v: u64) -> Self {
        self.guess_size = v;
        self
    }

    /// Builder: Set external_allocation_size
    pub fn external_allocation_size(mut self, v: u64) -> Self {
        self.external_allocation_size = v;
        self
    }

    /// Builder: Set enable_malloc_failure
    pub fn enable_malloc_failure(mut self, v: bool) -> Self {
        self.enable_malloc_failure = v;
        self
    }

    /// Builder: Set malloc_zero_returns_null
    pub fn malloc_zero_returns_null(mut self, v: bool) -> Self {
        self.malloc_zero_returns_null = v;
        self
    }

    /// Builder: Set enable_atexit_failure
    pub fn enable_atexit_failure(mut self, v: bool) -> Self {
        self.enable_atexit_failure = v;
        self
    }

    /// Builder: Set track_predicates
    pub fn track_predicates(mut self, v: bool) -> Self {
        self.track_predicates = v;
        self
    }

    /// Builder: Set precise_read
    pub fn precise_read(mut self, v: bool) -> Self {
        self.precise_read = v;
        self
    }

    /// Builder: Set unknown_dereference_as_safe
    pub fn unknown_dereference_as_safe(mut self, v: bool) -> Self {
        self.unknown_dereference_as_safe = v;
        self
    }

    /// Builder: Set unresolved_copy_is_error
    pub fn unresolved_copy_is_error(mut self, v: bool) -> Self {
        self.unresolved_copy_is_error = v;
        self
    }

    /// Builder: Set check_memory_leaks
    pub fn check_memory_leaks(mut self, v: bool) -> Self {
        self.check_memory_leaks = v;
        self
    }

    /// Builder: Set max_symbolic_assignments
    pub fn max_symbolic_assignments(mut self, v: usize) -> Self {
        self.max_symbolic_assignments = v;
        self
    }

    /// Builder: Set overapproximate_split_overflow
    pub fn overapproximate_split_overflow(mut self, v: bool) -> Self {
        self.overapproximate_split_overflow = v;
        self
    }

    /// Builder: Add a malloc-like allocation function
    pub fn add_allocation_function(mut self, name: impl Into<String>) -> Self {
        self.memory_allocation_functions.push(name.into());
        self
    }

    /// Builder: Add a safe unknown-function pattern
    pub fn add_safe_function_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.safe_unknown_function_patterns.push(pattern.into());
        self
    }

    /// Create from preset
    pub fn from_preset(preset: Preset) -> Self {
        let base = Self {
            memory_allocation_functions: names(&["malloc", "__kmalloc", "kmalloc"]),
            array_allocation_functions: names(&["calloc"]),
            zeroing_allocation_functions: names(&["calloc", "kzalloc"]),
            deallocation_functions: names(&["free"]),
            reallocation_functions: names(&["realloc"]),
            external_allocation_functions: names(&["ext_allocation"]),
            safe_unknown_function_patterns: names(&["^abort$", "^exit$", "^printf$", "^puts$"]),
            unknown_function_handling: UnknownFunctionHandling::AssumeSafe,
            symbolic_size_handling: SymbolicSizeHandling::SolverSplit,
            guess_size: 2,
            external_allocation_size: 64,
            enable_malloc_failure: false,
            malloc_zero_returns_null: false,
            enable_atexit_failure: false,
            track_predicates: false,
            precise_read: true,
            unknown_dereference_as_safe: false,
            unresolved_copy_is_error: false,
            check_memory_leaks: true,
            max_symbolic_assignments: 16,
            overapproximate_split_overflow: true,
        };

        let lenient = preset.is_lenient();
        let failures = preset.models_call_failures();
        Self {
            safe_unknown_function_patterns: match preset {
                Preset::Custom => vec![],
                _ => base.safe_unknown_function_patterns,
            },
            unknown_function_handling: preset.unknown_function_handling(),
            symbolic_size_handling: preset.symbolic_size_handling(),
            enable_malloc_failure: failures,
            enable_atexit_failure: failures,
            track_predicates: failures,
            unresolved_copy_is_error: failures,
            overapproximate_split_overflow: !failures,
            precise_read: !lenient,
            unknown_dereference_as_safe: lenient,
            max_symbolic_assignments: preset.max_symbolic_assignments(),
            ..base
        }
    }
}

impl Default for SmgOptions {
    fn default() -> Self {
        Self::from_preset(Preset::Balanced)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_smg_options_validation() {
        let config = SmgOptions::from_preset(Preset::Balanced);
        assert!(config.validate().is_ok());

        let config = SmgOptions::from_preset(Preset::Fast).guess_size(0);
        assert!(config.validate().is_err());

        let config = SmgOptions::default().max_symbolic_assignments(5000);
        assert!(matches!(config.validate(), Err(ConfigError::Range { .. })));
    }

    #[test]
    fn test_smg_options_presets() {
        let fast = SmgOptions::from_preset(Preset::Fast);
        assert_eq!(fast.symbolic_size_handling, SymbolicSizeHandling::GuessSize);
        assert!(!fast.precise_read);

        let balanced = SmgOptions::from_preset(Preset::Balanced);
        assert_eq!(
            balanced.unknown_function_handling,
            UnknownFunctionHandling::AssumeSafe
        );
        assert!(balanced.check_memory_leaks);
        assert!(!balanced.enable_malloc_failure);

        let thorough = SmgOptions::from_preset(Preset::Thorough);
        assert_eq!(
            thorough.unknown_function_handling,
            UnknownFunctionHandling::Strict
        );
        assert!(thorough.enable_malloc_failure);
        assert!(thorough.track_predicates);
    }

    #[test]
    fn test_from_preset_follows_preset_policies() {
        for preset in Preset::ALL {
            let options = SmgOptions::from_preset(preset);
            assert_eq!(options.unknown_function_handling, preset.unknown_function_handling());
            assert_eq!(options.symbolic_size_handling, preset.symbolic_size_handling());
            assert_eq!(options.max_symbolic_assignments, preset.max_symbolic_assignments());
            assert_eq!(options.enable_atexit_failure, preset.models_call_failures());
            assert_eq!(options.precise_read, !preset.is_lenient());
            assert!(options.validate().is_ok(), "{preset} must validate");
        }
        assert!(SmgOptions::from_preset(Preset::Custom)
            .safe_unknown_function_patterns
            .is_empty());
    }

    #[test]
    fn test_smg_options_builder() {
        let config = SmgOptions::default()
            .enable_malloc_failure(true)
            .malloc_zero_returns_null(true)
            .add_allocation_function("xmalloc")
            .add_safe_function_pattern("^log_.*");

        assert!(config.enable_malloc_failure);
        assert!(config.malloc_zero_returns_null);
        assert!(config
            .memory_allocation_functions
            .contains(&"xmalloc".to_string()));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        let config = SmgOptions::default().add_safe_function_pattern("(unclosed");
        assert!(matches!(config.validate(), Err(ConfigError::Pattern { .. })));
    }

    #[test]
    fn test_conflicting_roles_rejected() {
        let config = SmgOptions::default().add_allocation_function("free");
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ConflictingRoles { .. })
        ));
    }

    #[test]
    fn test_compiled_patterns() {
        let patterns = SmgOptions::default().compiled_safe_patterns().unwrap();
        assert!(patterns.iter().any(|p| p.is_match("abort")));
        assert!(!patterns.iter().any(|p| p.is_match("abort_now")));
    }
}
