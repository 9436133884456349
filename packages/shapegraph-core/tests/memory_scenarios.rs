//! End-to-end heap scenarios driven through statements and builtins
//!
//! Each test builds a small C fragment out of declarations, assignments and
//! calls, then checks the resulting graph and diagnostics.

mod common;

use common::*;
use num_bigint::BigInt;
use pretty_assertions::{assert_eq, assert_ne};
use shapegraph_core::config::UnknownFunctionHandling;
use shapegraph_core::features::expression_eval::statements::{
    declare_variable, enter_function, exit_function, handle_return, Storage,
};
use shapegraph_core::shared::models::{BinaryOp, CExpression, CType, FunctionDeclaration};
use shapegraph_core::{evaluate, Property, SmgError, SmgOptions, Value};

// ═══════════════════════════════════════════════════════════════════════════
// Stack and struct layout
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_struct_members_on_linux64() {
    let pair = CType::struct_of("pair", vec![("a", CType::short()), ("b", CType::int())]);
    let state = declare(&main_state(), "s", &pair);
    let state = set(&state, CExpression::field(var("s", pair.clone()), "a", CType::short()), CExpression::int(1));
    let state = set(&state, CExpression::field(var("s", pair.clone()), "b", CType::int()), CExpression::int(2));

    let object = state.spc().get_object_for_visible_variable("s").expect("s is declared");
    assert_eq!(state.object(object).expect("valid region").size, Value::from(64));

    let (a, state) = eval(&state, &CExpression::field(var("s", pair.clone()), "a", CType::short()));
    let (b, state) = eval(&state, &CExpression::field(var("s", pair), "b", CType::int()));
    assert_eq!(a, Value::from(1));
    assert_eq!(b, Value::from(2));

    let offsets: Vec<BigInt> = edges(&state, object).into_iter().map(|edge| edge.offset).collect();
    assert_eq!(offsets, vec![BigInt::from(0), BigInt::from(32)]);
    assert_no_errors(&state);
}

#[test]
fn test_pointer_arithmetic_matches_subscript() {
    let state = malloc_int_array(&main_state(), "p", 16);
    let state = set(&state, element("p", 2), CExpression::int(5));
    let shifted = CExpression::binary(BinaryOp::Add, var("p", int_pointer()), CExpression::int(2), int_pointer());

    let (value, state) = eval(&state, &CExpression::deref(shifted));
    assert_eq!(value, Value::from(5));
    assert_no_errors(&state);
}

// ═══════════════════════════════════════════════════════════════════════════
// Heap bounds
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_heap_array_bounds() {
    let state = malloc_int_array(&main_state(), "p", 40);
    let state = set(&state, element("p", 9), CExpression::int(7));

    let (last, state) = eval(&state, &element("p", 9));
    assert_eq!(last, Value::from(7));
    assert_no_errors(&state);

    let (past_end, state) = eval(&state, &element("p", 10));
    assert!(past_end.is_unknown());
    assert_errors_of(&state, Property::InvalidRead, 1);
}

#[test]
fn test_out_of_bounds_write_leaves_edges_untouched() {
    let state = malloc_int_array(&main_state(), "p", 40);
    let state = set(&state, element("p", 0), CExpression::int(3));
    let object = target_of(&state, "p");
    let before = edges(&state, object);

    let state = set(&state, element("p", 10), CExpression::int(5));
    assert_errors_of(&state, Property::InvalidWrite, 1);
    assert_eq!(edges(&state, object), before);

    let state = set(&state, element("p", -1), CExpression::int(5));
    assert_errors_of(&state, Property::InvalidWrite, 2);
    assert_eq!(edges(&state, object), before);
}

#[test]
fn test_symbolic_size_allocation_splits() {
    let nondet = CExpression::call("__VERIFIER_nondet_int", vec![], CType::int());
    let state = declare_init(&main_state(), "n", &CType::int(), nondet);
    let char_pointer = CType::pointer_to(CType::char());
    let alloc = CExpression::call("malloc", vec![var("n", CType::int())], CType::void_pointer());
    let branches = declare_variable(&state, "p", &char_pointer, Storage::Stack, Some(&alloc)).unwrap();
    assert_eq!(branches.len(), 2);

    let byte = |index| CExpression::subscript(var("p", char_pointer.clone()), CExpression::int(index));
    let (empty, sized): (Vec<_>, Vec<_>) = branches.into_iter().partition(|state| {
        let (pointer, state) = eval(state, &var("p", char_pointer.clone()));
        let (object, _) = state.pointer_target(&pointer).expect("heap pointer");
        state.object(object).expect("valid region").size.is_zero()
    });

    // n == 0: nothing can be stored
    let state = set(&empty[0], byte(0), CExpression::int(65));
    assert_errors_of(&state, Property::InvalidWrite, 1);

    // n > 0: the first byte exists, the second may not
    let state = set(&sized[0], byte(0), CExpression::int(65));
    let (first, state) = eval(&state, &byte(0));
    assert_eq!(first, Value::from(65));
    assert_no_errors(&state);

    let state = set(&state, byte(1), CExpression::int(66));
    assert_errors_of(&state, Property::InvalidWrite, 1);
}

// ═══════════════════════════════════════════════════════════════════════════
// Allocation lifecycle
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_free_then_double_free() {
    let state = malloc_int_array(&main_state(), "p", 8);
    let object = target_of(&state, "p");

    let (_, state) = call(&state, "free", vec![var("p", int_pointer())], CType::Void);
    assert_no_errors(&state);
    assert!(!state.is_object_valid(object));

    let (_, state) = call(&state, "free", vec![var("p", int_pointer())], CType::Void);
    assert_errors_of(&state, Property::InvalidFree, 1);
}

#[test]
fn test_use_after_free() {
    let state = malloc_int_array(&main_state(), "p", 8);
    let (_, state) = call(&state, "free", vec![var("p", int_pointer())], CType::Void);

    let (value, state) = eval(&state, &element("p", 0));
    assert!(value.is_unknown());
    assert_errors_of(&state, Property::InvalidRead, 1);
}

#[test]
fn test_free_null_is_noop() {
    let state = declare_init(&main_state(), "p", &int_pointer(), CExpression::int(0));
    let (_, state) = call(&state, "free", vec![var("p", int_pointer())], CType::Void);
    assert_no_errors(&state);
}

#[test]
fn test_calloc_is_zeroed() {
    let alloc = CExpression::call("calloc", vec![CExpression::int(4), CExpression::int(4)], CType::void_pointer());
    let state = declare_init(&main_state(), "p", &int_pointer(), alloc);
    let object = target_of(&state, "p");

    let (value, state) = eval(&state, &element("p", 3));
    assert_eq!(value, Value::zero());
    assert_eq!(state.object(object).expect("valid region").size, Value::from(128));
    assert_no_errors(&state);
}

#[test]
fn test_realloc_moves_content_and_frees_old_block() {
    let state = malloc_int_array(&main_state(), "p", 8);
    let state = set(&state, element("p", 0), CExpression::int(7));
    let grow = CExpression::call(
        "realloc",
        vec![var("p", int_pointer()), CExpression::int(16)],
        CType::void_pointer(),
    );
    let state = declare_init(&state, "q", &int_pointer(), grow);

    let (moved, state) = eval(&state, &element("q", 0));
    assert_eq!(moved, Value::from(7));
    let (_, state) = eval(&state, &element("q", 3));
    assert_no_errors(&state);

    let (_, state) = call(&state, "free", vec![var("p", int_pointer())], CType::Void);
    assert_errors_of(&state, Property::InvalidFree, 1);
    let (_, state) = call(&state, "free", vec![var("q", int_pointer())], CType::Void);
    assert_errors_of(&state, Property::InvalidFree, 1);
}

#[test]
fn test_leak_reported_when_function_returns() {
    let helper = FunctionDeclaration::new("helper", CType::Void, vec![], false);
    let state = single(enter_function(&main_state(), &helper, &[]).expect("call"));
    let state = malloc_int_array(&state, "q", 16);

    let result = exit_function(&state).expect("return");
    assert_errors_of(&result.state, Property::MemoryLeak, 1);
}

#[test]
fn test_returned_allocation_is_not_a_leak() {
    let make = FunctionDeclaration::new("make", CType::void_pointer(), vec![], false);
    let state = single(enter_function(&main_state(), &make, &[]).expect("call"));
    let alloc = CExpression::call("malloc", vec![CExpression::int(16)], CType::void_pointer());
    let state = single(handle_return(&state, Some(&alloc)).expect("return value"));

    let result = exit_function(&state).expect("return");
    assert_no_errors(&result.state);
    let (object, offset) = result.state.pointer_target(&result.value).expect("heap pointer");
    assert!(result.state.spc().is_heap_object(object));
    assert_eq!(offset, BigInt::from(0));
}

// ═══════════════════════════════════════════════════════════════════════════
// Memory and string functions
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_memcpy_then_memcmp_is_equal() {
    let state = malloc_int_array(&main_state(), "p", 16);
    let state = malloc_int_array(&state, "q", 16);
    let state = (0..4).fold(state, |state, i| set(&state, element("p", i), CExpression::int(i + 1)));

    let (copied, state) = call(
        &state,
        "memcpy",
        vec![var("q", int_pointer()), var("p", int_pointer()), CExpression::int(16)],
        CType::void_pointer(),
    );
    let (q, state) = eval(&state, &var("q", int_pointer()));
    assert_eq!(copied, q);

    let (third, state) = eval(&state, &element("q", 2));
    assert_eq!(third, Value::from(3));

    let (order, state) = call(
        &state,
        "memcmp",
        vec![var("q", int_pointer()), var("p", int_pointer()), CExpression::int(16)],
        CType::int(),
    );
    assert_eq!(order, Value::zero());
    assert_no_errors(&state);
}

#[test]
fn test_memcmp_same_pointer_is_zero() {
    let state = malloc_int_array(&main_state(), "p", 16);
    let (order, state) = call(
        &state,
        "memcmp",
        vec![var("p", int_pointer()), var("p", int_pointer()), CExpression::int(16)],
        CType::int(),
    );
    assert_eq!(order, Value::zero());
    assert_no_errors(&state);
}

#[test]
fn test_memset_zero_collapses_to_one_edge() {
    let state = malloc_int_array(&main_state(), "p", 16);
    let state = set(&state, element("p", 1), CExpression::int(9));
    let (_, state) = call(
        &state,
        "memset",
        vec![var("p", int_pointer()), CExpression::int(0), CExpression::int(16)],
        CType::void_pointer(),
    );
    let object = target_of(&state, "p");

    let edges = edges(&state, object);
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].size, BigInt::from(128));
    let (value, state) = eval(&state, &element("p", 1));
    assert_eq!(value, Value::zero());
    assert_no_errors(&state);
}

#[test]
fn test_strcmp_of_literals() {
    let state = main_state();
    let (same, state) = call(
        &state,
        "strcmp",
        vec![CExpression::string("abc"), CExpression::string("abc")],
        CType::int(),
    );
    assert_eq!(same, Value::zero());

    let (lower, state) = call(
        &state,
        "strcmp",
        vec![CExpression::string("abc"), CExpression::string("abd")],
        CType::int(),
    );
    assert_eq!(lower, Value::from(-1));
    assert_no_errors(&state);
}

// ═══════════════════════════════════════════════════════════════════════════
// Exit handlers and unknown functions
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_atexit_handler_is_returned_at_exit() {
    let handler_type = CType::function(CType::Void, vec![], false);
    let (registered, state) = call(&main_state(), "atexit", vec![var("cleanup", handler_type.clone())], CType::int());
    assert_eq!(registered, Value::zero());

    let (handler, state) = call(&state, "__CPACHECKER_atexit_next", vec![], CType::void_pointer());
    let (cleanup, state) = eval(&state, &CExpression::address_of(var("cleanup", handler_type)));
    assert_eq!(handler, cleanup);

    let (none_left, _) = call(&state, "__CPACHECKER_atexit_next", vec![], CType::void_pointer());
    assert!(none_left.is_zero());
}

#[test]
fn test_nondet_values_are_symbolic() {
    let (first, state) = call(&main_state(), "__VERIFIER_nondet_int", vec![], CType::int());
    let (second, _) = call(&state, "__VERIFIER_nondet_int", vec![], CType::int());
    assert!(!first.is_numeric());
    assert_ne!(first, second);
}

#[test]
fn test_strict_mode_rejects_unknown_functions() {
    let options = SmgOptions::default().unknown_function_handling(UnknownFunctionHandling::Strict);
    let state = main_state_with(options);
    let mystery = CExpression::call("mystery", vec![], CType::int());
    assert!(matches!(evaluate(&state, &mystery), Err(SmgError::UnknownFunction(_))));

    let (printed, _) = call(&state, "printf", vec![CExpression::string("hi")], CType::int());
    assert!(printed.is_unknown());
}
