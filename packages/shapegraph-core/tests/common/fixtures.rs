//! Test fixtures: states, declarations and small statement drivers

use num_bigint::BigInt;
use shapegraph_core::features::expression_eval::statements::{assign, declare_variable, Storage};
use shapegraph_core::shared::models::{CExpression, CType, FunctionDeclaration};
use shapegraph_core::{evaluate, MachineModel, ObjectId, SmgContext, SmgOptions, SmgState, Value};
use std::sync::Arc;

/// Fresh state with no frames
pub fn empty_state(options: SmgOptions) -> SmgState {
    let context = SmgContext::new(options, MachineModel::LINUX64).expect("valid options");
    SmgState::new(Arc::new(context))
}

/// State inside `int main(void)` with default options
pub fn main_state() -> SmgState {
    main_state_with(SmgOptions::default())
}

pub fn main_state_with(options: SmgOptions) -> SmgState {
    let main = FunctionDeclaration::new("main", CType::int(), vec![], false);
    empty_state(options).push_stack_frame(main, Some(BigInt::from(32)), None)
}

/// Unwrap a non-branching statement result
pub fn single(states: Vec<SmgState>) -> SmgState {
    assert_eq!(states.len(), 1, "expected exactly one successor");
    states.into_iter().next().expect("one successor")
}

pub fn declare(state: &SmgState, name: &str, ty: &CType) -> SmgState {
    single(declare_variable(state, name, ty, Storage::Stack, None).expect("declaration"))
}

pub fn declare_init(state: &SmgState, name: &str, ty: &CType, init: CExpression) -> SmgState {
    single(declare_variable(state, name, ty, Storage::Stack, Some(&init)).expect("declaration"))
}

pub fn set(state: &SmgState, lhs: CExpression, rhs: CExpression) -> SmgState {
    single(assign(state, &lhs, &rhs).expect("assignment"))
}

/// Value of a side-effect free expression, plus the state after reading it
pub fn eval(state: &SmgState, expression: &CExpression) -> (Value, SmgState) {
    let mut results = evaluate(state, expression).expect("evaluation");
    assert_eq!(results.len(), 1, "expected exactly one value");
    let result = results.remove(0);
    (result.value, result.state)
}

/// `int *name = malloc(bytes);`
pub fn malloc_int_array(state: &SmgState, name: &str, bytes: i64) -> SmgState {
    let call = CExpression::call("malloc", vec![CExpression::int(bytes)], CType::void_pointer());
    declare_init(state, name, &int_pointer(), call)
}

/// Run a call expression for its effect
pub fn call(state: &SmgState, name: &str, arguments: Vec<CExpression>, return_type: CType) -> (Value, SmgState) {
    eval(state, &CExpression::call(name, arguments, return_type))
}

pub fn int_pointer() -> CType {
    CType::pointer_to(CType::int())
}

pub fn var(name: &str, ty: CType) -> CExpression {
    CExpression::id(name, ty)
}

/// `name[index]` over an `int *`
pub fn element(name: &str, index: i64) -> CExpression {
    CExpression::subscript(var(name, int_pointer()), CExpression::int(index))
}

/// Region a pointer variable designates
pub fn target_of(state: &SmgState, pointer: &str) -> ObjectId {
    let (value, state) = eval(state, &var(pointer, int_pointer()));
    let (object, _) = state.pointer_target(&value).expect("pointer with a target");
    object
}
