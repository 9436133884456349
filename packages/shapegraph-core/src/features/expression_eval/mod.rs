//! Expression evaluation over the memory graph
//!
//! Pattern matching over the closed [`CExpression`] tree:
//!
//! - [`ValueVisitor`]: rvalue -> list of `(Value, SmgState)`
//! - [`LValueVisitor`]: lvalue -> list of `(Option<MemoryLocation>, SmgState)`,
//!   going through value evaluation and dereference (may fork, may add
//!   errors)
//! - [`AddressVisitor`]: lvalue -> `Option<MemoryLocation>` without
//!   producing a successor state
//! - [`statements`]: declarations, assignments and call/return handling
//!
//! Offsets compose as `base_offset_of(pointer) + field_or_index_offset`.
//! Whenever a base or offset is not concrete the result is "no target" with
//! the state unchanged; only structurally invalid input (an undeclared
//! identifier, a missing member) is a hard error.

pub mod address_visitor;
pub mod lvalue_visitor;
pub mod statements;
pub mod value_visitor;

pub use address_visitor::AddressVisitor;
pub use lvalue_visitor::LValueVisitor;
pub use value_visitor::ValueVisitor;

use crate::errors::SmgResult;
use crate::features::program_state::value::wrap_to_width;
use crate::features::program_state::{MemoryLocation, SmgState, Value, ValueAndState};
use crate::shared::models::{CExpression, CType, IntKind};
use num_bigint::BigInt;

/// Evaluate an rvalue
pub fn evaluate(state: &SmgState, expression: &CExpression) -> SmgResult<Vec<ValueAndState>> {
    ValueVisitor::new(state).visit(expression)
}

/// Argument values of one evaluation path, left to right
#[derive(Debug, Clone)]
pub struct ValuesAndState {
    pub values: Vec<Value>,
    pub state: SmgState,
}

/// Evaluate `arguments` left to right, threading every forked state
pub fn evaluate_arguments(state: &SmgState, arguments: &[CExpression]) -> SmgResult<Vec<ValuesAndState>> {
    let mut paths = vec![ValuesAndState {
        values: Vec::with_capacity(arguments.len()),
        state: state.clone(),
    }];
    for argument in arguments {
        let mut next = Vec::with_capacity(paths.len());
        for path in paths {
            for result in ValueVisitor::new(&path.state).visit(argument)? {
                let mut values = path.values.clone();
                values.push(result.value);
                next.push(ValuesAndState {
                    values,
                    state: result.state,
                });
            }
        }
        paths = next;
    }
    Ok(paths)
}

/// Size of `ty` in bits under the state's machine model
pub(crate) fn sizeof_bits(state: &SmgState, ty: &CType) -> BigInt {
    state.machine_model().sizeof_in_bits(ty)
}

/// Value stored at `location` when viewed as `ty`. Arrays, structs, unions
/// and functions evaluate to their address.
pub(crate) fn read_location(
    state: &SmgState,
    location: &MemoryLocation,
    ty: &CType,
) -> SmgResult<ValueAndState> {
    if ty.is_aggregate() || ty.is_function() {
        let (state, address) = state.search_or_create_address(location.object, &location.offset)?;
        return Ok(ValueAndState::new(address, state));
    }
    state.read_value(location.object, &location.offset, &sizeof_bits(state, ty))
}

/// C conversion of `value` to `ty` (integer truncation and sign extension)
pub(crate) fn cast_value(state: &SmgState, value: Value, ty: &CType) -> Value {
    match (ty, &value) {
        (CType::Integer { kind: IntKind::Bool, .. }, Value::Numeric(n)) => {
            Value::numeric(if n == &BigInt::from(0) { 0 } else { 1 })
        }
        (CType::Integer { signed, .. }, Value::Numeric(n)) => {
            let bits = state.machine_model().sizeof(ty) * crate::shared::models::BITS_PER_BYTE;
            Value::Numeric(wrap_to_width(n, bits, *signed))
        }
        _ => value,
    }
}
