//! `memset` and `memcpy`

use crate::config::SymbolicSizeHandling;
use crate::errors::{SmgError, SmgResult};
use crate::features::diagnostics::ErrorInfo;
use crate::features::expression_eval::value_visitor::low_byte;
use crate::features::expression_eval::{AddressVisitor, ValueVisitor};
use crate::features::program_state::{MemoryLocation, SmgState, Value, ValueAndState};
use crate::features::smg::ObjectId;
use crate::features::solver::Constraint;
use crate::shared::models::{CExpression, CFunctionCall};
use num_bigint::BigInt;
use num_traits::{Signed, ToPrimitive, Zero};

/// Byte count of a bulk operation on one path
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ByteCount {
    Exact(BigInt),
    /// Remaining cases of a split that hit its bound
    Havoc,
}

/// Enumerate concrete byte counts for `size`. Symbolic identifiers are split
/// through the solver under [`SymbolicSizeHandling::SolverSplit`].
pub(crate) fn concretize_size(
    state: &SmgState,
    function: &str,
    size: &Value,
) -> SmgResult<Vec<(ByteCount, SmgState)>> {
    if let Value::Numeric(bytes) = size {
        return Ok(vec![(ByteCount::Exact(bytes.clone()), state.clone())]);
    }
    let options = state.options();
    let id = match (options.symbolic_size_handling, size.as_ident()) {
        (SymbolicSizeHandling::Abort, _) => {
            return Err(SmgError::symbolic_size(function, format!("size {} is not a concrete number", size)));
        }
        (SymbolicSizeHandling::SolverSplit, Some(id)) => id,
        _ => return Ok(vec![(ByteCount::Havoc, state.clone())]),
    };

    let solver = state.solver();
    let limit = options.max_symbolic_assignments;
    let mut remaining = state.constraints();
    remaining.push(Constraint::ge(size.clone(), Value::zero()));

    let mut cases = Vec::new();
    while cases.len() < limit {
        let Some(model) = solver.model_value(&remaining, id) else {
            break;
        };
        let case = state.with_constraint(Constraint::eq(size.clone(), Value::Numeric(model.clone())));
        cases.push((ByteCount::Exact(model.clone()), case));
        remaining.push(Constraint::ne(size.clone(), Value::Numeric(model)));
    }
    if cases.len() == limit && solver.check(&remaining).is_feasible() {
        if !options.overapproximate_split_overflow {
            return Err(SmgError::TooManySymbolicAssignments {
                function: function.to_string(),
                limit,
            });
        }
        tracing::debug!(function, limit, "Symbolic size split exhausted, havocking the rest");
        cases.push((ByteCount::Havoc, state.clone()));
    }
    tracing::debug!(function, cases = cases.len(), "Split on symbolic size");
    Ok(cases)
}

/// Forget everything stored in `object` from `offset` on
pub(crate) fn havoc_from(state: &SmgState, object: ObjectId, offset: &BigInt) -> SmgState {
    let smg = state.spc().smg();
    let end = smg.edges_of(object).map(|edge| edge.end()).max();
    match end {
        Some(end) if &end > offset => {
            let smg = smg.remove_edges_overlapping(object, offset, &(end - offset));
            state.with_spc(state.spc().with_smg(smg))
        }
        _ => state.clone(),
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// memset
// ═══════════════════════════════════════════════════════════════════════════

/// `memset(dst, ch, n)` returning `dst`
pub fn memset(
    state: &SmgState,
    function: &str,
    destination: &Value,
    fill: &Value,
    count: &Value,
) -> SmgResult<Vec<ValueAndState>> {
    let mut results = Vec::new();
    for target in state.dereference_pointer(destination)? {
        let Some(location) = target.location else {
            results.push(ValueAndState::unknown(target.state));
            continue;
        };
        for (bytes, branch) in concretize_size(&target.state, function, count)? {
            match bytes {
                ByteCount::Exact(bytes) => {
                    results.push(fill_bytes(&branch, &location, fill, &bytes, destination)?);
                }
                ByteCount::Havoc => {
                    let state = havoc_from(&branch, location.object, &location.offset);
                    results.push(ValueAndState::unknown(state));
                }
            }
        }
    }
    Ok(results)
}

fn fill_bytes(
    state: &SmgState,
    location: &MemoryLocation,
    fill: &Value,
    bytes: &BigInt,
    destination: &Value,
) -> SmgResult<ValueAndState> {
    if !bytes.is_positive() {
        return Ok(ValueAndState::new(destination.clone(), state.clone()));
    }
    let errors_before = state.error_count();
    let byte = low_byte(fill);

    let state = if byte.is_zero() {
        state.write_zero(location.object, &location.offset, &(bytes * 8))?
    } else {
        // every byte holds the same value, symbolic or not
        let (mut state, byte) = state.to_storable(&byte)?;
        let width = BigInt::from(8);
        let count = bytes.to_u64().unwrap_or(u64::MAX);
        for i in 0..count {
            let offset = &location.offset + BigInt::from(i) * 8;
            state = state.write_value(location.object, &offset, &width, &byte)?;
            if state.error_count() > errors_before {
                // later bytes are further out of bounds
                break;
            }
        }
        state
    };

    let value = if state.error_count() > errors_before {
        Value::Unknown
    } else {
        destination.clone()
    };
    Ok(ValueAndState::new(value, state))
}

// ═══════════════════════════════════════════════════════════════════════════
// memcpy
// ═══════════════════════════════════════════════════════════════════════════

struct Operand {
    location: Option<MemoryLocation>,
    value: Value,
    state: SmgState,
}

/// Arrays and structs resolve as lvalues, pointers through their value
fn resolve_operand(state: &SmgState, expression: &CExpression) -> SmgResult<Vec<Operand>> {
    if expression.ty().is_aggregate() {
        let Some(location) = AddressVisitor::new(state).visit(expression)? else {
            return Ok(vec![Operand {
                location: None,
                value: Value::Unknown,
                state: state.clone(),
            }]);
        };
        let (state, value) = state.search_or_create_address(location.object, &location.offset)?;
        return Ok(vec![Operand {
            location: Some(location),
            value,
            state,
        }]);
    }

    let mut operands = Vec::new();
    for pointer in ValueVisitor::new(state).visit(expression)? {
        for target in pointer.state.dereference_pointer(&pointer.value)? {
            operands.push(Operand {
                location: target.location,
                value: pointer.value.clone(),
                state: target.state,
            });
        }
    }
    Ok(operands)
}

/// `memcpy(dst, src, n)` returning `dst`
pub fn memcpy(state: &SmgState, call: &CFunctionCall) -> SmgResult<Vec<ValueAndState>> {
    let function = call.name.as_str();
    SmgError::check_arity(function, 3, call.arguments.len())?;
    let (dst, src, count) = (&call.arguments[0], &call.arguments[1], &call.arguments[2]);

    let mut results = Vec::new();
    for destination in resolve_operand(state, dst)? {
        for source in resolve_operand(&destination.state, src)? {
            for size in ValueVisitor::new(&source.state).visit(count)? {
                for (bytes, branch) in concretize_size(&size.state, function, &size.value)? {
                    results.push(copy_one(
                        &branch,
                        &destination,
                        source.location.as_ref(),
                        &bytes,
                    )?);
                }
            }
        }
    }
    Ok(results)
}

fn copy_one(
    state: &SmgState,
    destination: &Operand,
    source: Option<&MemoryLocation>,
    bytes: &ByteCount,
) -> SmgResult<ValueAndState> {
    match (&destination.location, source, bytes) {
        (Some(dst), Some(src), ByteCount::Exact(bytes)) => {
            let errors_before = state.error_count();
            let copied = state.copy_object_content(src.object, &src.offset, dst.object, &dst.offset, &(bytes * 8))?;
            let value = if copied.error_count() > errors_before {
                Value::Unknown
            } else {
                destination.value.clone()
            };
            Ok(ValueAndState::new(value, copied))
        }
        (Some(dst), _, ByteCount::Havoc) => Ok(ValueAndState::unknown(havoc_from(state, dst.object, &dst.offset))),
        (dst, _, bytes) => {
            tracing::debug!("memcpy operands could not be resolved");
            let mut state = match (dst, bytes) {
                (Some(dst), ByteCount::Exact(bytes)) => {
                    let smg = state
                        .spc()
                        .smg()
                        .remove_edges_overlapping(dst.object, &dst.offset, &(bytes * 8));
                    state.with_spc(state.spc().with_smg(smg))
                }
                _ => state.clone(),
            };
            if state.options().unresolved_copy_is_error {
                state = state.with_error(ErrorInfo::invalid_read("memcpy operands cannot be resolved"));
            }
            Ok(ValueAndState::unknown(state))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SmgOptions;
    use crate::features::diagnostics::Property;
    use crate::features::program_state::SmgContext;
    use crate::shared::models::{CType, FunctionDeclaration, MachineModel};
    use std::sync::Arc;

    fn state_with(options: SmgOptions) -> SmgState {
        let context = SmgContext::new(options, MachineModel::LINUX64).unwrap();
        let main = FunctionDeclaration::new("main", CType::int(), vec![], false);
        SmgState::new(Arc::new(context)).push_stack_frame(main, Some(BigInt::from(32)), None)
    }

    fn heap(state: &SmgState, bytes: i64) -> (SmgState, ObjectId, Value) {
        let (state, object) = state.create_heap_object(Value::from(bytes * 8), "malloc");
        let (state, pointer) = state.search_or_create_address(object.id, &BigInt::zero()).unwrap();
        (state, object.id, pointer)
    }

    fn b(n: i64) -> BigInt {
        BigInt::from(n)
    }

    #[test]
    fn test_memset_zero_collapses() {
        let (state, object, pointer) = heap(&state_with(SmgOptions::default()), 12);
        let results = memset(&state, "memset", &pointer, &Value::zero(), &Value::from(12)).unwrap();
        assert_eq!(results[0].value, pointer);
        assert_eq!(results[0].state.spc().smg().edge_count(object), 1);
    }

    #[test]
    fn test_memset_nonzero_writes_bytes() {
        let (state, object, pointer) = heap(&state_with(SmgOptions::default()), 4);
        let results = memset(&state, "memset", &pointer, &Value::from(0x141), &Value::from(4)).unwrap();
        let state = &results[0].state;
        assert_eq!(state.spc().smg().edge_count(object), 4);
        assert_eq!(state.read_value(object, &b(8), &b(8)).unwrap().value, Value::from(0x41));
        assert_eq!(state.read_value(object, &b(0), &b(32)).unwrap().value, Value::from(0x41414141));
    }

    #[test]
    fn test_memset_out_of_bounds() {
        let (state, _, pointer) = heap(&state_with(SmgOptions::default()), 2);
        let results = memset(&state, "memset", &pointer, &Value::from(1), &Value::from(6)).unwrap();
        assert!(results[0].value.is_unknown());
        assert_eq!(results[0].state.errors_of(Property::InvalidWrite), 1);
    }

    #[test]
    fn test_memset_symbolic_size_split() {
        let options = SmgOptions::default().max_symbolic_assignments(3);
        let (state, _, pointer) = heap(&state_with(options), 8);
        let (state, n) = state.fresh_symbolic_value();
        let state = state.with_constraint(Constraint::le(n.clone(), Value::from(1)));
        let results = memset(&state, "memset", &pointer, &Value::zero(), &n).unwrap();
        // n = 0 and n = 1
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.state.error_count() == 0));
    }

    #[test]
    fn test_split_overflow_policy() {
        let strict = SmgOptions::default()
            .max_symbolic_assignments(2)
            .overapproximate_split_overflow(false);
        let (state, _, pointer) = heap(&state_with(strict), 8);
        let (state, n) = state.fresh_symbolic_value();
        assert!(matches!(
            memset(&state, "memset", &pointer, &Value::zero(), &n),
            Err(SmgError::TooManySymbolicAssignments { limit: 2, .. })
        ));

        let lenient = SmgOptions::default().max_symbolic_assignments(2);
        let (state, _, pointer) = heap(&state_with(lenient), 8);
        let (state, n) = state.fresh_symbolic_value();
        let results = memset(&state, "memset", &pointer, &Value::zero(), &n).unwrap();
        assert_eq!(results.len(), 3);
        assert!(results[2].value.is_unknown());
    }

    #[test]
    fn test_concretize_abort() {
        let options = SmgOptions::default().symbolic_size_handling(SymbolicSizeHandling::Abort);
        let state = state_with(options);
        assert!(concretize_size(&state, "memset", &Value::Unknown).is_err());
    }
}
