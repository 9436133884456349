//! `va_start`, `va_copy` and `va_end`
//!
//! A `va_list` holds a pointer to a heap area into which `va_start` lays
//! out the captured variadic arguments back to back. `va_end` releases the
//! area; a missing `va_end` shows up as a leak when the frame is dropped.
//! `va_arg` is rejected before reaching this module.

use super::VariadicOperation;
use crate::errors::{SmgError, SmgResult};
use crate::features::expression_eval::{sizeof_bits, LValueVisitor, ValueVisitor};
use crate::features::program_state::{SmgState, Value, ValueAndState};
use crate::shared::models::{CExpression, CFunctionCall};
use num_bigint::BigInt;
use num_traits::Zero;

pub fn handle(state: &SmgState, operation: VariadicOperation, call: &CFunctionCall) -> SmgResult<Vec<ValueAndState>> {
    let arguments = &call.arguments;
    match operation {
        VariadicOperation::Start => {
            SmgError::check_arity(&call.name, 2, arguments.len())?;
            start(state, &arguments[0])
        }
        VariadicOperation::Copy => {
            SmgError::check_arity(&call.name, 2, arguments.len())?;
            copy(state, &arguments[0], &arguments[1])
        }
        VariadicOperation::End => {
            SmgError::check_arity(&call.name, 1, arguments.len())?;
            end(state, &arguments[0])
        }
        VariadicOperation::Arg => Err(SmgError::unsupported(format!("{} is not modeled", call.name))),
    }
}

fn start(state: &SmgState, list: &CExpression) -> SmgResult<Vec<ValueAndState>> {
    let Some(frame) = state.spc().top_frame() else {
        return Err(SmgError::invalid_expression("va_start outside of a function"));
    };
    let Some(captured) = frame.variadic_arguments() else {
        return Err(SmgError::invalid_expression(format!(
            "va_start in non-variadic function {}",
            frame.function().name
        )));
    };
    let captured = captured.to_vec();
    let sizes: Vec<BigInt> = captured.iter().map(|argument| sizeof_bits(state, &argument.ty)).collect();
    let total: BigInt = sizes.iter().sum();

    let label = format!("va_start in {}", frame.function().name);
    let (mut area_state, area) = state.create_heap_object(Value::Numeric(total), &label);
    let mut offset = BigInt::zero();
    for (argument, size) in captured.iter().zip(&sizes) {
        area_state = if argument.ty.is_composite() {
            match area_state.pointer_target(&argument.value) {
                Some((source, source_offset)) => {
                    area_state.copy_object_content(source, &source_offset, area.id, &offset, size)?
                }
                None => area_state,
            }
        } else {
            area_state.write_value(area.id, &offset, size, &argument.value)?
        };
        offset += size;
    }
    let (area_state, address) = area_state.search_or_create_address(area.id, &BigInt::zero())?;
    tracing::trace!(area = %area, arguments = captured.len(), "Laid out variadic arguments");

    let pointer_bits = area_state.machine_model().pointer_size_in_bits();
    let mut results = Vec::new();
    for target in LValueVisitor::new(&area_state).visit(list)? {
        let state = match target.location {
            Some(location) => target
                .state
                .write_value(location.object, &location.offset, &pointer_bits, &address)?,
            None => target.state,
        };
        results.push(ValueAndState::unknown(state));
    }
    Ok(results)
}

fn copy(state: &SmgState, destination: &CExpression, source: &CExpression) -> SmgResult<Vec<ValueAndState>> {
    let pointer_bits = state.machine_model().pointer_size_in_bits();
    let mut results = Vec::new();
    for from in LValueVisitor::new(state).visit(source)? {
        let Some(from_location) = from.location else {
            results.push(ValueAndState::unknown(from.state));
            continue;
        };
        let pointer = from
            .state
            .read_value(from_location.object, &from_location.offset, &pointer_bits)?;
        for to in LValueVisitor::new(&pointer.state).visit(destination)? {
            let state = match to.location {
                Some(location) => to
                    .state
                    .write_value(location.object, &location.offset, &pointer_bits, &pointer.value)?,
                None => to.state,
            };
            results.push(ValueAndState::unknown(state));
        }
    }
    Ok(results)
}

/// Releases the argument area and drops the binding of the `va_list`
/// variable. An area already released through a copy is left alone.
fn end(state: &SmgState, list: &CExpression) -> SmgResult<Vec<ValueAndState>> {
    let mut results = Vec::new();
    for pointer in ValueVisitor::new(state).visit(list)? {
        let mut state = pointer.state;
        let live_area = state
            .pointer_target(&pointer.value)
            .filter(|(area, _)| state.spc().is_heap_object(*area) && state.is_object_valid(*area));
        if live_area.is_some() {
            state = state.free_object(&pointer.value)?;
        }
        if let CExpression::Id { name, .. } = list {
            state = state.with_spc(state.spc().copy_and_remove_stack_variable(name));
        }
        results.push(ValueAndState::unknown(state));
    }
    Ok(results)
}
