//! Statement semantics on top of the visitors
//!
//! ```text
//! declare_variable   T x [= init];      region + optional assignment
//! assign             lhs = rhs;         scalar write or struct copy
//! enter_function     call f(args)       frame push + parameter binding
//! handle_return      return e;          write the frame's return region
//! exit_function      end of f           read return value, pop, leak check
//! ```

use super::{evaluate_arguments, read_location, sizeof_bits, LValueVisitor, ValueVisitor};
use crate::errors::{SmgError, SmgResult};
use crate::features::program_state::{MemoryLocation, SmgState, Value, ValueAndState, ValueAndType};
use crate::features::smg::ObjectId;
use crate::shared::models::{CExpression, CType, FunctionDeclaration};
use num_bigint::BigInt;
use num_traits::Zero;

/// Where a declaration lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Storage {
    Stack,
    Global,
}

/// Declare `name` of type `ty`. Globals start zero-initialized.
pub fn declare_variable(
    state: &SmgState,
    name: &str,
    ty: &CType,
    storage: Storage,
    initializer: Option<&CExpression>,
) -> SmgResult<Vec<SmgState>> {
    let size = sizeof_bits(state, ty);
    let state = match storage {
        Storage::Stack => state.create_stack_variable(name, Value::Numeric(size)).0,
        Storage::Global => {
            let (state, object) = state.create_global_variable(name, Value::Numeric(size.clone()));
            state.write_zero(object.id, &BigInt::zero(), &size)?
        }
    };
    tracing::trace!(variable = name, ?storage, "Declared variable");

    match initializer {
        Some(init) => assign(&state, &CExpression::id(name, ty.clone()), init),
        None => Ok(vec![state]),
    }
}

/// `lhs = rhs`
pub fn assign(state: &SmgState, lhs: &CExpression, rhs: &CExpression) -> SmgResult<Vec<SmgState>> {
    let ty = lhs.ty();
    let mut results = Vec::new();
    for target in LValueVisitor::new(state).visit(lhs)? {
        for value in ValueVisitor::new(&target.state).visit(rhs)? {
            let Some(location) = &target.location else {
                results.push(value.state);
                continue;
            };
            results.push(store(&value.state, location, ty, &value.value)?);
        }
    }
    Ok(results)
}

/// Write `value` of type `ty` at `location`. Structs and unions are passed
/// around as the address of their storage and copied member-wise.
fn store(state: &SmgState, location: &MemoryLocation, ty: &CType, value: &Value) -> SmgResult<SmgState> {
    let size = sizeof_bits(state, ty);
    if ty.is_composite() {
        return match state.pointer_target(value) {
            Some((source, offset)) => {
                state.copy_object_content(source, &offset, location.object, &location.offset, &size)
            }
            // unknown source: forget the old content
            None => state.write_value(location.object, &location.offset, &size, &Value::Unknown),
        };
    }
    let value = super::cast_value(state, value.clone(), ty);
    state.write_value(location.object, &location.offset, &size, &value)
}

/// Evaluate the call arguments in the caller, push the callee frame and bind
/// its parameters. Surplus arguments of a variadic callee are kept on the
/// frame for `va_start`.
pub fn enter_function(
    state: &SmgState,
    function: &FunctionDeclaration,
    arguments: &[CExpression],
) -> SmgResult<Vec<SmgState>> {
    let declared = function.parameter_names.len();
    let arity_ok = if function.is_variadic() {
        arguments.len() >= declared
    } else {
        arguments.len() == declared
    };
    if !arity_ok {
        return Err(SmgError::ArgumentCount {
            function: function.name.clone(),
            expected: declared,
            found: arguments.len(),
        });
    }

    let return_size = match function.return_type() {
        CType::Void => None,
        ty => Some(sizeof_bits(state, ty)),
    };

    let mut results = Vec::new();
    for path in evaluate_arguments(state, arguments)? {
        let variadic = function.is_variadic().then(|| {
            path.values[declared..]
                .iter()
                .zip(&arguments[declared..])
                .map(|(value, expression)| ValueAndType::new(value.clone(), expression.ty().clone()))
                .collect::<Vec<_>>()
        });
        let mut callee = path
            .state
            .push_stack_frame(function.clone(), return_size.clone(), variadic);

        let parameters = function.parameter_names.iter().zip(&function.ty.parameters);
        for ((name, ty), value) in parameters.zip(&path.values) {
            let (state, object) = callee.create_stack_variable(name, Value::Numeric(sizeof_bits(&callee, ty)));
            callee = store(&state, &MemoryLocation::new(object.id, BigInt::zero()), ty, value)?;
        }
        tracing::debug!(function = %function.name, depth = callee.spc().stack_depth(), "Entered function");
        results.push(callee);
    }
    Ok(results)
}

/// `return expression;` writes the value into the frame's return region
pub fn handle_return(state: &SmgState, expression: Option<&CExpression>) -> SmgResult<Vec<SmgState>> {
    let Some(expression) = expression else {
        return Ok(vec![state.clone()]);
    };
    let Some(frame) = state.spc().top_frame() else {
        return Err(SmgError::invalid_expression("return outside of a function"));
    };
    let return_type = frame.function().return_type().clone();
    let Some(return_object) = frame.return_object() else {
        // value of a void-returning call is discarded
        return Ok(ValueVisitor::new(state)
            .visit(expression)?
            .into_iter()
            .map(|result| result.state)
            .collect());
    };

    let location = MemoryLocation::new(return_object, BigInt::zero());
    ValueVisitor::new(state)
        .visit(expression)?
        .into_iter()
        .map(|result| store(&result.state, &location, &return_type, &result.value))
        .collect()
}

/// Leave the current function: read the return value, pop the frame and
/// report heap regions that became unreachable.
///
/// A returned struct or union is copied into a temporary of the caller's
/// frame and the result is its address, so `store` copies it member-wise.
pub fn exit_function(state: &SmgState) -> SmgResult<ValueAndState> {
    let Some(frame) = state.spc().top_frame() else {
        return Err(SmgError::invalid_expression("no stack frame to leave"));
    };
    let function = frame.function().name.clone();
    let return_type = frame.function().return_type().clone();
    let return_object = frame.return_object();
    let has_caller = state.spc().stack_depth() > 1;

    let result = match return_object {
        Some(object) if return_type.is_composite() && has_caller => {
            let size = sizeof_bits(state, &return_type);
            let popped = return_to_caller(state, object, &size)?;
            tracing::debug!(%function, depth = popped.state.spc().stack_depth(), "Left function");
            return Ok(popped);
        }
        Some(object) if !return_type.is_aggregate() => {
            read_location(state, &MemoryLocation::new(object, BigInt::zero()), &return_type)?
        }
        _ => ValueAndState::unknown(state.clone()),
    };

    let popped = result.state.drop_stack_frame([&result.value]);
    tracing::debug!(%function, depth = popped.spc().stack_depth(), "Left function");
    Ok(ValueAndState::new(result.value, popped))
}

/// Pop the frame, keeping the content of its return region alive in a fresh
/// caller temporary
fn return_to_caller(state: &SmgState, return_object: ObjectId, size: &BigInt) -> SmgResult<ValueAndState> {
    let zero = BigInt::zero();
    let popped = state.with_spc(state.spc().drop_stack_frame());
    let (spc, name) = popped.spc().fresh_generated_name("returned");
    let (popped, temporary) = popped
        .with_spc(spc)
        .create_stack_variable(&name, Value::Numeric(size.clone()));
    // the return region is already invalidated, so edges are moved without an access check
    let smg = popped
        .spc()
        .smg()
        .copy_edges(return_object, &zero, temporary.id, &zero, size);
    let popped = popped.with_spc(popped.spc().with_smg(smg));
    let (popped, address) = popped.search_or_create_address(temporary.id, &zero)?;
    let pruned = popped.prune_unreachable([&address]);
    Ok(ValueAndState::new(address, pruned))
}
