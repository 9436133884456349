//! Calls to functions without a model

use super::allocation::external_allocation;
use crate::config::UnknownFunctionHandling;
use crate::errors::{SmgError, SmgResult};
use crate::features::memory_access::Access;
use crate::features::program_state::{SmgState, Value, ValueAndState};
use crate::shared::models::CFunctionCall;
use num_bigint::BigInt;

/// Thread primitives are never approximated
const THREAD_PREFIX: &str = "pthread";

pub fn handle(state: &SmgState, call: &CFunctionCall, arguments: &[Value]) -> SmgResult<Vec<ValueAndState>> {
    let name = call.name.as_str();
    if name.starts_with(THREAD_PREFIX) {
        tracing::warn!(function = name, "Thread primitives are not supported");
        return Err(SmgError::UnknownFunction(name.to_string()));
    }
    if state.context().is_safe_function(name) {
        tracing::trace!(function = name, "Unknown function matches a safe pattern");
        return Ok(vec![ValueAndState::unknown(state.clone())]);
    }

    match state.options().unknown_function_handling {
        UnknownFunctionHandling::Strict => {
            tracing::debug!(function = name, "Rejecting unknown function");
            Err(SmgError::UnknownFunction(name.to_string()))
        }
        UnknownFunctionHandling::AssumeSafe => Ok(vec![ValueAndState::unknown(state.clone())]),
        UnknownFunctionHandling::AssumeExternalAllocated => {
            let checked = check_pointer_arguments(state, name, arguments);
            if call.return_type.is_pointer() {
                Ok(external_allocation(&checked, name))
            } else {
                Ok(vec![ValueAndState::unknown(checked)])
            }
        }
    }
}

/// Every pointer handed to the callee must designate readable memory.
/// NULL is accepted.
fn check_pointer_arguments(state: &SmgState, function: &str, arguments: &[Value]) -> SmgState {
    let mut state = state.clone();
    for argument in arguments {
        let Some((object, offset)) = state.pointer_target(argument) else {
            continue;
        };
        if object.is_null() {
            continue;
        }
        if let Some(error) = state.check_access(object, &offset, &BigInt::from(0), Access::Read) {
            tracing::debug!(function, %argument, "Unknown function receives an invalid pointer");
            state = state.with_error(error);
        }
    }
    state
}
