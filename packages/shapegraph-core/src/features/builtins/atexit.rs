//! Exit handler registration

use crate::features::program_state::{SmgState, Value, ValueAndState};

/// `atexit(handler)`: 0 on success. With `enable_atexit_failure` a second
/// successor fails to register and returns -1.
pub fn register(state: &SmgState, handler: &Value) -> Vec<ValueAndState> {
    let registered = state.with_spc(state.spc().push_atexit(handler.clone()));
    tracing::trace!(%handler, count = registered.spc().atexit_count(), "Registered exit handler");

    let mut results = vec![ValueAndState::new(Value::zero(), registered)];
    if state.options().enable_atexit_failure {
        results.push(ValueAndState::new(Value::from(-1), state.clone()));
    }
    results
}

/// Next handler to run at exit, most recent first; NULL when none is left
pub fn next(state: &SmgState) -> Vec<ValueAndState> {
    let (spc, handler) = state.spc().pop_atexit();
    vec![ValueAndState::new(handler.unwrap_or_else(Value::zero), state.with_spc(spc))]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SmgOptions;
    use crate::features::program_state::SmgContext;
    use crate::shared::models::MachineModel;
    use std::sync::Arc;

    fn state_with(options: SmgOptions) -> SmgState {
        SmgState::new(Arc::new(SmgContext::new(options, MachineModel::LINUX64).unwrap()))
    }

    #[test]
    fn test_handlers_run_in_reverse_order() {
        let state = state_with(SmgOptions::default());
        let (spc, first) = state.spc().search_or_create_function_object("first");
        let (spc, second) = spc.search_or_create_function_object("second");
        let state = state.with_spc(spc);
        let (state, f) = state.search_or_create_address(first, &0.into()).unwrap();
        let (state, s) = state.search_or_create_address(second, &0.into()).unwrap();

        let state = register(&state, &f).remove(0).state;
        let state = register(&state, &s).remove(0).state;

        let popped = next(&state).remove(0);
        assert_eq!(popped.value, s);
        let popped = next(&popped.state).remove(0);
        assert_eq!(popped.value, f);
        let popped = next(&popped.state).remove(0);
        assert!(popped.value.is_zero());
    }

    #[test]
    fn test_registration_failure_successor() {
        let state = state_with(SmgOptions::default().enable_atexit_failure(true));
        let results = register(&state, &Value::Unknown);
        assert_eq!(results.len(), 2);
        assert_eq!(results[1].value, Value::from(-1));
        assert_eq!(results[1].state.spc().atexit_count(), 0);
    }
}
