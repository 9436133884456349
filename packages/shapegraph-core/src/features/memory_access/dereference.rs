use crate::errors::SmgResult;
use crate::features::diagnostics::ErrorInfo;
use crate::features::program_state::{LocationAndState, MemoryLocation, SmgState, Value};

impl SmgState {
    /// Resolve a pointer value to `(region, offset)`.
    ///
    /// Returns a list because materialization of abstracted regions would
    /// fork here; with concrete regions only one element is produced.
    /// Values without a known target yield a `None` location; `Unknown`
    /// pointers are an invalid read unless `unknown_dereference_as_safe`.
    pub fn dereference_pointer(&self, pointer: &Value) -> SmgResult<Vec<LocationAndState>> {
        if let Some((object, offset)) = self.pointer_target(pointer) {
            return Ok(vec![LocationAndState::new(
                MemoryLocation::new(object, offset),
                self.clone(),
            )]);
        }
        if pointer.is_unknown() && !self.options().unknown_dereference_as_safe {
            let error = ErrorInfo::invalid_read("Dereference of an unknown pointer value");
            return Ok(vec![LocationAndState::none(self.with_error(error))]);
        }
        tracing::trace!(%pointer, "Dereference without a known target");
        Ok(vec![LocationAndState::none(self.clone())])
    }
}

#[cfg(test)]
mod tests {
    use crate::config::{Preset, SmgOptions};
    use crate::features::program_state::{SmgContext, SmgState, Value};
    use crate::features::smg::ObjectId;
    use crate::shared::models::MachineModel;
    use num_bigint::BigInt;
    use std::sync::Arc;

    fn state(options: SmgOptions) -> SmgState {
        SmgState::new(Arc::new(SmgContext::new(options, MachineModel::LINUX64).unwrap()))
    }

    #[test]
    fn test_null_dereference_targets_null_region() {
        let results = state(SmgOptions::default()).dereference_pointer(&Value::zero()).unwrap();
        assert_eq!(results.len(), 1);
        let location = results[0].location.clone().unwrap();
        assert_eq!(location.object, ObjectId::NULL);
    }

    #[test]
    fn test_unknown_pointer_policy() {
        let strict = state(SmgOptions::from_preset(Preset::Balanced));
        let results = strict.dereference_pointer(&Value::Unknown).unwrap();
        assert!(results[0].location.is_none());
        assert_eq!(results[0].state.error_count(), 1);

        let lenient = state(SmgOptions::from_preset(Preset::Fast));
        let results = lenient.dereference_pointer(&Value::Unknown).unwrap();
        assert!(results[0].location.is_none());
        assert_eq!(results[0].state.error_count(), 0);
    }

    #[test]
    fn test_symbolic_offset_has_no_target() {
        let (state, object) = state(SmgOptions::default()).create_heap_object(Value::from(64), "malloc");
        let (state, base) = state.search_or_create_address(object.id, &BigInt::from(0)).unwrap();
        let (state, index) = state.fresh_symbolic_value();
        let results = state.dereference_pointer(&base.plus(&index)).unwrap();
        assert!(results[0].location.is_none());
        assert_eq!(results[0].state.error_count(), 0);
    }
}
