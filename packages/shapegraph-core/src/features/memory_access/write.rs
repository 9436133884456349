use super::Access;
use crate::errors::SmgResult;
use crate::features::program_state::{SmgState, Value};
use crate::features::smg::ObjectId;
use num_bigint::BigInt;

impl SmgState {
    /// Write `value` as `size` bits at `offset` of `object`.
    ///
    /// Invalid or out-of-bounds writes only add an `InvalidWrite` error.
    pub fn write_value(
        &self,
        object: ObjectId,
        offset: &BigInt,
        size: &BigInt,
        value: &Value,
    ) -> SmgResult<SmgState> {
        if let Some(error) = self.check_access(object, offset, size, Access::Write) {
            return Ok(self.with_error(error));
        }
        let (state, storable) = self.to_storable(value)?;
        let (spc, smg_value) = state.spc().copy_and_create_value(&storable);
        let smg = spc.smg().write_value(object, offset, size, smg_value);
        Ok(state.with_spc(spc.with_smg(smg)))
    }

    /// One collapsed zero edge over the range
    pub fn write_zero(&self, object: ObjectId, offset: &BigInt, size: &BigInt) -> SmgResult<SmgState> {
        self.write_value(object, offset, size, &Value::zero())
    }

    /// `Unknown` becomes a fresh identifier; addresses become their canonical
    /// pointer value (or a fresh identifier if the offset is not concrete).
    pub(crate) fn to_storable(&self, value: &Value) -> SmgResult<(SmgState, Value)> {
        match value {
            Value::Unknown => Ok(self.fresh_symbolic_value()),
            Value::Address(_) => match self.pointer_target(value) {
                Some((object, offset)) => self.search_or_create_address(object, &offset),
                None => Ok(self.fresh_symbolic_value()),
            },
            other => Ok((self.clone(), other.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::SmgOptions;
    use crate::features::diagnostics::Property;
    use crate::features::program_state::{SmgContext, SmgState, Value};
    use crate::shared::models::MachineModel;
    use num_bigint::BigInt;
    use std::sync::Arc;

    fn b(n: i64) -> BigInt {
        BigInt::from(n)
    }

    fn state() -> SmgState {
        SmgState::new(Arc::new(SmgContext::new(SmgOptions::default(), MachineModel::LINUX64).unwrap()))
    }

    #[test]
    fn test_out_of_bounds_write_is_discarded() {
        let (state, object) = state().create_heap_object(Value::from(64), "malloc");
        let state = state.write_value(object.id, &b(0), &b(32), &Value::from(3)).unwrap();
        let after = state.write_value(object.id, &b(32), &b(64), &Value::from(4)).unwrap();
        assert_eq!(after.errors_of(Property::InvalidWrite), 1);
        assert_eq!(after.spc().smg().edge_count(object.id), 1);
        assert_eq!(after.read_value(object.id, &b(0), &b(32)).unwrap().value, Value::from(3));
    }

    #[test]
    fn test_unknown_becomes_stable_symbol() {
        let (state, object) = state().create_heap_object(Value::from(64), "malloc");
        let state = state.write_value(object.id, &b(0), &b(64), &Value::Unknown).unwrap();
        let first = state.read_value(object.id, &b(0), &b(64)).unwrap();
        let second = first.state.read_value(object.id, &b(0), &b(64)).unwrap();
        assert!(!first.value.is_unknown());
        assert_eq!(first.value, second.value);
    }

    #[test]
    fn test_address_is_canonicalised() {
        let (state, target) = state().create_heap_object(Value::from(128), "malloc");
        let (state, holder) = state.create_heap_object(Value::from(64), "malloc");
        let (state, base) = state.search_or_create_address(target.id, &b(0)).unwrap();
        let shifted = base.plus(&Value::from(32));
        let state = state.write_value(holder.id, &b(0), &b(64), &shifted).unwrap();

        let read = state.read_value(holder.id, &b(0), &b(64)).unwrap();
        assert!(matches!(read.value, Value::Symbolic(_)));
        assert_eq!(read.state.pointer_target(&read.value), Some((target.id, b(32))));
    }

    #[test]
    fn test_write_to_freed_region() {
        let (state, object) = state().create_heap_object(Value::from(64), "malloc");
        let state = state.with_spc(state.spc().copy_and_invalidate_object(object.id));
        let after = state.write_zero(object.id, &b(0), &b(64)).unwrap();
        assert_eq!(after.errors_of(Property::InvalidWrite), 1);
    }
}
