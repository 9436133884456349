//! Side-effect free lvalue resolution
//!
//! Answers "which `(region, offset)` does this lvalue designate in the
//! current state" without producing a successor state. Pointers on the way
//! are read, never materialized; anything not concrete yields `None`.

use super::{sizeof_bits, ValueVisitor};
use crate::errors::{SmgError, SmgResult};
use crate::features::program_state::{MemoryLocation, SmgState, Value};
use crate::shared::models::CExpression;
use num_bigint::BigInt;
use num_traits::Zero;

pub struct AddressVisitor<'a> {
    state: &'a SmgState,
}

impl<'a> AddressVisitor<'a> {
    pub fn new(state: &'a SmgState) -> Self {
        Self { state }
    }

    pub fn visit(&self, expression: &CExpression) -> SmgResult<Option<MemoryLocation>> {
        match expression {
            CExpression::Id { name, ty } => {
                if let Some(object) = self.state.spc().get_object_for_visible_variable(name) {
                    return Ok(Some(MemoryLocation::new(object, BigInt::zero())));
                }
                if ty.is_function() {
                    return Ok(self
                        .state
                        .spc()
                        .function_object(name)
                        .map(|object| MemoryLocation::new(object, BigInt::zero())));
                }
                Err(SmgError::UndeclaredIdentifier(name.clone()))
            }
            CExpression::FieldRef {
                owner, field, arrow, ..
            } => {
                let owner_type = owner.ty();
                let composite = if *arrow {
                    owner_type.dereferenced_composite()
                } else {
                    owner_type.as_composite()
                };
                let Some(composite) = composite else {
                    return Err(SmgError::invalid_expression(format!(
                        "member access .{} on non-composite type {}",
                        field, owner_type
                    )));
                };
                let Some(member_offset) = self.state.machine_model().field_offset_in_bits(composite, field)
                else {
                    return Err(SmgError::invalid_expression(format!(
                        "{} has no member named {}",
                        composite.name, field
                    )));
                };
                let base = if *arrow {
                    self.pointer_target(owner)?
                } else {
                    self.visit(owner)?
                };
                Ok(base.map(|location| location.with_added_offset(&member_offset)))
            }
            CExpression::ArraySubscript { array, index, .. } => {
                let base = if array.ty().is_array() {
                    self.visit(array)?
                } else {
                    self.pointer_target(array)?
                };
                let (Some(base), Some(element)) = (base, array.ty().pointee()) else {
                    return Ok(None);
                };
                Ok(self
                    .concrete_value(index)?
                    .map(|i| base.with_added_offset(&(i * sizeof_bits(self.state, element)))))
            }
            CExpression::PointerDeref { operand, .. } => self.pointer_target(operand),
            CExpression::Cast { operand, .. } => self.visit(operand),
            _ => Ok(None),
        }
    }

    /// Target of the pointer `expression` evaluates to in this state
    fn pointer_target(&self, expression: &CExpression) -> SmgResult<Option<MemoryLocation>> {
        Ok(self.single_value(expression)?.and_then(|value| {
            self.state
                .pointer_target(&value)
                .map(|(object, offset)| MemoryLocation::new(object, offset))
        }))
    }

    fn concrete_value(&self, expression: &CExpression) -> SmgResult<Option<BigInt>> {
        Ok(self
            .single_value(expression)?
            .and_then(|value| value.as_numeric().cloned()))
    }

    /// Value of `expression` if evaluation does not fork; the successor state
    /// is discarded
    fn single_value(&self, expression: &CExpression) -> SmgResult<Option<Value>> {
        let mut results = ValueVisitor::new(self.state).visit(expression)?;
        if results.len() != 1 {
            return Ok(None);
        }
        Ok(results.pop().map(|result| result.value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SmgOptions;
    use crate::features::program_state::SmgContext;
    use crate::shared::models::{CType, FunctionDeclaration, MachineModel};
    use std::sync::Arc;

    fn state() -> SmgState {
        let context = SmgContext::new(SmgOptions::default(), MachineModel::LINUX64).unwrap();
        let main = FunctionDeclaration::new("main", CType::int(), vec![], false);
        SmgState::new(Arc::new(context)).push_stack_frame(main, Some(BigInt::from(32)), None)
    }

    #[test]
    fn test_resolves_struct_member_in_array() {
        let point = CType::struct_of("point", vec![("x", CType::int()), ("y", CType::int())]);
        let (state, object) = state().create_stack_variable("pts", Value::from(256));
        let pts = CExpression::id("pts", CType::array_of(point.clone(), 4));
        let e = CExpression::field(CExpression::subscript(pts, CExpression::int(2)), "y", CType::int());
        assert_eq!(
            AddressVisitor::new(&state).visit(&e).unwrap(),
            Some(MemoryLocation::new(object.id, BigInt::from(160)))
        );
    }

    #[test]
    fn test_uninitialized_pointer_has_no_target() {
        let (state, _) = state().create_stack_variable("p", Value::from(64));
        let e = CExpression::deref(CExpression::id("p", CType::pointer_to(CType::int())));
        assert_eq!(AddressVisitor::new(&state).visit(&e).unwrap(), None);
    }

    #[test]
    fn test_does_not_record_errors() {
        let (state, _) = state().create_stack_variable("p", Value::from(64));
        let e = CExpression::deref(CExpression::id("p", CType::pointer_to(CType::int())));
        AddressVisitor::new(&state).visit(&e).unwrap();
        assert_eq!(state.error_count(), 0);
    }

    #[test]
    fn test_non_lvalue() {
        assert_eq!(AddressVisitor::new(&state()).visit(&CExpression::int(3)).unwrap(), None);
    }
}
