//! Lvalue resolution to `(region, offset)`

use super::{sizeof_bits, ValueVisitor};
use crate::errors::{SmgError, SmgResult};
use crate::features::program_state::{LocationAndState, MemoryLocation, SmgState, Value};
use crate::shared::models::{CExpression, CType};
use num_bigint::BigInt;
use num_traits::Zero;

pub struct LValueVisitor<'a> {
    state: &'a SmgState,
}

impl<'a> LValueVisitor<'a> {
    pub fn new(state: &'a SmgState) -> Self {
        Self { state }
    }

    pub fn visit(&self, expression: &CExpression) -> SmgResult<Vec<LocationAndState>> {
        match expression {
            CExpression::Id { name, .. } => self.visit_id(name),
            CExpression::FieldRef {
                owner, field, arrow, ..
            } => self.visit_field(owner, field, *arrow),
            CExpression::ArraySubscript { array, index, .. } => self.visit_subscript(array, index),
            CExpression::PointerDeref { operand, .. } => self.dereference(operand),
            CExpression::Cast { operand, .. } => self.visit(operand),
            other => {
                tracing::trace!(expression = %other, "Not an lvalue");
                Ok(vec![LocationAndState::none(self.state.clone())])
            }
        }
    }

    fn visit_id(&self, name: &str) -> SmgResult<Vec<LocationAndState>> {
        match self.state.spc().get_object_for_visible_variable(name) {
            Some(object) => Ok(vec![LocationAndState::new(
                MemoryLocation::new(object, BigInt::zero()),
                self.state.clone(),
            )]),
            None => Err(SmgError::UndeclaredIdentifier(name.to_string())),
        }
    }

    fn visit_field(&self, owner: &CExpression, field: &str, arrow: bool) -> SmgResult<Vec<LocationAndState>> {
        let owner_type = owner.ty();
        let composite = if arrow {
            owner_type.dereferenced_composite()
        } else {
            owner_type.as_composite()
        }
        .ok_or_else(|| {
            SmgError::invalid_expression(format!("member access .{} on non-composite type {}", field, owner_type))
        })?;
        let member_offset = self
            .state
            .machine_model()
            .field_offset_in_bits(composite, field)
            .ok_or_else(|| {
                SmgError::invalid_expression(format!("{} has no member named {}", composite.name, field))
            })?;

        let bases = if arrow {
            self.dereference(owner)?
        } else {
            self.visit(owner)?
        };
        Ok(bases
            .into_iter()
            .map(|base| LocationAndState {
                location: base.location.map(|l| l.with_added_offset(&member_offset)),
                state: base.state,
            })
            .collect())
    }

    /// `a[i]`: arrays resolve as lvalues, pointers through their value
    fn visit_subscript(&self, array: &CExpression, index: &CExpression) -> SmgResult<Vec<LocationAndState>> {
        let element = array.ty().pointee().cloned().unwrap_or(CType::char());
        let bases = if array.ty().is_array() {
            self.visit(array)?
        } else {
            self.dereference(array)?
        };

        let mut results = Vec::new();
        for base in bases {
            for offset in ValueVisitor::new(&base.state).visit(index)? {
                let location = match (&base.location, &offset.value) {
                    (Some(location), Value::Numeric(i)) => {
                        Some(location.with_added_offset(&(i * sizeof_bits(&offset.state, &element))))
                    }
                    _ => None,
                };
                results.push(LocationAndState {
                    location,
                    state: offset.state,
                });
            }
        }
        Ok(results)
    }

    /// Evaluate `pointer` as a value and resolve its target
    fn dereference(&self, pointer: &CExpression) -> SmgResult<Vec<LocationAndState>> {
        let mut results = Vec::new();
        for value in ValueVisitor::new(self.state).visit(pointer)? {
            results.extend(value.state.dereference_pointer(&value.value)?);
        }
        Ok(results)
    }
}
