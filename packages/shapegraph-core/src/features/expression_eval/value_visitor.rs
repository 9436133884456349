//! Rvalue evaluation

use super::{cast_value, read_location, sizeof_bits, LValueVisitor};
use crate::errors::{SmgError, SmgResult};
use crate::features::builtins;
use crate::features::program_state::value::wrap_to_width;
use crate::features::program_state::{
    LocationAndState, MemoryLocation, SmgState, SymbolicExpr, Value, ValueAndState,
};
use crate::shared::models::{BinaryOp, CExpression, CType, UnaryOp};
use num_bigint::BigInt;
use num_traits::{Signed, ToPrimitive, Zero};

pub struct ValueVisitor<'a> {
    state: &'a SmgState,
}

impl<'a> ValueVisitor<'a> {
    pub fn new(state: &'a SmgState) -> Self {
        Self { state }
    }

    pub fn visit(&self, expression: &CExpression) -> SmgResult<Vec<ValueAndState>> {
        match expression {
            CExpression::IntLiteral { value, .. } => Ok(vec![ValueAndState::new(
                Value::Numeric(value.clone()),
                self.state.clone(),
            )]),
            CExpression::StringLiteral { value, .. } => self.visit_string_literal(value),
            CExpression::Id { name, ty } => self.visit_id(name, ty),
            CExpression::FieldRef { .. }
            | CExpression::ArraySubscript { .. }
            | CExpression::PointerDeref { .. } => self.visit_memory_access(expression),
            CExpression::AddressOf { operand, .. } => self.visit_address_of(operand),
            CExpression::Cast { operand, ty } => {
                let results = self.visit(operand)?;
                Ok(results
                    .into_iter()
                    .map(|r| ValueAndState::new(cast_value(&r.state, r.value, ty), r.state))
                    .collect())
            }
            CExpression::Unary { op, operand, ty } => {
                let results = self.visit(operand)?;
                Ok(results
                    .into_iter()
                    .map(|r| {
                        let value = unary(&r.state, *op, &r.value);
                        ValueAndState::new(cast_value(&r.state, value, ty), r.state)
                    })
                    .collect())
            }
            CExpression::Binary { op, lhs, rhs, ty } => self.visit_binary(*op, lhs, rhs, ty),
            CExpression::SizeOf { of, .. } => Ok(vec![ValueAndState::new(
                Value::numeric(self.state.machine_model().sizeof(of)),
                self.state.clone(),
            )]),
            CExpression::Call(call) => builtins::handle_function_call(self.state, call),
        }
    }

    /// Read-only global `char[]` holding the literal and its terminator
    fn visit_string_literal(&self, literal: &str) -> SmgResult<Vec<ValueAndState>> {
        let bytes = literal.as_bytes();
        let (spc, name) = self.state.spc().fresh_generated_name("string_literal");
        let size = BigInt::from((bytes.len() as u64 + 1) * 8);
        let (mut state, object) = self
            .state
            .with_spc(spc)
            .create_global_variable(&name, Value::Numeric(size));

        let byte = BigInt::from(8);
        for (i, c) in bytes.iter().enumerate() {
            state = state.write_value(object.id, &BigInt::from(i * 8), &byte, &Value::from(i64::from(*c)))?;
        }
        state = state.write_zero(object.id, &BigInt::from(bytes.len() * 8), &byte)?;
        let (state, address) = state.search_or_create_address(object.id, &BigInt::zero())?;
        Ok(vec![ValueAndState::new(address, state)])
    }

    fn visit_id(&self, name: &str, ty: &CType) -> SmgResult<Vec<ValueAndState>> {
        if let Some(object) = self.state.spc().get_object_for_visible_variable(name) {
            let location = MemoryLocation::new(object, BigInt::zero());
            return Ok(vec![read_location(self.state, &location, ty)?]);
        }
        if ty.is_function() {
            return Ok(vec![function_address(self.state, name)?]);
        }
        Err(SmgError::UndeclaredIdentifier(name.to_string()))
    }

    fn visit_memory_access(&self, expression: &CExpression) -> SmgResult<Vec<ValueAndState>> {
        let mut results = Vec::new();
        for LocationAndState { location, state } in LValueVisitor::new(self.state).visit(expression)? {
            match location {
                Some(location) => results.push(read_location(&state, &location, expression.ty())?),
                None => results.push(ValueAndState::unknown(state)),
            }
        }
        Ok(results)
    }

    fn visit_address_of(&self, operand: &CExpression) -> SmgResult<Vec<ValueAndState>> {
        match operand {
            CExpression::Id { name, ty } if ty.is_function() => {
                if self.state.spc().get_object_for_visible_variable(name).is_none() {
                    return Ok(vec![function_address(self.state, name)?]);
                }
            }
            // &*p is p, without touching *p
            CExpression::PointerDeref { operand: pointer, .. } => return self.visit(pointer),
            _ => {}
        }

        let mut results = Vec::new();
        for LocationAndState { location, state } in LValueVisitor::new(self.state).visit(operand)? {
            match location {
                Some(location) => {
                    let (state, address) = state.search_or_create_address(location.object, &location.offset)?;
                    results.push(ValueAndState::new(address, state));
                }
                None => results.push(ValueAndState::unknown(state)),
            }
        }
        Ok(results)
    }

    fn visit_binary(
        &self,
        op: BinaryOp,
        lhs: &CExpression,
        rhs: &CExpression,
        ty: &CType,
    ) -> SmgResult<Vec<ValueAndState>> {
        let mut results = Vec::new();
        for left in self.visit(lhs)? {
            for right in ValueVisitor::new(&left.state).visit(rhs)? {
                let state = right.state;
                let value = binary(&state, op, (&left.value, lhs.ty()), (&right.value, rhs.ty()));
                let value = if ty.is_integer() {
                    cast_value(&state, value, ty)
                } else {
                    value
                };
                results.push(ValueAndState::new(value, state));
            }
        }
        Ok(results)
    }
}

fn function_address(state: &SmgState, name: &str) -> SmgResult<ValueAndState> {
    let (spc, object) = state.spc().search_or_create_function_object(name);
    let (state, address) = state.with_spc(spc).search_or_create_address(object, &BigInt::zero())?;
    Ok(ValueAndState::new(address, state))
}

// ═══════════════════════════════════════════════════════════════════════════
// Operators
// ═══════════════════════════════════════════════════════════════════════════

fn unary(state: &SmgState, op: UnaryOp, value: &Value) -> Value {
    match (op, value) {
        (UnaryOp::Minus, v) => v.negate(),
        (UnaryOp::BitNot, Value::Numeric(n)) => Value::Numeric(!n),
        (UnaryOp::LogicalNot, Value::Numeric(n)) => Value::from(i64::from(n.is_zero())),
        (UnaryOp::LogicalNot, v) => match state.pointer_target(v) {
            Some((object, _)) if object.is_null() => Value::from(1),
            Some(_) => Value::from(0),
            None => Value::Unknown,
        },
        _ => Value::Unknown,
    }
}

fn is_pointer_like(ty: &CType) -> bool {
    ty.is_pointer() || ty.is_array()
}

/// Bits per element when stepping a pointer of type `ty`
fn element_bits(state: &SmgState, ty: &CType) -> BigInt {
    match ty.pointee() {
        Some(CType::Void) | None => BigInt::from(8),
        Some(element) => sizeof_bits(state, element),
    }
}

fn binary(state: &SmgState, op: BinaryOp, lhs: (&Value, &CType), rhs: (&Value, &CType)) -> Value {
    let (lv, lt) = lhs;
    let (rv, rt) = rhs;

    match op {
        BinaryOp::Add | BinaryOp::Sub if is_pointer_like(lt) && !is_pointer_like(rt) => {
            pointer_step(op, lv, rv, &element_bits(state, lt))
        }
        BinaryOp::Add if is_pointer_like(rt) && !is_pointer_like(lt) => {
            pointer_step(op, rv, lv, &element_bits(state, rt))
        }
        BinaryOp::Sub if is_pointer_like(lt) && is_pointer_like(rt) => {
            match (state.pointer_target(lv), state.pointer_target(rv)) {
                (Some((a, a_offset)), Some((b, b_offset))) if a == b => {
                    let bits = element_bits(state, lt);
                    if bits.is_zero() {
                        Value::Unknown
                    } else {
                        Value::Numeric((a_offset - b_offset) / bits)
                    }
                }
                _ => Value::Unknown,
            }
        }
        _ if op.is_comparison() && (is_pointer_like(lt) || is_pointer_like(rt)) => {
            compare_pointers(state, op, lv, rv)
        }
        _ => {
            // the left operand is promoted to at least int
            let width = sizeof_bits(state, lt).max(sizeof_bits(state, &CType::int()));
            arithmetic(op, lv, rv, &width)
        }
    }
}

/// `pointer ± index`, scaled to bits for addresses and to bytes for raw numbers
fn pointer_step(op: BinaryOp, pointer: &Value, index: &Value, element_bits: &BigInt) -> Value {
    let index = if op == BinaryOp::Sub {
        index.negate()
    } else {
        index.clone()
    };
    match pointer {
        Value::Numeric(_) => pointer.plus(&index.times(&Value::Numeric(element_bits / 8))),
        Value::Symbolic(SymbolicExpr::Ident(base)) => {
            Value::address(*base, index.times(&Value::Numeric(element_bits.clone())))
        }
        _ => pointer.plus(&index.times(&Value::Numeric(element_bits.clone()))),
    }
}

fn compare_pointers(state: &SmgState, op: BinaryOp, lv: &Value, rv: &Value) -> Value {
    let (Some((a, a_offset)), Some((b, b_offset))) = (state.pointer_target(lv), state.pointer_target(rv))
    else {
        return if lv == rv {
            compare_equal_operands(op)
        } else {
            Value::Unknown
        };
    };
    if a != b {
        return match op {
            BinaryOp::Eq => Value::from(0),
            BinaryOp::Ne => Value::from(1),
            _ => Value::Unknown,
        };
    }
    compare_numbers(op, &a_offset, &b_offset)
}

fn compare_equal_operands(op: BinaryOp) -> Value {
    match op {
        BinaryOp::Eq | BinaryOp::Le | BinaryOp::Ge => Value::from(1),
        _ => Value::from(0),
    }
}

fn compare_numbers(op: BinaryOp, a: &BigInt, b: &BigInt) -> Value {
    let result = match op {
        BinaryOp::Eq => a == b,
        BinaryOp::Ne => a != b,
        BinaryOp::Lt => a < b,
        BinaryOp::Le => a <= b,
        BinaryOp::Gt => a > b,
        BinaryOp::Ge => a >= b,
        _ => return Value::Unknown,
    };
    Value::from(i64::from(result))
}

/// `width` is the bit width of the promoted left operand; shifting by a
/// negative amount or by `width` or more is undefined and yields `Unknown`
fn arithmetic(op: BinaryOp, lv: &Value, rv: &Value, width: &BigInt) -> Value {
    if let (Value::Numeric(a), Value::Numeric(b)) = (lv, rv) {
        return match op {
            BinaryOp::Add => Value::Numeric(a + b),
            BinaryOp::Sub => Value::Numeric(a - b),
            BinaryOp::Mul => Value::Numeric(a * b),
            BinaryOp::Div if !b.is_zero() => Value::Numeric(a / b),
            BinaryOp::Mod if !b.is_zero() => Value::Numeric(a % b),
            BinaryOp::Div | BinaryOp::Mod => Value::Unknown,
            BinaryOp::ShiftLeft | BinaryOp::ShiftRight if b.is_negative() || b >= width => Value::Unknown,
            BinaryOp::ShiftLeft => match b.to_u64() {
                Some(shift) => Value::Numeric(a << shift),
                None => Value::Unknown,
            },
            BinaryOp::ShiftRight => match b.to_u64() {
                Some(shift) => Value::Numeric(a >> shift),
                None => Value::Unknown,
            },
            BinaryOp::BitAnd => Value::Numeric(a & b),
            BinaryOp::BitOr => Value::Numeric(a | b),
            BinaryOp::BitXor => Value::Numeric(a ^ b),
            _ => compare_numbers(op, a, b),
        };
    }

    match op {
        BinaryOp::Add => lv.plus(rv),
        BinaryOp::Sub => lv.minus(rv),
        BinaryOp::Mul => lv.times(rv),
        _ if op.is_comparison() && lv == rv && !lv.is_unknown() => compare_equal_operands(op),
        _ => Value::Unknown,
    }
}

/// Low byte of a numeric value (the `unsigned char` conversion of memset)
pub(crate) fn low_byte(value: &Value) -> Value {
    match value {
        Value::Numeric(n) => Value::Numeric(wrap_to_width(n, 8, false)),
        other => other.clone(),
    }
}
