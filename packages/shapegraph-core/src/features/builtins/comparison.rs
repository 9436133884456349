//! `memcmp` and `strcmp`
//!
//! memcmp pairs the has-value edges of both operands by their offset
//! relative to the compared window:
//!
//! ```text
//!   a: |  0  0  0 | s3        | 41 |
//!   b: |  0  0  0 | s3        | 42 |     -> 0x41 - 0x42
//!        zero run   same value  first differing byte wins
//! ```
//!
//! Windows that cannot be paired edge by edge (a symbolic value straddling a
//! differently sized edge on the other side) are a modeling limitation and
//! abort the path.

use super::memory_ops::{concretize_size, ByteCount};
use crate::config::UnknownFunctionHandling;
use crate::errors::{SmgError, SmgResult};
use crate::features::memory_access::Access;
use crate::features::program_state::value::to_unsigned_bits;
use crate::features::program_state::{MemoryLocation, SmgState, Value, ValueAndState};
use crate::features::smg::{HasValueEdge, Smg};
use crate::features::solver::Constraint;
use num_bigint::BigInt;
use num_traits::{One, Zero};

/// Outcome of comparing two windows
#[derive(Debug, Clone, PartialEq)]
enum Comparison {
    Equal,
    /// Difference of the first differing bytes, as `unsigned char`
    Differs(BigInt),
    /// Proven unequal, order unknown
    Distinct,
    Unknown,
}

// ═══════════════════════════════════════════════════════════════════════════
// memcmp
// ═══════════════════════════════════════════════════════════════════════════

pub fn memcmp(
    state: &SmgState,
    function: &str,
    lhs: &Value,
    rhs: &Value,
    count: &Value,
) -> SmgResult<Vec<ValueAndState>> {
    let mut results = Vec::new();
    for left in state.dereference_pointer(lhs)? {
        for right in left.state.dereference_pointer(rhs)? {
            for (bytes, branch) in concretize_size(&right.state, function, count)? {
                let (Some(a), Some(b), ByteCount::Exact(bytes)) = (&left.location, &right.location, bytes) else {
                    results.push(ValueAndState::unknown(branch));
                    continue;
                };
                results.push(compare_windows(&branch, a, b, &(bytes * 8))?);
            }
        }
    }
    Ok(results)
}

fn compare_windows(state: &SmgState, a: &MemoryLocation, b: &MemoryLocation, bits: &BigInt) -> SmgResult<ValueAndState> {
    for location in [a, b] {
        if let Some(error) = state.check_access(location.object, &location.offset, bits, Access::Read) {
            return Ok(ValueAndState::unknown(state.with_error(error)));
        }
    }
    if a == b || bits.is_zero() {
        return Ok(ValueAndState::new(Value::zero(), state.clone()));
    }

    match compare_edges(state, a, b, bits)? {
        Comparison::Equal => Ok(ValueAndState::new(Value::zero(), state.clone())),
        Comparison::Differs(difference) => Ok(ValueAndState::new(Value::Numeric(difference), state.clone())),
        Comparison::Distinct => {
            let (state, result) = state.fresh_symbolic_value();
            let state = state.with_constraint(Constraint::ne(result.clone(), Value::zero()));
            Ok(ValueAndState::new(result, state))
        }
        Comparison::Unknown => Ok(ValueAndState::unknown(state.clone())),
    }
}

/// Edge covering bit `position` of the window at `location`
fn edge_at(smg: &Smg, location: &MemoryLocation, position: &BigInt) -> Option<HasValueEdge> {
    smg.edges_in_range(location.object, &(&location.offset + position), &BigInt::one())
        .into_iter()
        .next()
}

fn compare_edges(state: &SmgState, a: &MemoryLocation, b: &MemoryLocation, bits: &BigInt) -> SmgResult<Comparison> {
    let spc = state.spc();
    let smg = spc.smg();
    if smg.edges_in_range(a.object, &a.offset, bits).is_empty()
        || smg.edges_in_range(b.object, &b.offset, bits).is_empty()
    {
        return Ok(Comparison::Unknown);
    }

    let mut position = BigInt::zero();
    while &position < bits {
        let (Some(ea), Some(eb)) = (edge_at(smg, a, &position), edge_at(smg, b, &position)) else {
            return Ok(Comparison::Unknown);
        };
        // edge bounds relative to the window start
        let (a_start, a_end) = (&ea.offset - &a.offset, ea.end() - &a.offset);
        let (b_start, b_end) = (&eb.offset - &b.offset, eb.end() - &b.offset);
        let va = spc.value_for(ea.value).cloned().unwrap_or(Value::Unknown);
        let vb = spc.value_for(eb.value).cloned().unwrap_or(Value::Unknown);

        if let (Value::Numeric(x), Value::Numeric(y)) = (&va, &vb) {
            if x.is_zero() && y.is_zero() {
                position = a_end.min(b_end).min(bits.clone());
                continue;
            }
            let bx = byte_of(x, &ea.size, &(&position - &a_start));
            let by = byte_of(y, &eb.size, &(&position - &b_start));
            match (bx, by) {
                (Some(bx), Some(by)) if bx != by => return Ok(Comparison::Differs(bx - by)),
                (Some(_), Some(_)) => {
                    position += 8;
                    continue;
                }
                _ => return Ok(Comparison::Unknown),
            }
        }

        if ea.value == eb.value && a_start == b_start && ea.size == eb.size {
            position = a_end.min(bits.clone());
            continue;
        }

        let aligned = a_start == position && b_start == position;
        if aligned && ea.size == eb.size {
            if &a_end > bits {
                return Ok(Comparison::Unknown);
            }
            return Ok(distinct_or_unknown(state, va, vb));
        }
        // a zero run on one side may be cut to the extent of the other edge
        if va.is_zero() && b_start == position && a_end >= b_end && &b_end <= bits {
            return Ok(distinct_or_unknown(state, va, vb));
        }
        if vb.is_zero() && a_start == position && b_end >= a_end && &a_end <= bits {
            return Ok(distinct_or_unknown(state, va, vb));
        }

        tracing::warn!(
            left = %ea.value,
            right = %eb.value,
            %position,
            "memcmp edges cannot be paired"
        );
        return Err(SmgError::UnresolvableMemcmp(format!(
            "edges {}+{} and {}+{} at bit {}",
            ea.offset, ea.size, eb.offset, eb.size, position
        )));
    }
    Ok(Comparison::Equal)
}

fn distinct_or_unknown(state: &SmgState, lhs: Value, rhs: Value) -> Comparison {
    if lhs.is_unknown() || rhs.is_unknown() {
        return Comparison::Unknown;
    }
    if state
        .solver()
        .is_unsat_with(&state.constraints(), Constraint::eq(lhs, rhs))
    {
        Comparison::Distinct
    } else {
        Comparison::Unknown
    }
}

/// Byte at bit `position` of a numeric edge of `width` bits
fn byte_of(value: &BigInt, width: &BigInt, position: &BigInt) -> Option<BigInt> {
    let width = u64::try_from(width).ok()?;
    let shift = u64::try_from(position).ok()?;
    Some((to_unsigned_bits(value, width) >> shift) & BigInt::from(0xff))
}

// ═══════════════════════════════════════════════════════════════════════════
// strcmp
// ═══════════════════════════════════════════════════════════════════════════

/// Byte-wise lexicographic comparison up to the first NUL
pub fn strcmp(state: &SmgState, lhs: &Value, rhs: &Value) -> SmgResult<Vec<ValueAndState>> {
    let (Some((a, a_offset)), Some((b, b_offset))) = (state.pointer_target(lhs), state.pointer_target(rhs)) else {
        if state.options().unknown_function_handling == UnknownFunctionHandling::Strict {
            return Err(SmgError::unsupported(format!(
                "strcmp on operands without concrete targets: {}, {}",
                lhs, rhs
            )));
        }
        return Ok(vec![ValueAndState::unknown(state.clone())]);
    };
    if a == b && a_offset == b_offset && state.is_object_valid(a) {
        return Ok(vec![ValueAndState::new(Value::zero(), state.clone())]);
    }

    let byte = BigInt::from(8);
    let errors_before = state.error_count();
    let mut state = state.clone();
    let mut position = BigInt::zero();
    loop {
        let left = state.read_value(a, &(&a_offset + &position), &byte)?;
        if left.state.error_count() > errors_before {
            return Ok(vec![ValueAndState::unknown(left.state)]);
        }
        let right = left.state.read_value(b, &(&b_offset + &position), &byte)?;
        state = right.state;
        if state.error_count() > errors_before {
            return Ok(vec![ValueAndState::unknown(state)]);
        }
        let (Some(x), Some(y)) = (left.value.as_numeric(), right.value.as_numeric()) else {
            return Ok(vec![ValueAndState::unknown(state)]);
        };
        let (x, y) = (to_unsigned_bits(x, 8), to_unsigned_bits(y, 8));
        if x != y {
            return Ok(vec![ValueAndState::new(Value::Numeric(x - y), state)]);
        }
        if x.is_zero() {
            return Ok(vec![ValueAndState::new(Value::zero(), state)]);
        }
        position += 8;
    }
}
