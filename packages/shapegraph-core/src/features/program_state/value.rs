//! Program-level values
//!
//! ```text
//! Value ::= Numeric(n) | Symbolic(e) | Unknown | Address(base + offset)
//! e     ::= Ident(s) | e + e | e - e | e * e
//! ```
//!
//! Arithmetic folds concrete operands eagerly; anything that touches
//! `Unknown` stays `Unknown`. Offsets of `Address` values are in bits.

use num_bigint::BigInt;
use num_traits::{One, Signed, Zero};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

// ═══════════════════════════════════════════════════════════════════════════
// Core Types
// ═══════════════════════════════════════════════════════════════════════════

/// Symbolic identifier, allocated by the program configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SymbolicId(pub u64);

impl fmt::Display for SymbolicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

/// Linear arithmetic over values
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SymbolicExpr {
    Ident(SymbolicId),
    Add(Box<Value>, Box<Value>),
    Sub(Box<Value>, Box<Value>),
    Mul(Box<Value>, Box<Value>),
}

/// `base + offset`, where `base` is a pointer-valued identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AddressValue {
    pub base: SymbolicId,
    pub offset: Box<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Value {
    Numeric(BigInt),
    Symbolic(SymbolicExpr),
    Unknown,
    Address(AddressValue),
}

impl Value {
    pub fn numeric(n: impl Into<BigInt>) -> Self {
        Value::Numeric(n.into())
    }

    pub fn zero() -> Self {
        Value::Numeric(BigInt::zero())
    }

    pub fn ident(id: SymbolicId) -> Self {
        Value::Symbolic(SymbolicExpr::Ident(id))
    }

    /// `base + offset`; a zero offset collapses to the base identifier
    pub fn address(base: SymbolicId, offset: Value) -> Self {
        if offset.is_zero() {
            Value::ident(base)
        } else {
            Value::Address(AddressValue {
                base,
                offset: Box::new(offset),
            })
        }
    }

    pub fn as_numeric(&self) -> Option<&BigInt> {
        match self {
            Value::Numeric(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_ident(&self) -> Option<SymbolicId> {
        match self {
            Value::Symbolic(SymbolicExpr::Ident(id)) => Some(*id),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Numeric(_))
    }

    pub fn is_zero(&self) -> bool {
        matches!(self, Value::Numeric(n) if n.is_zero())
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Value::Unknown)
    }

    /// Free symbolic identifiers, in ascending order
    pub fn symbolic_ids(&self) -> BTreeSet<SymbolicId> {
        let mut ids = BTreeSet::new();
        self.collect_ids(&mut ids);
        ids
    }

    fn collect_ids(&self, ids: &mut BTreeSet<SymbolicId>) {
        match self {
            Value::Numeric(_) | Value::Unknown => {}
            Value::Symbolic(SymbolicExpr::Ident(id)) => {
                ids.insert(*id);
            }
            Value::Symbolic(
                SymbolicExpr::Add(a, b) | SymbolicExpr::Sub(a, b) | SymbolicExpr::Mul(a, b),
            ) => {
                a.collect_ids(ids);
                b.collect_ids(ids);
            }
            Value::Address(address) => {
                ids.insert(address.base);
                address.offset.collect_ids(ids);
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Arithmetic
    // ═══════════════════════════════════════════════════════════════════════

    pub fn plus(&self, other: &Value) -> Value {
        match (self, other) {
            (Value::Numeric(a), Value::Numeric(b)) => Value::Numeric(a + b),
            (Value::Unknown, _) | (_, Value::Unknown) => Value::Unknown,
            (Value::Address(_), Value::Address(_)) => Value::Unknown,
            (Value::Address(a), x) | (x, Value::Address(a)) => {
                Value::address(a.base, a.offset.plus(x))
            }
            (x, y) if y.is_zero() => x.clone(),
            (x, y) if x.is_zero() => y.clone(),
            (x, y) => Value::Symbolic(SymbolicExpr::Add(Box::new(x.clone()), Box::new(y.clone()))),
        }
    }

    pub fn minus(&self, other: &Value) -> Value {
        match (self, other) {
            (Value::Numeric(a), Value::Numeric(b)) => Value::Numeric(a - b),
            (Value::Unknown, _) | (_, Value::Unknown) => Value::Unknown,
            (Value::Address(a), Value::Address(b)) if a.base == b.base => a.offset.minus(&b.offset),
            (Value::Address(_), Value::Address(_)) | (_, Value::Address(_)) => Value::Unknown,
            (Value::Address(a), x) => Value::address(a.base, a.offset.minus(x)),
            (x, y) if y.is_zero() => x.clone(),
            (x, y) if x == y => Value::zero(),
            (x, y) => Value::Symbolic(SymbolicExpr::Sub(Box::new(x.clone()), Box::new(y.clone()))),
        }
    }

    pub fn times(&self, other: &Value) -> Value {
        match (self, other) {
            (Value::Numeric(a), Value::Numeric(b)) => Value::Numeric(a * b),
            (x, _) | (_, x) if x.is_zero() => Value::zero(),
            (Value::Unknown, _) | (_, Value::Unknown) => Value::Unknown,
            (Value::Address(_), _) | (_, Value::Address(_)) => Value::Unknown,
            (Value::Numeric(one), x) | (x, Value::Numeric(one)) if one.is_one() => x.clone(),
            (x, y) => Value::Symbolic(SymbolicExpr::Mul(Box::new(x.clone()), Box::new(y.clone()))),
        }
    }

    pub fn negate(&self) -> Value {
        match self {
            Value::Numeric(n) => Value::Numeric(-n),
            other => other.times(&Value::numeric(-1)),
        }
    }

    /// Replace `id` by a concrete number and fold
    pub fn substitute(&self, id: SymbolicId, replacement: &BigInt) -> Value {
        match self {
            Value::Numeric(_) | Value::Unknown => self.clone(),
            Value::Symbolic(SymbolicExpr::Ident(own)) => {
                if *own == id {
                    Value::Numeric(replacement.clone())
                } else {
                    self.clone()
                }
            }
            Value::Symbolic(SymbolicExpr::Add(a, b)) => a
                .substitute(id, replacement)
                .plus(&b.substitute(id, replacement)),
            Value::Symbolic(SymbolicExpr::Sub(a, b)) => a
                .substitute(id, replacement)
                .minus(&b.substitute(id, replacement)),
            Value::Symbolic(SymbolicExpr::Mul(a, b)) => a
                .substitute(id, replacement)
                .times(&b.substitute(id, replacement)),
            Value::Address(address) => {
                Value::address(address.base, address.offset.substitute(id, replacement))
            }
        }
    }
}

/// Interpret `n` as an unsigned bit pattern of `bits` width
pub fn to_unsigned_bits(n: &BigInt, bits: u64) -> BigInt {
    let modulus = BigInt::one() << bits;
    let r = n % &modulus;
    if r.is_negative() {
        r + modulus
    } else {
        r
    }
}

/// Truncate `n` to `bits` and reinterpret as two's complement when `signed`
pub fn wrap_to_width(n: &BigInt, bits: u64, signed: bool) -> BigInt {
    if bits == 0 {
        return BigInt::zero();
    }
    let unsigned = to_unsigned_bits(n, bits);
    if signed && unsigned >= (BigInt::one() << (bits - 1)) {
        unsigned - (BigInt::one() << bits)
    } else {
        unsigned
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Numeric(n) => write!(f, "{}", n),
            Value::Symbolic(SymbolicExpr::Ident(id)) => write!(f, "{}", id),
            Value::Symbolic(SymbolicExpr::Add(a, b)) => write!(f, "({} + {})", a, b),
            Value::Symbolic(SymbolicExpr::Sub(a, b)) => write!(f, "({} - {})", a, b),
            Value::Symbolic(SymbolicExpr::Mul(a, b)) => write!(f, "({} * {})", a, b),
            Value::Unknown => write!(f, "unknown"),
            Value::Address(address) => write!(f, "&{}+{}", address.base, address.offset),
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::numeric(n)
    }
}
