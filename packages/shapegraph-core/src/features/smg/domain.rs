//! Graph entities: regions, graph values and the two edge kinds

use crate::features::program_state::value::Value;
use num_bigint::BigInt;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Region identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(pub u64);

impl ObjectId {
    /// The distinguished null region
    pub const NULL: ObjectId = ObjectId(0);

    pub fn is_null(&self) -> bool {
        *self == Self::NULL
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "obj#{}", self.0)
    }
}

/// Opaque graph value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SmgValueId(pub u64);

impl SmgValueId {
    /// Zero / null address value
    pub const ZERO: SmgValueId = SmgValueId(0);

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }
}

impl fmt::Display for SmgValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    Null,
    Heap,
    Stack,
    Global,
    /// Allocated by code outside the analysed program
    External,
    /// Zero-size target of a function designator
    Function,
}

/// Memory region
///
/// Identity-only equality: two regions are the same iff their ids match.
#[derive(Debug, Clone)]
pub struct SmgObject {
    pub id: ObjectId,
    /// Size in bits; `Value::Unknown` means unbounded
    pub size: Value,
    /// Base offset in bits
    pub offset: BigInt,
    pub kind: ObjectKind,
    pub label: String,
}

impl SmgObject {
    pub fn null() -> Self {
        Self {
            id: ObjectId::NULL,
            size: Value::zero(),
            offset: BigInt::from(0),
            kind: ObjectKind::Null,
            label: "NULL".to_string(),
        }
    }

    pub fn concrete_size(&self) -> Option<&BigInt> {
        self.size.as_numeric()
    }
}

impl PartialEq for SmgObject {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for SmgObject {}

impl std::hash::Hash for SmgObject {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for SmgObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}, {} bits)", self.label, self.id, self.size)
    }
}

/// `(offset, size) -> value` within one region; offsets and sizes in bits
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HasValueEdge {
    pub offset: BigInt,
    pub size: BigInt,
    pub value: SmgValueId,
}

impl HasValueEdge {
    pub fn new(offset: BigInt, size: BigInt, value: SmgValueId) -> Self {
        Self { offset, size, value }
    }

    /// Exclusive end offset
    pub fn end(&self) -> BigInt {
        &self.offset + &self.size
    }

    pub fn overlaps(&self, offset: &BigInt, size: &BigInt) -> bool {
        &self.offset < &(offset + size) && offset < &self.end()
    }

    pub fn is_within(&self, offset: &BigInt, size: &BigInt) -> bool {
        &self.offset >= offset && self.end() <= offset + size
    }
}

/// `value -> (region, offset)`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PointsToEdge {
    pub target: ObjectId,
    pub offset: BigInt,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge(offset: i64, size: i64) -> HasValueEdge {
        HasValueEdge::new(BigInt::from(offset), BigInt::from(size), SmgValueId(1))
    }

    #[test]
    fn test_overlap() {
        let e = edge(8, 16);
        assert!(e.overlaps(&BigInt::from(0), &BigInt::from(9)));
        assert!(e.overlaps(&BigInt::from(23), &BigInt::from(1)));
        assert!(!e.overlaps(&BigInt::from(0), &BigInt::from(8)));
        assert!(!e.overlaps(&BigInt::from(24), &BigInt::from(8)));
    }

    #[test]
    fn test_within() {
        let e = edge(8, 16);
        assert!(e.is_within(&BigInt::from(8), &BigInt::from(16)));
        assert!(e.is_within(&BigInt::from(0), &BigInt::from(32)));
        assert!(!e.is_within(&BigInt::from(16), &BigInt::from(16)));
    }

    #[test]
    fn test_object_identity() {
        let mut a = SmgObject::null();
        let b = SmgObject::null();
        a.label = "other".to_string();
        assert_eq!(a, b);
    }
}
