//! Machine model: type sizes, alignment and aggregate layout
//!
//! Struct layout follows the System V rules: each member is placed at the
//! next offset aligned to its own alignment, the total size is rounded up to
//! the largest member alignment. Unions place every member at offset 0.

use super::c_type::{CType, CompositeKind, CompositeType, IntKind};
use num_bigint::BigInt;

/// Bits per byte
pub const BITS_PER_BYTE: u64 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MachineModel {
    pub name: &'static str,
    pub sizeof_pointer: u64,
    pub sizeof_short: u64,
    pub sizeof_int: u64,
    pub sizeof_long: u64,
    pub sizeof_long_long: u64,
    pub sizeof_float: u64,
    pub sizeof_double: u64,
    pub alignof_long_long: u64,
    pub alignof_double: u64,
}

impl MachineModel {
    /// 32-bit Linux (i386 System V ABI)
    pub const LINUX32: MachineModel = MachineModel {
        name: "LINUX32",
        sizeof_pointer: 4,
        sizeof_short: 2,
        sizeof_int: 4,
        sizeof_long: 4,
        sizeof_long_long: 8,
        sizeof_float: 4,
        sizeof_double: 8,
        alignof_long_long: 4,
        alignof_double: 4,
    };

    /// 64-bit Linux (x86-64 System V ABI)
    pub const LINUX64: MachineModel = MachineModel {
        name: "LINUX64",
        sizeof_pointer: 8,
        sizeof_short: 2,
        sizeof_int: 4,
        sizeof_long: 8,
        sizeof_long_long: 8,
        sizeof_float: 4,
        sizeof_double: 8,
        alignof_long_long: 8,
        alignof_double: 8,
    };

    fn sizeof_integer(&self, kind: IntKind) -> u64 {
        match kind {
            IntKind::Bool | IntKind::Char => 1,
            IntKind::Short => self.sizeof_short,
            IntKind::Int => self.sizeof_int,
            IntKind::Long => self.sizeof_long,
            IntKind::LongLong => self.sizeof_long_long,
        }
    }

    /// Size in bytes
    pub fn sizeof(&self, ty: &CType) -> u64 {
        match ty {
            // GNU C: sizeof(void) == sizeof(function) == 1
            CType::Void | CType::Function(_) => 1,
            CType::Integer { kind, .. } => self.sizeof_integer(*kind),
            CType::Float => self.sizeof_float,
            CType::Double => self.sizeof_double,
            CType::Pointer(_) => self.sizeof_pointer,
            CType::Array { element, length } => self.sizeof(element) * length.unwrap_or(0),
            CType::Composite(composite) => self.composite_layout(composite).size,
        }
    }

    /// Size in bits
    pub fn sizeof_in_bits(&self, ty: &CType) -> BigInt {
        BigInt::from(self.sizeof(ty) * BITS_PER_BYTE)
    }

    /// Pointer width in bits
    pub fn pointer_size_in_bits(&self) -> BigInt {
        BigInt::from(self.sizeof_pointer * BITS_PER_BYTE)
    }

    /// Alignment in bytes
    pub fn alignof(&self, ty: &CType) -> u64 {
        match ty {
            CType::Void | CType::Function(_) => 1,
            CType::Integer {
                kind: IntKind::LongLong,
                ..
            } => self.alignof_long_long,
            CType::Integer { kind, .. } => self.sizeof_integer(*kind),
            CType::Float => self.sizeof_float,
            CType::Double => self.alignof_double,
            CType::Pointer(_) => self.sizeof_pointer,
            CType::Array { element, .. } => self.alignof(element),
            CType::Composite(composite) => self.composite_layout(composite).alignment,
        }
    }

    /// Offset of a member in bits, `None` if the member does not exist
    pub fn field_offset_in_bits(&self, composite: &CompositeType, field: &str) -> Option<BigInt> {
        self.composite_layout(composite)
            .members
            .into_iter()
            .find(|(name, _)| name == field)
            .map(|(_, offset)| BigInt::from(offset * BITS_PER_BYTE))
    }

    /// Byte offsets of all members plus the padded total size
    pub fn composite_layout(&self, composite: &CompositeType) -> CompositeLayout {
        let mut members = Vec::with_capacity(composite.members.len());
        let mut alignment = 1;
        let mut size = 0;

        for member in &composite.members {
            let member_align = self.alignof(&member.ty);
            let member_size = self.sizeof(&member.ty);
            alignment = alignment.max(member_align);
            match composite.kind {
                CompositeKind::Struct => {
                    let offset = round_up(size, member_align);
                    members.push((member.name.clone(), offset));
                    size = offset + member_size;
                }
                CompositeKind::Union => {
                    members.push((member.name.clone(), 0));
                    size = size.max(member_size);
                }
            }
        }

        CompositeLayout {
            members,
            size: round_up(size, alignment),
            alignment,
        }
    }
}

impl Default for MachineModel {
    fn default() -> Self {
        Self::LINUX64
    }
}

/// Computed layout of a struct or union (byte granularity)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositeLayout {
    pub members: Vec<(String, u64)>,
    pub size: u64,
    pub alignment: u64,
}

fn round_up(value: u64, alignment: u64) -> u64 {
    if alignment <= 1 {
        value
    } else {
        value.div_ceil(alignment) * alignment
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_sizes() {
        let m64 = MachineModel::LINUX64;
        assert_eq!(m64.sizeof(&CType::int()), 4);
        assert_eq!(m64.sizeof(&CType::long()), 8);
        assert_eq!(m64.sizeof(&CType::void_pointer()), 8);

        let m32 = MachineModel::LINUX32;
        assert_eq!(m32.sizeof(&CType::long()), 4);
        assert_eq!(m32.sizeof(&CType::void_pointer()), 4);
    }

    #[test]
    fn test_struct_padding() {
        let ty = CType::struct_of("s", vec![("a", CType::short()), ("b", CType::int())]);
        let composite = ty.as_composite().unwrap();
        let m = MachineModel::LINUX64;

        assert_eq!(m.sizeof(&ty), 8);
        assert_eq!(m.field_offset_in_bits(composite, "a"), Some(BigInt::from(0)));
        assert_eq!(m.field_offset_in_bits(composite, "b"), Some(BigInt::from(32)));
        assert_eq!(m.field_offset_in_bits(composite, "c"), None);
    }

    #[test]
    fn test_trailing_padding() {
        let ty = CType::struct_of(
            "t",
            vec![("p", CType::void_pointer()), ("c", CType::char())],
        );
        assert_eq!(MachineModel::LINUX64.sizeof(&ty), 16);
        assert_eq!(MachineModel::LINUX32.sizeof(&ty), 8);
    }

    #[test]
    fn test_long_long_alignment_differs() {
        let ty = CType::struct_of(
            "u",
            vec![
                ("c", CType::char()),
                (
                    "l",
                    CType::Integer {
                        kind: IntKind::LongLong,
                        signed: true,
                    },
                ),
            ],
        );
        assert_eq!(MachineModel::LINUX32.sizeof(&ty), 12);
        assert_eq!(MachineModel::LINUX64.sizeof(&ty), 16);
    }

    #[test]
    fn test_union_layout() {
        let ty = CType::union_of(
            "v",
            vec![("c", CType::array_of(CType::char(), 5)), ("i", CType::int())],
        );
        let m = MachineModel::LINUX64;
        assert_eq!(m.sizeof(&ty), 8);
        assert_eq!(
            m.field_offset_in_bits(ty.as_composite().unwrap(), "i"),
            Some(BigInt::from(0))
        );
    }

    #[test]
    fn test_array_size() {
        let ty = CType::array_of(CType::int(), 10);
        assert_eq!(MachineModel::LINUX64.sizeof_in_bits(&ty), BigInt::from(320));
    }
}
