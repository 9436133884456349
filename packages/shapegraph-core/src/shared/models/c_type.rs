//! C type model
//!
//! Mirrors what the C front-end hands over after type checking. Only the
//! information needed for memory layout and pointer arithmetic is kept.

use std::fmt;
use std::sync::Arc;

/// Integer rank
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntKind {
    Bool,
    Char,
    Short,
    Int,
    Long,
    LongLong,
}

/// Struct or union
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompositeKind {
    Struct,
    Union,
}

/// C type after front-end resolution
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CType {
    Void,
    Integer { kind: IntKind, signed: bool },
    /// Only sized, never evaluated
    Float,
    /// Only sized, never evaluated
    Double,
    Pointer(Box<CType>),
    /// `length == None` for incomplete arrays (`int a[]`)
    Array {
        element: Box<CType>,
        length: Option<u64>,
    },
    Composite(Arc<CompositeType>),
    Function(Arc<FunctionType>),
}

/// Struct/union definition
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CompositeType {
    pub name: String,
    pub kind: CompositeKind,
    pub members: Vec<CompositeMember>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CompositeMember {
    pub name: String,
    pub ty: CType,
}

/// Function signature
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FunctionType {
    pub return_type: CType,
    pub parameters: Vec<CType>,
    pub variadic: bool,
}

/// Function definition header, as needed to build a stack frame
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FunctionDeclaration {
    pub name: String,
    pub ty: Arc<FunctionType>,
    pub parameter_names: Vec<String>,
}

impl FunctionDeclaration {
    pub fn new(
        name: impl Into<String>,
        return_type: CType,
        parameters: Vec<(String, CType)>,
        variadic: bool,
    ) -> Self {
        let (parameter_names, parameter_types): (Vec<_>, Vec<_>) = parameters.into_iter().unzip();
        Self {
            name: name.into(),
            ty: Arc::new(FunctionType {
                return_type,
                parameters: parameter_types,
                variadic,
            }),
            parameter_names,
        }
    }

    pub fn return_type(&self) -> &CType {
        &self.ty.return_type
    }

    pub fn is_variadic(&self) -> bool {
        self.ty.variadic
    }
}

impl CType {
    pub fn int() -> Self {
        CType::Integer {
            kind: IntKind::Int,
            signed: true,
        }
    }

    pub fn unsigned_int() -> Self {
        CType::Integer {
            kind: IntKind::Int,
            signed: false,
        }
    }

    pub fn char() -> Self {
        CType::Integer {
            kind: IntKind::Char,
            signed: true,
        }
    }

    pub fn unsigned_char() -> Self {
        CType::Integer {
            kind: IntKind::Char,
            signed: false,
        }
    }

    pub fn short() -> Self {
        CType::Integer {
            kind: IntKind::Short,
            signed: true,
        }
    }

    pub fn long() -> Self {
        CType::Integer {
            kind: IntKind::Long,
            signed: true,
        }
    }

    /// `size_t` (unsigned long on the supported machine models)
    pub fn size_t() -> Self {
        CType::Integer {
            kind: IntKind::Long,
            signed: false,
        }
    }

    pub fn pointer_to(target: CType) -> Self {
        CType::Pointer(Box::new(target))
    }

    pub fn void_pointer() -> Self {
        CType::Pointer(Box::new(CType::Void))
    }

    pub fn array_of(element: CType, length: u64) -> Self {
        CType::Array {
            element: Box::new(element),
            length: Some(length),
        }
    }

    pub fn struct_of(name: impl Into<String>, members: Vec<(&str, CType)>) -> Self {
        Self::composite(name, CompositeKind::Struct, members)
    }

    pub fn union_of(name: impl Into<String>, members: Vec<(&str, CType)>) -> Self {
        Self::composite(name, CompositeKind::Union, members)
    }

    fn composite(name: impl Into<String>, kind: CompositeKind, members: Vec<(&str, CType)>) -> Self {
        CType::Composite(Arc::new(CompositeType {
            name: name.into(),
            kind,
            members: members
                .into_iter()
                .map(|(name, ty)| CompositeMember {
                    name: name.to_string(),
                    ty,
                })
                .collect(),
        }))
    }

    pub fn function(return_type: CType, parameters: Vec<CType>, variadic: bool) -> Self {
        CType::Function(Arc::new(FunctionType {
            return_type,
            parameters,
            variadic,
        }))
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self, CType::Pointer(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self, CType::Array { .. })
    }

    pub fn is_composite(&self) -> bool {
        matches!(self, CType::Composite(_))
    }

    pub fn is_function(&self) -> bool {
        matches!(self, CType::Function(_))
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, CType::Integer { .. })
    }

    /// Types whose value is an address rather than their contents
    pub fn is_aggregate(&self) -> bool {
        self.is_array() || self.is_composite()
    }

    pub fn is_signed(&self) -> bool {
        matches!(self, CType::Integer { signed: true, .. })
    }

    /// Pointed-to type of a pointer, element type of an array
    pub fn pointee(&self) -> Option<&CType> {
        match self {
            CType::Pointer(target) => Some(target.as_ref()),
            CType::Array { element, .. } => Some(element.as_ref()),
            _ => None,
        }
    }

    pub fn as_composite(&self) -> Option<&CompositeType> {
        match self {
            CType::Composite(composite) => Some(composite.as_ref()),
            _ => None,
        }
    }

    /// Strip a single pointer level if present (the owner type of `->`)
    pub fn dereferenced_composite(&self) -> Option<&CompositeType> {
        match self {
            CType::Pointer(target) => target.as_composite(),
            other => other.as_composite(),
        }
    }
}

impl CompositeType {
    pub fn member(&self, name: &str) -> Option<&CompositeMember> {
        self.members.iter().find(|m| m.name == name)
    }
}

impl fmt::Display for CType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CType::Void => write!(f, "void"),
            CType::Integer { kind, signed } => {
                if !signed {
                    write!(f, "unsigned ")?;
                }
                let name = match kind {
                    IntKind::Bool => "_Bool",
                    IntKind::Char => "char",
                    IntKind::Short => "short",
                    IntKind::Int => "int",
                    IntKind::Long => "long",
                    IntKind::LongLong => "long long",
                };
                write!(f, "{}", name)
            }
            CType::Float => write!(f, "float"),
            CType::Double => write!(f, "double"),
            CType::Pointer(target) => write!(f, "{}*", target),
            CType::Array { element, length } => match length {
                Some(n) => write!(f, "{}[{}]", element, n),
                None => write!(f, "{}[]", element),
            },
            CType::Composite(composite) => match composite.kind {
                CompositeKind::Struct => write!(f, "struct {}", composite.name),
                CompositeKind::Union => write!(f, "union {}", composite.name),
            },
            CType::Function(function) => write!(f, "{}(*)(...)", function.return_type),
        }
    }
}
