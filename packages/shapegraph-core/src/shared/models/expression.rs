//! Typed C expression tree
//!
//! Closed tagged union handed over by the C front-end. Every node carries its
//! resolved static type, which drives sizes and pointer arithmetic.

use super::c_type::CType;
use num_bigint::BigInt;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    ShiftLeft,
    ShiftRight,
    BitAnd,
    BitOr,
    BitXor,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl BinaryOp {
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Minus,
    BitNot,
    LogicalNot,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CExpression {
    IntLiteral {
        value: BigInt,
        ty: CType,
    },
    StringLiteral {
        value: String,
        ty: CType,
    },
    Id {
        name: String,
        ty: CType,
    },
    /// `owner.field`, or `owner->field` when `arrow` is set
    FieldRef {
        owner: Box<CExpression>,
        field: String,
        arrow: bool,
        ty: CType,
    },
    ArraySubscript {
        array: Box<CExpression>,
        index: Box<CExpression>,
        ty: CType,
    },
    PointerDeref {
        operand: Box<CExpression>,
        ty: CType,
    },
    AddressOf {
        operand: Box<CExpression>,
        ty: CType,
    },
    Cast {
        operand: Box<CExpression>,
        ty: CType,
    },
    Unary {
        op: UnaryOp,
        operand: Box<CExpression>,
        ty: CType,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<CExpression>,
        rhs: Box<CExpression>,
        ty: CType,
    },
    /// `sizeof(type)`; `sizeof expr` is lowered to this by the front-end
    SizeOf {
        of: CType,
        ty: CType,
    },
    Call(CFunctionCall),
}

/// Call with resolved callee name and argument expressions
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CFunctionCall {
    pub name: String,
    pub arguments: Vec<CExpression>,
    pub return_type: CType,
}

impl CFunctionCall {
    pub fn new(name: impl Into<String>, arguments: Vec<CExpression>, return_type: CType) -> Self {
        Self {
            name: name.into(),
            arguments,
            return_type,
        }
    }
}

impl CExpression {
    /// Static type of the expression
    pub fn ty(&self) -> &CType {
        match self {
            CExpression::IntLiteral { ty, .. }
            | CExpression::StringLiteral { ty, .. }
            | CExpression::Id { ty, .. }
            | CExpression::FieldRef { ty, .. }
            | CExpression::ArraySubscript { ty, .. }
            | CExpression::PointerDeref { ty, .. }
            | CExpression::AddressOf { ty, .. }
            | CExpression::Cast { ty, .. }
            | CExpression::Unary { ty, .. }
            | CExpression::Binary { ty, .. }
            | CExpression::SizeOf { ty, .. } => ty,
            CExpression::Call(call) => &call.return_type,
        }
    }

    pub fn int(value: i64) -> Self {
        CExpression::IntLiteral {
            value: BigInt::from(value),
            ty: CType::int(),
        }
    }

    pub fn int_of(value: i64, ty: CType) -> Self {
        CExpression::IntLiteral {
            value: BigInt::from(value),
            ty,
        }
    }

    /// String literal, typed `char[len + 1]`
    pub fn string(value: impl Into<String>) -> Self {
        let value = value.into();
        let ty = CType::array_of(CType::char(), value.len() as u64 + 1);
        CExpression::StringLiteral { value, ty }
    }

    pub fn id(name: impl Into<String>, ty: CType) -> Self {
        CExpression::Id {
            name: name.into(),
            ty,
        }
    }

    pub fn field(owner: CExpression, field: impl Into<String>, ty: CType) -> Self {
        CExpression::FieldRef {
            owner: Box::new(owner),
            field: field.into(),
            arrow: false,
            ty,
        }
    }

    pub fn arrow(owner: CExpression, field: impl Into<String>, ty: CType) -> Self {
        CExpression::FieldRef {
            owner: Box::new(owner),
            field: field.into(),
            arrow: true,
            ty,
        }
    }

    /// `array[index]`, typed by the element type of `array`
    pub fn subscript(array: CExpression, index: CExpression) -> Self {
        let ty = array.ty().pointee().cloned().unwrap_or(CType::Void);
        CExpression::ArraySubscript {
            array: Box::new(array),
            index: Box::new(index),
            ty,
        }
    }

    /// `*operand`, typed by the pointee of `operand`
    pub fn deref(operand: CExpression) -> Self {
        let ty = operand.ty().pointee().cloned().unwrap_or(CType::Void);
        CExpression::PointerDeref {
            operand: Box::new(operand),
            ty,
        }
    }

    /// `&operand`
    pub fn address_of(operand: CExpression) -> Self {
        let ty = CType::pointer_to(operand.ty().clone());
        CExpression::AddressOf {
            operand: Box::new(operand),
            ty,
        }
    }

    pub fn cast(operand: CExpression, ty: CType) -> Self {
        CExpression::Cast {
            operand: Box::new(operand),
            ty,
        }
    }

    pub fn unary(op: UnaryOp, operand: CExpression) -> Self {
        let ty = operand.ty().clone();
        CExpression::Unary {
            op,
            operand: Box::new(operand),
            ty,
        }
    }

    pub fn binary(op: BinaryOp, lhs: CExpression, rhs: CExpression, ty: CType) -> Self {
        CExpression::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
            ty,
        }
    }

    pub fn sizeof(of: CType) -> Self {
        CExpression::SizeOf {
            of,
            ty: CType::size_t(),
        }
    }

    pub fn call(name: impl Into<String>, arguments: Vec<CExpression>, return_type: CType) -> Self {
        CExpression::Call(CFunctionCall::new(name, arguments, return_type))
    }
}

impl fmt::Display for CExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CExpression::IntLiteral { value, .. } => write!(f, "{}", value),
            CExpression::StringLiteral { value, .. } => write!(f, "{:?}", value),
            CExpression::Id { name, .. } => write!(f, "{}", name),
            CExpression::FieldRef {
                owner,
                field,
                arrow,
                ..
            } => write!(f, "{}{}{}", owner, if *arrow { "->" } else { "." }, field),
            CExpression::ArraySubscript { array, index, .. } => write!(f, "{}[{}]", array, index),
            CExpression::PointerDeref { operand, .. } => write!(f, "*({})", operand),
            CExpression::AddressOf { operand, .. } => write!(f, "&({})", operand),
            CExpression::Cast { operand, ty } => write!(f, "({})({})", ty, operand),
            CExpression::Unary { op, operand, .. } => {
                let symbol = match op {
                    UnaryOp::Minus => "-",
                    UnaryOp::BitNot => "~",
                    UnaryOp::LogicalNot => "!",
                };
                write!(f, "{}({})", symbol, operand)
            }
            CExpression::Binary { op, lhs, rhs, .. } => write!(f, "({} {:?} {})", lhs, op, rhs),
            CExpression::SizeOf { of, .. } => write!(f, "sizeof({})", of),
            CExpression::Call(call) => {
                write!(f, "{}(", call.name)?;
                for (i, argument) in call.arguments.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", argument)?;
                }
                write!(f, ")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_helper_types() {
        let p = CExpression::id("p", CType::pointer_to(CType::int()));
        assert_eq!(CExpression::deref(p.clone()).ty(), &CType::int());
        assert_eq!(
            CExpression::address_of(p.clone()).ty(),
            &CType::pointer_to(CType::pointer_to(CType::int()))
        );
        assert_eq!(CExpression::subscript(p, CExpression::int(2)).ty(), &CType::int());
    }

    #[test]
    fn test_string_literal_type() {
        let s = CExpression::string("abc");
        assert_eq!(s.ty(), &CType::array_of(CType::char(), 4));
    }

    #[test]
    fn test_display() {
        let s = CExpression::id("s", CType::void_pointer());
        let call = CExpression::call("free", vec![s], CType::Void);
        assert_eq!(call.to_string(), "free(s)");
    }
}
