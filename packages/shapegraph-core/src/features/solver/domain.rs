//! Constraint model for solver queries

use crate::features::program_state::value::Value;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    /// Logical negation (`!(a < b)` is `a >= b`)
    pub fn negate(&self) -> Self {
        match self {
            CompareOp::Eq => CompareOp::Ne,
            CompareOp::Ne => CompareOp::Eq,
            CompareOp::Lt => CompareOp::Ge,
            CompareOp::Le => CompareOp::Gt,
            CompareOp::Gt => CompareOp::Le,
            CompareOp::Ge => CompareOp::Lt,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }
}

/// `lhs op rhs` over integers
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Constraint {
    pub lhs: Value,
    pub op: CompareOp,
    pub rhs: Value,
}

impl Constraint {
    pub fn new(lhs: Value, op: CompareOp, rhs: Value) -> Self {
        Self { lhs, op, rhs }
    }

    pub fn eq(lhs: Value, rhs: Value) -> Self {
        Self::new(lhs, CompareOp::Eq, rhs)
    }

    pub fn ne(lhs: Value, rhs: Value) -> Self {
        Self::new(lhs, CompareOp::Ne, rhs)
    }

    pub fn lt(lhs: Value, rhs: Value) -> Self {
        Self::new(lhs, CompareOp::Lt, rhs)
    }

    pub fn le(lhs: Value, rhs: Value) -> Self {
        Self::new(lhs, CompareOp::Le, rhs)
    }

    pub fn gt(lhs: Value, rhs: Value) -> Self {
        Self::new(lhs, CompareOp::Gt, rhs)
    }

    pub fn ge(lhs: Value, rhs: Value) -> Self {
        Self::new(lhs, CompareOp::Ge, rhs)
    }

    pub fn negate(&self) -> Self {
        Self::new(self.lhs.clone(), self.op.negate(), self.rhs.clone())
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.lhs, self.op.symbol(), self.rhs)
    }
}

/// Solver result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverResult {
    /// Satisfiable
    Sat,
    /// Unsatisfiable (contradiction)
    Unsat,
    /// Undecided (unsupported constraint shape)
    Unknown,
}

impl SolverResult {
    pub fn is_unsat(&self) -> bool {
        matches!(self, SolverResult::Unsat)
    }

    /// Not refuted
    pub fn is_feasible(&self) -> bool {
        !self.is_unsat()
    }
}
