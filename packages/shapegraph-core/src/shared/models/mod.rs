//! Shared models: the front-end input consumed by the memory domain

pub mod c_type;
pub mod expression;
pub mod machine_model;

pub use c_type::{
    CType, CompositeKind, CompositeMember, CompositeType, FunctionDeclaration, FunctionType,
    IntKind,
};
pub use expression::{BinaryOp, CExpression, CFunctionCall, UnaryOp};
pub use machine_model::{CompositeLayout, MachineModel, BITS_PER_BYTE};
