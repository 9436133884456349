//! Shared module - Common types
//!
//! Types shared by all features: the typed C expression tree, C types and
//! the machine model. These come from the C front-end.

pub mod models;

pub use models::*;
