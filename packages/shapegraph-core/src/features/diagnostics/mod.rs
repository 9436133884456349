//! Diagnostics: memory-safety violations as data attached to states

pub mod error_info;

pub use error_info::{ChainElement, ErrorInfo, Property};
