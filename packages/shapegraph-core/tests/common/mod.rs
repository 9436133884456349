//! Common test utilities for shapegraph-core
//!
//! This module provides shared fixtures and assertions
//! for the integration and property tests.

#![allow(dead_code)]

mod assertions;
mod fixtures;

// Re-export all utilities
pub use assertions::*;
pub use fixtures::*;
