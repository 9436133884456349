//! Symbolic Memory Graph store
//!
//! Regions ([`SmgObject`]) connected by has-value edges
//! (`region × offset × size → value`) and points-to edges
//! (`value → region × offset`). All offsets and sizes are in bits.

pub mod domain;
pub mod graph;

pub use domain::{HasValueEdge, ObjectId, ObjectKind, PointsToEdge, SmgObject, SmgValueId};
pub use graph::Smg;
