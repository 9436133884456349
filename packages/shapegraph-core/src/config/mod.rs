//! Configuration System
//!
//! Two tiers:
//! - Level 1: Preset (one-liner)
//! - Level 2: YAML v1 file with field-level overrides
//!
//! # Examples
//!
//! ```rust,ignore
//! use shapegraph_core::config::{Preset, SmgOptions};
//!
//! // Level 1
//! let options = SmgOptions::from_preset(Preset::Thorough);
//!
//! // Builder tweaks on top of a preset
//! let options = SmgOptions::from_preset(Preset::Balanced)
//!     .enable_malloc_failure(true)
//!     .guess_size(16);
//!
//! // Level 2
//! let options = SmgOptions::from_yaml("smg.yaml")?;
//! ```

pub mod error;
pub mod io;
pub mod preset;
pub mod smg_options;

// Re-exports
pub use error::{ConfigError, ConfigResult};
pub use io::SmgConfigFileV1;
pub use preset::Preset;
pub use smg_options::{SmgOptions, SymbolicSizeHandling, UnknownFunctionHandling};
