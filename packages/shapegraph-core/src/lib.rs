/*
 * Shapegraph Core - Symbolic Memory Graph domain for C shape analysis
 *
 * Feature-First Architecture:
 * - shared/      : Front-end input (C types, expressions, machine model)
 * - features/    : Graph store, program state, access engine, visitors, builtins
 * - config/      : Presets and YAML options
 * - errors       : Hard modeling failures
 *
 * Memory-safety violations of the analysed program are data on the state
 * (ErrorInfo); only constructs the domain cannot represent are Err values.
 */

#![allow(clippy::too_many_arguments)] // Access primitives take object, offsets and sizes
#![allow(clippy::type_complexity)] // Branching results are lists of tuples
#![allow(clippy::new_without_default)] // Default impl not always needed

// ═══════════════════════════════════════════════════════════════════════════
// Module Exports - Feature-First Architecture
// ═══════════════════════════════════════════════════════════════════════════

/// Shared front-end models
pub mod shared;

/// Feature modules
pub mod features;

/// Configuration system
pub mod config;

/// Error types
pub mod errors;

// ═══════════════════════════════════════════════════════════════════════════
// Re-exports for Public API
// ═══════════════════════════════════════════════════════════════════════════

pub use config::{Preset, SmgOptions};
pub use errors::{SmgError, SmgResult};
pub use features::builtins::{classify, handle_function_call, FunctionKind};
pub use features::diagnostics::{ErrorInfo, Property};
pub use features::expression_eval::{evaluate, AddressVisitor, LValueVisitor, ValueVisitor};
pub use features::program_state::{
    LocationAndState, MemoryLocation, SmgContext, SmgState, SymbolicProgramConfiguration, Value,
    ValueAndState,
};
pub use features::smg::{ObjectId, ObjectKind, Smg, SmgObject, SmgValueId};
pub use shared::models::{CExpression, CType, MachineModel};
