//! Program state: values, stack frames, the program configuration and the
//! analysis state handed to the outer framework
//!
//! ```text
//! SmgState
//! ├── SymbolicProgramConfiguration
//! │   ├── Smg                    graph store
//! │   ├── Value <-> SmgValueId   mapping
//! │   ├── StackFrame*            LIFO
//! │   └── globals, atexit, ...
//! ├── ErrorInfo*                 diagnostics
//! ├── Constraint*                path constraints
//! └── Arc<SmgContext>            options, machine model, solver
//! ```

pub mod context;
pub mod spc;
pub mod stack_frame;
pub mod state;
pub mod value;

pub use context::SmgContext;
pub use spc::{Spc, SymbolicProgramConfiguration};
pub use stack_frame::{StackFrame, ValueAndType};
pub use state::{LocationAndState, MemoryLocation, SmgState, ValueAndState};
pub use value::{AddressValue, SymbolicExpr, SymbolicId, Value};
