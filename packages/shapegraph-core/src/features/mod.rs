//! Feature modules of the memory domain
//!
//! ```text
//! smg             graph store: regions, has-value and points-to edges
//! program_state   SPC, stack frames, values, SmgState
//! memory_access   read / write / dereference / copy / free
//! expression_eval value, lvalue and address visitors, statements
//! builtins        allocation, memory and string functions, atexit, va_*
//! diagnostics     ErrorInfo
//! solver          constraint oracle port and interval adapter
//! ```

pub mod builtins;
pub mod diagnostics;
pub mod expression_eval;
pub mod memory_access;
pub mod program_state;
pub mod smg;
pub mod solver;
