//! Builtin function semantics
//!
//! Every call goes through the same pipeline:
//!
//! ```text
//! name ──classify──▶ FunctionKind
//!                       │
//! arguments ──evaluate (left to right, forking)──▶ [values, state]*
//!                       │
//!                       ▼
//!            allocation | memory_ops | comparison | atexit | variadic | unknown
//!                       │
//!                       ▼
//!                 [ValueAndState]*
//! ```
//!
//! Name lists for allocators and deallocators come from [`SmgOptions`];
//! string and memory builtins are fixed.
//!
//! [`SmgOptions`]: crate::config::SmgOptions

pub mod allocation;
pub mod atexit;
pub mod comparison;
pub mod memory_ops;
pub mod unknown;
pub mod variadic;

use crate::config::SmgOptions;
use crate::errors::{SmgError, SmgResult};
use crate::features::expression_eval::evaluate_arguments;
use crate::features::program_state::{SmgState, ValueAndState};
use crate::shared::models::CFunctionCall;
use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;

// ═══════════════════════════════════════════════════════════════════════════
// Classification
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryOperation {
    Memset,
    Memcpy,
    Memcmp,
    Strcmp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariadicOperation {
    Start,
    Arg,
    Copy,
    End,
}

/// Modeled role of a called function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FunctionKind {
    /// `__VERIFIER_nondet_*`
    NondetGenerator,
    /// `alloca`, released with the frame
    AutomaticAllocation,
    /// `malloc`-like
    ManualAllocation,
    /// `calloc`-like
    ArrayAllocation,
    Deallocation,
    Reallocation,
    /// Stubs returning memory owned outside the program
    ExternalAllocation,
    MemoryOperation(MemoryOperation),
    AtExit,
    /// Pops the next registered exit handler
    AtExitNext,
    Variadic(VariadicOperation),
    Unknown,
}

const NONDET_PREFIX: &str = "__VERIFIER_nondet_";
const ATEXIT_NEXT: &str = "__CPACHECKER_atexit_next";

static FIXED_BUILTINS: Lazy<FxHashMap<&'static str, FunctionKind>> = Lazy::new(|| {
    use FunctionKind::{AtExit, AtExitNext, AutomaticAllocation, MemoryOperation as Mem, Variadic};
    use MemoryOperation::*;
    use VariadicOperation::*;

    let mut table = FxHashMap::default();
    for name in ["alloca", "__builtin_alloca"] {
        table.insert(name, AutomaticAllocation);
    }
    for (names, operation) in [
        (["memset", "__builtin_memset"], Memset),
        (["memcpy", "__builtin_memcpy"], Memcpy),
        (["memcmp", "__builtin_memcmp"], Memcmp),
        (["strcmp", "__builtin_strcmp"], Strcmp),
    ] {
        for name in names {
            table.insert(name, Mem(operation));
        }
    }
    for (names, operation) in [
        (["va_start", "__builtin_va_start"], Start),
        (["va_arg", "__builtin_va_arg"], Arg),
        (["va_copy", "__builtin_va_copy"], Copy),
        (["va_end", "__builtin_va_end"], End),
    ] {
        for name in names {
            table.insert(name, Variadic(operation));
        }
    }
    table.insert("atexit", AtExit);
    table.insert(ATEXIT_NEXT, AtExitNext);
    table
});

fn listed(list: &[String], name: &str) -> bool {
    list.iter().any(|entry| entry == name)
}

/// Role of `name` under `options`
pub fn classify(options: &SmgOptions, name: &str) -> FunctionKind {
    if name.starts_with(NONDET_PREFIX) {
        return FunctionKind::NondetGenerator;
    }
    if listed(&options.reallocation_functions, name) {
        return FunctionKind::Reallocation;
    }
    if listed(&options.deallocation_functions, name) {
        return FunctionKind::Deallocation;
    }
    if listed(&options.array_allocation_functions, name) {
        return FunctionKind::ArrayAllocation;
    }
    if listed(&options.memory_allocation_functions, name) || listed(&options.zeroing_allocation_functions, name) {
        return FunctionKind::ManualAllocation;
    }
    if listed(&options.external_allocation_functions, name) {
        return FunctionKind::ExternalAllocation;
    }
    FIXED_BUILTINS
        .get(name)
        .copied()
        .unwrap_or(FunctionKind::Unknown)
}

// ═══════════════════════════════════════════════════════════════════════════
// Dispatch
// ═══════════════════════════════════════════════════════════════════════════

/// Evaluate a call expression
pub fn handle_function_call(state: &SmgState, call: &CFunctionCall) -> SmgResult<Vec<ValueAndState>> {
    let name = call.name.as_str();
    let kind = classify(state.options(), name);
    tracing::trace!(function = name, ?kind, "Handling function call");

    // these take lvalues or need static operand types
    match kind {
        FunctionKind::Variadic(VariadicOperation::Arg) => {
            return Err(SmgError::unsupported(format!("{} is not modeled", name)));
        }
        FunctionKind::Variadic(operation) => return variadic::handle(state, operation, call),
        FunctionKind::MemoryOperation(MemoryOperation::Memcpy) => return memory_ops::memcpy(state, call),
        _ => {}
    }

    let mut results = Vec::new();
    for path in evaluate_arguments(state, &call.arguments)? {
        let values = path.values.as_slice();
        let state = &path.state;
        let outcomes = match kind {
            FunctionKind::NondetGenerator => {
                let (state, value) = state.fresh_symbolic_value();
                vec![ValueAndState::new(value, state)]
            }
            FunctionKind::AutomaticAllocation => {
                SmgError::check_arity(name, 1, values.len())?;
                allocation::alloca(state, name, &values[0])?
            }
            FunctionKind::ManualAllocation => {
                SmgError::check_arity(name, 1, values.len())?;
                let zeroing = listed(&state.options().zeroing_allocation_functions, name);
                allocation::malloc(state, name, &values[0], zeroing)?
            }
            FunctionKind::ArrayAllocation => {
                SmgError::check_arity(name, 2, values.len())?;
                allocation::calloc(state, name, &values[0], &values[1])?
            }
            FunctionKind::Deallocation => {
                SmgError::check_arity(name, 1, values.len())?;
                allocation::free(state, &values[0])?
            }
            FunctionKind::Reallocation => {
                SmgError::check_arity(name, 2, values.len())?;
                allocation::realloc(state, name, &values[0], &values[1])?
            }
            FunctionKind::ExternalAllocation => allocation::external_allocation(state, name),
            FunctionKind::MemoryOperation(MemoryOperation::Memset) => {
                SmgError::check_arity(name, 3, values.len())?;
                memory_ops::memset(state, name, &values[0], &values[1], &values[2])?
            }
            FunctionKind::MemoryOperation(MemoryOperation::Memcmp) => {
                SmgError::check_arity(name, 3, values.len())?;
                comparison::memcmp(state, name, &values[0], &values[1], &values[2])?
            }
            FunctionKind::MemoryOperation(MemoryOperation::Strcmp) => {
                SmgError::check_arity(name, 2, values.len())?;
                comparison::strcmp(state, &values[0], &values[1])?
            }
            FunctionKind::AtExit => {
                SmgError::check_arity(name, 1, values.len())?;
                atexit::register(state, &values[0])
            }
            FunctionKind::AtExitNext => {
                SmgError::check_arity(name, 0, values.len())?;
                atexit::next(state)
            }
            FunctionKind::Unknown => unknown::handle(state, call, values)?,
            FunctionKind::MemoryOperation(MemoryOperation::Memcpy) | FunctionKind::Variadic(_) => {
                unreachable!("dispatched before argument evaluation")
            }
        };
        results.extend(outcomes);
    }
    Ok(results)
}
