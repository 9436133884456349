//! `malloc`, `calloc`, `alloca`, `free`, `realloc` and external allocation

use crate::config::SymbolicSizeHandling;
use crate::errors::{SmgError, SmgResult};
use crate::features::memory_access::FreeTarget;
use crate::features::program_state::{SmgState, Value, ValueAndState};
use crate::features::solver::Constraint;
use num_bigint::BigInt;
use num_traits::{Signed, Zero};

/// Allocation size in bytes once the symbolic-size policy is applied
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum AllocationSize {
    Concrete(BigInt),
    /// Known to be positive on this path
    Symbolic(Value),
    /// No bound is tracked for the region
    Unbounded,
}

impl AllocationSize {
    fn in_bits(&self) -> Value {
        match self {
            AllocationSize::Concrete(bytes) => Value::Numeric(bytes * 8),
            AllocationSize::Symbolic(bytes) => bytes.times(&Value::from(8)),
            AllocationSize::Unbounded => Value::Unknown,
        }
    }
}

pub(crate) fn resolve_allocation_size(
    state: &SmgState,
    function: &str,
    size: &Value,
) -> SmgResult<Vec<(AllocationSize, SmgState)>> {
    if let Value::Numeric(bytes) = size {
        return Ok(vec![(AllocationSize::Concrete(bytes.clone()), state.clone())]);
    }

    match state.options().symbolic_size_handling {
        SymbolicSizeHandling::Abort => Err(SmgError::symbolic_size(
            function,
            format!("size {} is not a concrete number", size),
        )),
        SymbolicSizeHandling::GuessSize => {
            let guess = state.options().guess_size;
            tracing::debug!(function, %size, guess, "Guessing allocation size");
            Ok(vec![(AllocationSize::Concrete(BigInt::from(guess)), state.clone())])
        }
        SymbolicSizeHandling::Overapproximate => Ok(vec![(AllocationSize::Unbounded, state.clone())]),
        SymbolicSizeHandling::SolverSplit => {
            let (state, size) = if size.is_unknown() {
                state.fresh_symbolic_value()
            } else {
                (state.clone(), size.clone())
            };
            let zero = Constraint::eq(size.clone(), Value::zero());
            // a region of negative size cannot be allocated
            let positive = Constraint::gt(size.clone(), Value::zero());

            let mut branches = Vec::with_capacity(2);
            if state.is_feasible_with(&zero) {
                branches.push((AllocationSize::Concrete(BigInt::zero()), state.with_constraint(zero)));
            }
            if state.is_feasible_with(&positive) {
                branches.push((AllocationSize::Symbolic(size), state.with_constraint(positive)));
            }
            tracing::debug!(function, branches = branches.len(), "Split allocation on symbolic size");
            Ok(branches)
        }
    }
}

/// New heap region and its address
fn allocate_heap(state: &SmgState, label: &str, size: &AllocationSize, zeroing: bool) -> SmgResult<ValueAndState> {
    if let AllocationSize::Concrete(bytes) = size {
        if bytes.is_negative() || (bytes.is_zero() && state.options().malloc_zero_returns_null) {
            tracing::trace!(function = label, %bytes, "Allocation returns NULL");
            return Ok(ValueAndState::new(Value::zero(), state.clone()));
        }
    }

    let bits = size.in_bits();
    let (mut state, object) = state.create_heap_object(bits.clone(), label);
    if zeroing {
        match &bits {
            Value::Numeric(bits) if !bits.is_zero() => {
                state = state.write_zero(object.id, &BigInt::zero(), bits)?;
            }
            Value::Numeric(_) => {}
            _ => tracing::trace!(function = label, "Zeroing skipped for a region without concrete size"),
        }
    }
    let (state, address) = state.search_or_create_address(object.id, &BigInt::zero())?;
    Ok(ValueAndState::new(address, state))
}

/// `malloc(size)` and configured aliases
pub fn malloc(state: &SmgState, function: &str, size: &Value, zeroing: bool) -> SmgResult<Vec<ValueAndState>> {
    let mut results = Vec::new();
    for (size, branch) in resolve_allocation_size(state, function, size)? {
        results.push(allocate_heap(&branch, function, &size, zeroing)?);
    }
    if state.options().enable_malloc_failure {
        results.push(ValueAndState::new(Value::zero(), state.clone()));
    }
    Ok(results)
}

/// `calloc(count, size)`: always zeroing
pub fn calloc(state: &SmgState, function: &str, count: &Value, size: &Value) -> SmgResult<Vec<ValueAndState>> {
    malloc(state, function, &count.times(size), true)
}

/// `alloca(size)`: stack region bound in the current frame
pub fn alloca(state: &SmgState, function: &str, size: &Value) -> SmgResult<Vec<ValueAndState>> {
    let mut results = Vec::new();
    for (size, branch) in resolve_allocation_size(state, function, size)? {
        let (spc, name) = branch.spc().fresh_generated_name("alloca");
        let (branch, object) = branch.with_spc(spc).create_stack_variable(&name, size.in_bits());
        let (branch, address) = branch.search_or_create_address(object.id, &BigInt::zero())?;
        results.push(ValueAndState::new(address, branch));
    }
    Ok(results)
}

pub fn free(state: &SmgState, pointer: &Value) -> SmgResult<Vec<ValueAndState>> {
    Ok(vec![ValueAndState::unknown(state.free_object(pointer)?)])
}

/// `realloc(pointer, size)`
pub fn realloc(state: &SmgState, function: &str, pointer: &Value, size: &Value) -> SmgResult<Vec<ValueAndState>> {
    if size.is_zero() {
        let freed = state.free_object(pointer)?;
        return malloc(&freed, function, size, false);
    }
    if !size.is_numeric() && !state.options().track_predicates {
        return Err(SmgError::symbolic_size(
            function,
            "reallocation to a non-concrete size requires predicate tracking",
        ));
    }
    let old = match state.validate_free(pointer) {
        Ok(FreeTarget::Null) => return malloc(state, function, size, false),
        Ok(FreeTarget::Region(object)) => object,
        Err(error) => return Ok(vec![ValueAndState::unknown(state.with_error(error))]),
    };
    let old_size = state.object(old).map(|o| o.size.clone()).unwrap_or(Value::Unknown);

    let mut results = Vec::new();
    for allocated in malloc(state, function, size, false)? {
        // a failed reallocation leaves the old block alone
        let Some((new, _)) = allocated
            .state
            .pointer_target(&allocated.value)
            .filter(|(object, _)| !object.is_null())
        else {
            results.push(allocated);
            continue;
        };
        let new_size = allocated
            .state
            .object(new)
            .map(|o| o.size.clone())
            .unwrap_or(Value::Unknown);

        let copied = match (old_size.as_numeric(), new_size.as_numeric()) {
            (Some(a), Some(b)) if !a.min(b).is_zero() => {
                let bits = a.min(b).clone();
                allocated
                    .state
                    .copy_object_content(old, &BigInt::zero(), new, &BigInt::zero(), &bits)?
            }
            _ => allocated.state,
        };
        let state = copied.free_object_retaining(pointer, [&allocated.value])?;
        results.push(ValueAndState::new(allocated.value, state));
    }
    Ok(results)
}

/// Stub returning a fresh region owned outside the program
pub fn external_allocation(state: &SmgState, function: &str) -> Vec<ValueAndState> {
    let bits = BigInt::from(state.options().external_allocation_size) * 8;
    let (state, object) = state.create_external_object(Value::Numeric(bits), function);
    match state.search_or_create_address(object.id, &BigInt::zero()) {
        Ok((state, address)) => vec![ValueAndState::new(address, state)],
        Err(error) => {
            tracing::warn!(%error, "Could not address external region");
            vec![ValueAndState::unknown(state)]
        }
    }
}
