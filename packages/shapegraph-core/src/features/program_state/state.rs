//! Analysis state: configuration plus diagnostics and path constraints
//!
//! `SmgState` is what the outer framework stores per program location.
//! Cloning is cheap (persistent containers plus an `Arc` context).

use super::context::SmgContext;
use super::spc::SymbolicProgramConfiguration;
use super::stack_frame::ValueAndType;
use super::value::Value;
use crate::config::SmgOptions;
use crate::errors::SmgResult;
use crate::features::diagnostics::{ErrorInfo, Property};
use crate::features::smg::{ObjectId, ObjectKind, SmgObject};
use crate::features::solver::{Constraint, SolverOracle};
use crate::shared::models::{FunctionDeclaration, MachineModel};
use num_bigint::BigInt;
use rpds::VectorSync;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct SmgState {
    spc: SymbolicProgramConfiguration,
    errors: VectorSync<ErrorInfo>,
    constraints: VectorSync<Constraint>,
    context: Arc<SmgContext>,
}

impl SmgState {
    pub fn new(context: Arc<SmgContext>) -> Self {
        Self {
            spc: SymbolicProgramConfiguration::new(),
            errors: VectorSync::new_sync(),
            constraints: VectorSync::new_sync(),
            context,
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Context
    // ═══════════════════════════════════════════════════════════════════════

    pub fn context(&self) -> &Arc<SmgContext> {
        &self.context
    }

    pub fn options(&self) -> &SmgOptions {
        self.context.options()
    }

    pub fn machine_model(&self) -> &MachineModel {
        self.context.machine_model()
    }

    pub fn solver(&self) -> &dyn SolverOracle {
        self.context.solver()
    }

    pub fn spc(&self) -> &SymbolicProgramConfiguration {
        &self.spc
    }

    pub fn with_spc(&self, spc: SymbolicProgramConfiguration) -> Self {
        let mut state = self.clone();
        state.spc = spc;
        state
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Diagnostics
    // ═══════════════════════════════════════════════════════════════════════

    pub fn with_error(&self, error: ErrorInfo) -> Self {
        tracing::debug!(property = %error.property, "{}", error);
        let mut state = self.clone();
        state.errors.push_back_mut(error);
        state
    }

    pub fn errors(&self) -> impl Iterator<Item = &ErrorInfo> + '_ {
        self.errors.iter()
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn errors_of(&self, property: Property) -> usize {
        self.errors.iter().filter(|e| e.is(property)).count()
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Path constraints
    // ═══════════════════════════════════════════════════════════════════════

    pub fn with_constraint(&self, constraint: Constraint) -> Self {
        tracing::trace!(%constraint, "Assumed constraint");
        let mut state = self.clone();
        state.constraints.push_back_mut(constraint);
        state
    }

    pub fn constraints(&self) -> Vec<Constraint> {
        self.constraints.iter().cloned().collect()
    }

    /// Current constraints plus `extra` are not refuted by the solver
    pub fn is_feasible_with(&self, extra: &Constraint) -> bool {
        !self.solver().is_unsat_with(&self.constraints(), extra.clone())
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Configuration shortcuts
    // ═══════════════════════════════════════════════════════════════════════

    pub fn fresh_symbolic_value(&self) -> (Self, Value) {
        let (spc, value) = self.spc.fresh_symbolic_value();
        (self.with_spc(spc), value)
    }

    pub fn search_or_create_address(&self, object: ObjectId, offset: &BigInt) -> SmgResult<(Self, Value)> {
        let (spc, value) = self.spc.search_or_create_address(object, offset)?;
        Ok((self.with_spc(spc), value))
    }

    pub fn pointer_target(&self, value: &Value) -> Option<(ObjectId, BigInt)> {
        self.spc.pointer_target(value)
    }

    pub fn object(&self, id: ObjectId) -> Option<&SmgObject> {
        self.spc.object(id)
    }

    pub fn is_object_valid(&self, id: ObjectId) -> bool {
        self.spc.is_object_valid(id)
    }

    /// New heap region registered for leak tracking
    pub fn create_heap_object(&self, size: Value, label: &str) -> (Self, SmgObject) {
        let (spc, object) = self.spc.copy_and_create_object(size, ObjectKind::Heap, label);
        let spc = spc.copy_and_add_heap_object(object.clone());
        tracing::debug!(object = %object, "Allocated heap region");
        (self.with_spc(spc), object)
    }

    pub fn create_external_object(&self, size: Value, label: &str) -> (Self, SmgObject) {
        let (spc, object) = self.spc.copy_and_create_object(size, ObjectKind::External, label);
        let spc = spc.copy_and_add_external_object(object.clone());
        tracing::debug!(object = %object, "Allocated external region");
        (self.with_spc(spc), object)
    }

    /// Stack region bound to `name` in the top frame
    pub fn create_stack_variable(&self, name: &str, size: Value) -> (Self, SmgObject) {
        let (spc, object) = self.spc.copy_and_create_object(size, ObjectKind::Stack, name);
        let spc = spc.copy_and_add_stack_variable(name, object.clone());
        (self.with_spc(spc), object)
    }

    pub fn create_global_variable(&self, name: &str, size: Value) -> (Self, SmgObject) {
        let (spc, object) = self.spc.copy_and_create_object(size, ObjectKind::Global, name);
        let spc = spc.copy_and_add_global_variable(name, object.clone());
        (self.with_spc(spc), object)
    }

    pub fn push_stack_frame(
        &self,
        function: FunctionDeclaration,
        return_size: Option<BigInt>,
        variadic_arguments: Option<Vec<ValueAndType>>,
    ) -> Self {
        tracing::trace!(function = %function.name, "Entering stack frame");
        self.with_spc(
            self.spc
                .copy_and_add_stack_frame(function, return_size, variadic_arguments),
        )
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Scope exit and garbage collection
    // ═══════════════════════════════════════════════════════════════════════

    /// Pop the top frame, then prune. `returned` keeps the values handed back
    /// to the caller alive.
    pub fn drop_stack_frame<'v>(&self, returned: impl IntoIterator<Item = &'v Value>) -> Self {
        let popped = self.with_spc(self.spc.drop_stack_frame());
        popped.prune_unreachable(returned)
    }

    /// Garbage-collect unreachable regions, reporting leaked heap regions
    /// as one memory-leak error.
    pub fn prune_unreachable<'v>(&self, extra_roots: impl IntoIterator<Item = &'v Value>) -> Self {
        let (spc, leaked) = self.spc.copy_and_prune_unreachable(extra_roots);
        let state = self.with_spc(spc);
        if leaked.is_empty() || !self.options().check_memory_leaks {
            return state;
        }
        tracing::debug!(count = leaked.len(), "Detected leaked heap regions");
        let labels: Vec<String> = leaked.iter().map(|object| object.to_string()).collect();
        let mut error = ErrorInfo::memory_leak(format!("Memory leak of {}", labels.join(", ")));
        let smg = self.spc.smg();
        for object in &leaked {
            error = error.with_object(object);
            // pointers between leaked regions, read from the graph before pruning
            let links = smg.edges_of(object.id).filter(|edge| {
                smg.points_to(edge.value)
                    .is_some_and(|target| leaked.iter().any(|other| other.id == target.target))
            });
            for edge in links {
                error = error.with_edge(object.id, edge.clone());
            }
        }
        state.with_error(error)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Operation results
// ═══════════════════════════════════════════════════════════════════════════

/// A region and a concrete bit offset into it
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MemoryLocation {
    pub object: ObjectId,
    pub offset: BigInt,
}

impl MemoryLocation {
    pub fn new(object: ObjectId, offset: BigInt) -> Self {
        Self { object, offset }
    }

    pub fn with_added_offset(&self, extra: &BigInt) -> Self {
        Self {
            object: self.object,
            offset: &self.offset + extra,
        }
    }
}

/// One outcome of a value-producing operation
#[derive(Debug, Clone)]
pub struct ValueAndState {
    pub value: Value,
    pub state: SmgState,
}

impl ValueAndState {
    pub fn new(value: Value, state: SmgState) -> Self {
        Self { value, state }
    }

    pub fn unknown(state: SmgState) -> Self {
        Self::new(Value::Unknown, state)
    }
}

/// One outcome of an lvalue resolution; `None` means "no memory there"
#[derive(Debug, Clone)]
pub struct LocationAndState {
    pub location: Option<MemoryLocation>,
    pub state: SmgState,
}

impl LocationAndState {
    pub fn new(location: MemoryLocation, state: SmgState) -> Self {
        Self {
            location: Some(location),
            state,
        }
    }

    pub fn none(state: SmgState) -> Self {
        Self {
            location: None,
            state,
        }
    }
}
