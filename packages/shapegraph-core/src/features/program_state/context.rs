//! Analysis context shared by every state of one run

use crate::config::SmgOptions;
use crate::errors::SmgResult;
use crate::features::solver::{IntervalSolver, SolverOracle};
use crate::shared::models::MachineModel;
use regex::Regex;
use std::sync::Arc;

/// Options, machine model and solver; immutable for the whole run
#[derive(Debug)]
pub struct SmgContext {
    options: SmgOptions,
    machine_model: MachineModel,
    solver: Arc<dyn SolverOracle>,
    safe_function_patterns: Vec<Regex>,
}

impl SmgContext {
    /// Validate `options` and use the default interval solver
    pub fn new(options: SmgOptions, machine_model: MachineModel) -> SmgResult<Self> {
        Self::with_solver(options, machine_model, Arc::new(IntervalSolver::new()))
    }

    pub fn with_solver(
        options: SmgOptions,
        machine_model: MachineModel,
        solver: Arc<dyn SolverOracle>,
    ) -> SmgResult<Self> {
        options.validate()?;
        let safe_function_patterns = options.compiled_safe_patterns()?;
        tracing::debug!(
            machine_model = machine_model.name,
            solver = solver.name(),
            "Created SMG analysis context"
        );
        Ok(Self {
            options,
            machine_model,
            solver,
            safe_function_patterns,
        })
    }

    pub fn options(&self) -> &SmgOptions {
        &self.options
    }

    pub fn machine_model(&self) -> &MachineModel {
        &self.machine_model
    }

    pub fn solver(&self) -> &dyn SolverOracle {
        self.solver.as_ref()
    }

    /// Name matches one of the configured safe-function patterns
    pub fn is_safe_function(&self, name: &str) -> bool {
        self.safe_function_patterns
            .iter()
            .any(|pattern| pattern.is_match(name))
    }
}
