//! Solver Port - the only way the memory domain talks to a decision procedure

use super::domain::{Constraint, SolverResult};
use crate::features::program_state::value::SymbolicId;
use num_bigint::BigInt;
use std::fmt;

/// Oracle for linear integer constraints over symbolic identifiers
///
/// # Implementors
/// - `IntervalSolver` (default, in-process)
pub trait SolverOracle: Send + Sync + fmt::Debug {
    /// Solver name for logging
    fn name(&self) -> &'static str;

    /// Satisfiability of the conjunction
    fn check(&self, constraints: &[Constraint]) -> SolverResult;

    /// A value of `id` in some model of the conjunction, `None` if unsat
    fn model_value(&self, constraints: &[Constraint], id: SymbolicId) -> Option<BigInt>;

    /// Conjunction plus `extra` is refuted
    fn is_unsat_with(&self, constraints: &[Constraint], extra: Constraint) -> bool {
        let mut all = constraints.to_vec();
        all.push(extra);
        self.check(&all).is_unsat()
    }
}
