//! Solver oracle
//!
//! The memory domain only asks two questions: "is this conjunction of
//! linear constraints satisfiable?" and "give me one value of `x` in a
//! model". Both go through the [`SolverOracle`] port so an SMT backend can
//! replace the in-process [`IntervalSolver`].
//!
//! ```text
//! solver/
//! ├── domain            # Constraint, CompareOp, SolverResult
//! ├── ports             # SolverOracle
//! └── interval_solver   # default adapter
//! ```

pub mod domain;
pub mod interval_solver;
pub mod ports;

pub use domain::{CompareOp, Constraint, SolverResult};
pub use interval_solver::IntervalSolver;
pub use ports::SolverOracle;
