// 3.0: equilibrium solver. finds the price vector where aggregate excess demand vanishes.
// limited-memory BFGS over price multipliers with a backtracking line search.
// stateless between calls: every solve starts from the caller's initial guess.

mod equilibrium;
mod lbfgs;
mod objective;
mod results;

pub use equilibrium::EquilibriumSolver;
pub use results::{ConvergenceReason, SolverResult, SolverStatus};
