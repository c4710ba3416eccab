// 3.0.2: result types for a single equilibrium solve.

use crate::demand::PriceVector;
use serde::{Deserialize, Serialize};

/// Which tolerance ended the iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConvergenceReason {
    Gradient,
    RelativeGradient,
    Objective,
    RelativeObjective,
    Parameter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolverStatus {
    Converged(ConvergenceReason),
    // iteration cap hit, best point returned
    IterationLimit,
    // no step along the search direction reduced the objective
    LineSearchFailed,
    // aggregate excess demand not finite at the initial guess
    InvalidStart,
}

impl SolverStatus {
    pub fn is_converged(&self) -> bool {
        matches!(self, SolverStatus::Converged(_))
    }
}

#[derive(Debug, Clone)]
pub struct SolverResult {
    /// One price per traded property, registration order.
    pub prices: PriceVector,
    /// Squared norm of aggregate excess demand at `prices`.
    pub residual: f64,
    /// Aggregate excess demand at `prices`, registration order.
    pub excess_demand: Vec<f64>,
    pub status: SolverStatus,
    pub iterations: usize,
    pub evaluations: usize,
}

impl SolverResult {
    pub fn is_converged(&self) -> bool {
        self.status.is_converged()
    }

    /// Usable as new quotes: finite, strictly positive prices.
    pub fn is_usable(&self) -> bool {
        self.status != SolverStatus::InvalidStart
            && self.prices.values().iter().all(|p| p.is_finite() && *p > 0.0)
    }
}
