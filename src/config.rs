// 7.0 config.rs: all settings in one place. solver tolerances, transfer threshold, quote precision.
// 7.1 SolverConfig defaults are the documented tolerances. no per-call tuning.

use serde::{Deserialize, Serialize};

pub const DEFAULT_HISTORY_SIZE: usize = 5;
pub const DEFAULT_INITIAL_STEP: f64 = 1e-3;
pub const DEFAULT_TOL_OBJ: f64 = 1e-13;
pub const DEFAULT_TOL_REL_OBJ: f64 = 1e3;
pub const DEFAULT_TOL_GRAD: f64 = 1e-9;
pub const DEFAULT_TOL_REL_GRAD: f64 = 1e3;
pub const DEFAULT_TOL_PARAM: f64 = 1e-9;
pub const DEFAULT_MAX_ITERATIONS: usize = 10_000;
pub const DEFAULT_MINIMUM_TRANSFER: f64 = 1e-4;
pub const DEFAULT_QUOTE_DECIMALS: u32 = 2;

// largest scale rust_decimal can represent
const MAX_QUOTE_DECIMALS: u32 = 28;

/// Limited-memory BFGS settings. The solver works on multipliers of the
/// current quotes, so all tolerances are in multiplier units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Number of (s, y) correction pairs kept.
    pub history_size: usize,
    /// Step length of the very first iteration, taken along the negative gradient.
    pub initial_step: f64,
    /// Absolute change in objective between iterations.
    pub tol_obj: f64,
    /// Relative objective change, in units of machine epsilon.
    pub tol_rel_obj: f64,
    /// Infinity norm of the gradient.
    pub tol_grad: f64,
    /// Relative gradient magnitude, in units of machine epsilon.
    pub tol_rel_grad: f64,
    /// Infinity norm of the parameter step.
    pub tol_param: f64,
    /// Hard iteration cap.
    pub max_iterations: usize,
    /// Sufficient decrease constant for the backtracking line search.
    pub armijo_c1: f64,
    /// Backtracking shrink factor.
    pub backtrack_beta: f64,
    /// Line search trials before giving up on an iteration.
    pub max_line_search_trials: usize,
    /// Lower bound on a price multiplier, keeps every price strictly positive.
    pub min_multiplier: f64,
    /// Relative step for central finite differences.
    pub fd_step: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            history_size: DEFAULT_HISTORY_SIZE,
            initial_step: DEFAULT_INITIAL_STEP,
            tol_obj: DEFAULT_TOL_OBJ,
            tol_rel_obj: DEFAULT_TOL_REL_OBJ,
            tol_grad: DEFAULT_TOL_GRAD,
            tol_rel_grad: DEFAULT_TOL_REL_GRAD,
            tol_param: DEFAULT_TOL_PARAM,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            armijo_c1: 1e-4,
            backtrack_beta: 0.5,
            max_line_search_trials: 64,
            min_multiplier: 1e-8,
            fd_step: 1e-6,
        }
    }
}

impl SolverConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.history_size == 0 {
            return Err(ConfigError::InvalidSolver {
                reason: "history size must be at least 1".to_string(),
            });
        }

        let positive = [
            ("initial step", self.initial_step),
            ("objective tolerance", self.tol_obj),
            ("gradient tolerance", self.tol_grad),
            ("parameter tolerance", self.tol_param),
            ("minimum multiplier", self.min_multiplier),
            ("finite difference step", self.fd_step),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::InvalidSolver {
                    reason: format!("{name} must be positive and finite"),
                });
            }
        }

        if self.tol_rel_obj < 0.0 || self.tol_rel_grad < 0.0 {
            return Err(ConfigError::InvalidSolver {
                reason: "relative tolerances cannot be negative".to_string(),
            });
        }

        if self.max_iterations == 0 || self.max_line_search_trials == 0 {
            return Err(ConfigError::InvalidSolver {
                reason: "iteration caps must be at least 1".to_string(),
            });
        }

        if !(self.armijo_c1 > 0.0 && self.armijo_c1 < 1.0) {
            return Err(ConfigError::InvalidSolver {
                reason: "armijo constant must be in (0, 1)".to_string(),
            });
        }

        if !(self.backtrack_beta > 0.0 && self.backtrack_beta < 1.0) {
            return Err(ConfigError::InvalidSolver {
                reason: "backtrack factor must be in (0, 1)".to_string(),
            });
        }

        Ok(())
    }
}

/// The complete auctioneer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuctioneerConfig {
    pub solver: SolverConfig,
    // excess demand at or below this magnitude is considered settled
    pub minimum_transfer: f64,
    // decimal places of a published quote (2 = cash cents)
    pub quote_decimals: u32,
    // use the best point of a solve that hit the iteration cap
    pub accept_unconverged: bool,
    // maximum number of events to retain in memory
    pub max_events: usize,
    // mirror every event to the debug log
    pub verbose: bool,
}

impl Default for AuctioneerConfig {
    fn default() -> Self {
        Self {
            solver: SolverConfig::default(),
            minimum_transfer: DEFAULT_MINIMUM_TRANSFER,
            quote_decimals: DEFAULT_QUOTE_DECIMALS,
            accept_unconverged: true,
            max_events: 100_000,
            verbose: false,
        }
    }
}

impl AuctioneerConfig {
    // tighter quotes and a non-convergent solve keeps the previous prices
    pub fn precise() -> Self {
        let mut config = Self::default();
        config.quote_decimals = 8;
        config.accept_unconverged = false;
        config
    }

    // for large agent populations where latency matters more than the last digit
    pub fn fast() -> Self {
        let mut config = Self::default();
        config.solver.max_iterations = 500;
        config.solver.tol_grad = 1e-6;
        config.solver.tol_obj = 1e-10;
        config
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.solver.validate()?;

        if !self.minimum_transfer.is_finite() || self.minimum_transfer < 0.0 {
            return Err(ConfigError::InvalidTransfer {
                reason: "minimum transfer must be finite and non-negative".to_string(),
            });
        }

        if self.quote_decimals > MAX_QUOTE_DECIMALS {
            return Err(ConfigError::InvalidQuote {
                reason: format!("at most {MAX_QUOTE_DECIMALS} quote decimals"),
            });
        }

        if self.max_events == 0 {
            return Err(ConfigError::InvalidEvents {
                reason: "event log needs room for at least one event".to_string(),
            });
        }

        Ok(())
    }
}

// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid solver config: {reason}")]
    InvalidSolver { reason: String },
    #[error("invalid transfer config: {reason}")]
    InvalidTransfer { reason: String },
    #[error("invalid quote config: {reason}")]
    InvalidQuote { reason: String },
    #[error("invalid event config: {reason}")]
    InvalidEvents { reason: String },
}
