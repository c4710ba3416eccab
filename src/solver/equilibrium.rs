// 3.1 equilibrium.rs: the solve loop. owns nothing between calls.

use super::lbfgs::{dot, inf_norm, History};
use super::objective::{Evaluation, Objective};
use super::results::{ConvergenceReason, SolverResult, SolverStatus};
use crate::config::SolverConfig;
use crate::demand::{ExcessDemand, PriceVector};
use tracing::{debug, warn};

/** 3.1: solver handle. carries its configuration, never any solve state */
#[derive(Debug, Clone, Default)]
pub struct EquilibriumSolver {
    config: SolverConfig,
}

impl EquilibriumSolver {
    pub fn new(config: SolverConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Minimize the squared aggregate excess demand starting from `initial`.
    ///
    /// Never fails: a solve that runs out of iterations or line search trials
    /// returns the best point reached, and the status says why it stopped.
    /// Properties no demand function reports on keep their initial price.
    pub fn solve(&self, initial: &PriceVector, demands: &[&dyn ExcessDemand]) -> SolverResult {
        let cfg = &self.config;
        let mut objective = Objective::new(initial, demands, cfg.fd_step);
        let free = objective.free_mask().to_vec();

        // multipliers of the initial quotes
        let mut x = vec![1.0; initial.len()];
        let mut evaluations = 1;

        let Some(mut eval) = objective.evaluate(&x) else {
            warn!(agents = demands.len(), "excess demand not finite at initial quotes");
            return SolverResult {
                prices: initial.clone(),
                residual: f64::INFINITY,
                excess_demand: Vec::new(),
                status: SolverStatus::InvalidStart,
                iterations: 0,
                evaluations,
            };
        };

        objective.normalize(&mut eval);

        let mut history = History::new(cfg.history_size);
        let mut iterations = 0;

        let status = loop {
            if inf_norm(&eval.gradient) <= cfg.tol_grad {
                break SolverStatus::Converged(ConvergenceReason::Gradient);
            }
            if iterations >= cfg.max_iterations {
                break SolverStatus::IterationLimit;
            }
            iterations += 1;

            let mut quasi_newton = !history.is_empty();
            let mut direction = if quasi_newton {
                history.direction(&eval.gradient, &free)
            } else {
                steepest_descent(&eval.gradient, &free)
            };

            let slope = dot(&eval.gradient, &direction);
            if !slope.is_finite() || slope >= 0.0 {
                history.clear();
                quasi_newton = false;
                direction = steepest_descent(&eval.gradient, &free);
            }

            // unit step along a quasi-Newton direction; a steepest descent
            // step starts small and grows while the objective keeps falling
            let alpha = if quasi_newton { 1.0 } else { cfg.initial_step };
            let Some((x_next, eval_next)) = self.line_search(
                &objective,
                &x,
                &eval,
                &direction,
                alpha,
                !quasi_newton,
                &mut evaluations,
            ) else {
                if history.is_empty() {
                    break SolverStatus::LineSearchFailed;
                }
                // stale curvature, restart from steepest descent
                history.clear();
                continue;
            };

            let step: Vec<f64> = x_next.iter().zip(&x).map(|(a, b)| a - b).collect();
            let y: Vec<f64> = eval_next
                .gradient
                .iter()
                .zip(&eval.gradient)
                .map(|(a, b)| a - b)
                .collect();
            let step_norm = inf_norm(&step);
            let delta = (eval.value - eval_next.value).abs();
            let scale = eval.value.abs().max(eval_next.value.abs()).max(1.0);

            history.update(step, y);
            x = x_next;
            eval = eval_next;

            // a steepest descent step says nothing about how close the root is
            if quasi_newton {
                if delta < cfg.tol_obj {
                    break SolverStatus::Converged(ConvergenceReason::Objective);
                }
                if delta / scale < cfg.tol_rel_obj * f64::EPSILON {
                    break SolverStatus::Converged(ConvergenceReason::RelativeObjective);
                }
                if step_norm < cfg.tol_param {
                    break SolverStatus::Converged(ConvergenceReason::Parameter);
                }
            }
            let gradient_norm = inf_norm(&eval.gradient);
            if gradient_norm <= cfg.tol_grad {
                break SolverStatus::Converged(ConvergenceReason::Gradient);
            }
            if gradient_norm / eval.value.abs().max(1.0) <= cfg.tol_rel_grad * f64::EPSILON {
                break SolverStatus::Converged(ConvergenceReason::RelativeGradient);
            }
        };

        debug!(
            iterations,
            evaluations,
            residual = objective.residual(&eval),
            ?status,
            curvature_skips = history.curvature_skips,
            "equilibrium solve finished"
        );

        SolverResult {
            prices: objective.prices(&x),
            residual: objective.residual(&eval),
            excess_demand: eval.excess,
            status,
            iterations,
            evaluations,
        }
    }

    /// Backtracking Armijo search along `direction`, projected onto
    /// multipliers of at least `min_multiplier`. With `expand`, a first trial
    /// that already satisfies the condition is doubled for as long as the
    /// objective keeps decreasing.
    #[allow(clippy::too_many_arguments)]
    fn line_search(
        &self,
        objective: &Objective<'_>,
        x: &[f64],
        eval: &Evaluation,
        direction: &[f64],
        mut alpha: f64,
        expand: bool,
        evaluations: &mut usize,
    ) -> Option<(Vec<f64>, Evaluation)> {
        let cfg = &self.config;

        for trial_index in 0..cfg.max_line_search_trials {
            let Some((trial, next)) = self.armijo_trial(objective, x, eval, direction, alpha, evaluations)
            else {
                alpha *= cfg.backtrack_beta;
                continue;
            };

            if !(expand && trial_index == 0) {
                return Some((trial, next));
            }

            let mut best = (trial, next);
            for _ in 1..cfg.max_line_search_trials {
                alpha /= cfg.backtrack_beta;
                match self.armijo_trial(objective, x, eval, direction, alpha, evaluations) {
                    Some(candidate) if candidate.1.value < best.1.value => best = candidate,
                    _ => break,
                }
            }
            return Some(best);
        }

        None
    }

    // one projected trial point, kept only if it passes the Armijo condition
    fn armijo_trial(
        &self,
        objective: &Objective<'_>,
        x: &[f64],
        eval: &Evaluation,
        direction: &[f64],
        alpha: f64,
        evaluations: &mut usize,
    ) -> Option<(Vec<f64>, Evaluation)> {
        let cfg = &self.config;
        let trial: Vec<f64> = x
            .iter()
            .zip(direction)
            .map(|(xi, di)| (xi + alpha * di).max(cfg.min_multiplier))
            .collect();
        let step: Vec<f64> = trial.iter().zip(x).map(|(a, b)| a - b).collect();
        if inf_norm(&step) == 0.0 {
            return None;
        }

        *evaluations += 1;
        let next = objective.evaluate(&trial)?;
        let bound = eval.value + cfg.armijo_c1 * dot(&eval.gradient, &step);
        (next.value <= bound && next.value <= eval.value).then_some((trial, next))
    }
}

fn steepest_descent(gradient: &[f64], free: &[bool]) -> Vec<f64> {
    gradient
        .iter()
        .zip(free)
        .map(|(g, &is_free)| if is_free { -g } else { 0.0 })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demand::{IsoelasticExcessDemand, LinearExcessDemand};
    use crate::types::PropertyId;

    fn single(price: f64) -> PriceVector {
        PriceVector::new([(PropertyId(1), price)])
    }

    #[test]
    fn linear_demand_converges_to_root() {
        let f = LinearExcessDemand {
            property: PropertyId(1),
            intercept: 10.0,
            slope: 2.0,
        };
        let demands: Vec<&dyn ExcessDemand> = vec![&f];
        let result = EquilibriumSolver::default().solve(&single(1.0), &demands);

        assert!(result.is_converged(), "status {:?}", result.status);
        let p = result.prices.get(PropertyId(1)).unwrap();
        assert!((p - 5.0).abs() < 1e-5, "p = {p}");
        assert!(result.residual < 1e-9);
    }

    #[test]
    fn starts_above_the_root() {
        let f = IsoelasticExcessDemand {
            property: PropertyId(1),
            budget: 100.0,
            endowment: 10.0,
        };
        let demands: Vec<&dyn ExcessDemand> = vec![&f];
        let result = EquilibriumSolver::default().solve(&single(40.0), &demands);

        let p = result.prices.get(PropertyId(1)).unwrap();
        assert!((p - 10.0).abs() < 1e-4, "p = {p}");
    }

    #[test]
    fn no_demand_leaves_prices_alone() {
        let initial = PriceVector::new([(PropertyId(1), 3.0), (PropertyId(2), 7.5)]);
        let result = EquilibriumSolver::default().solve(&initial, &[]);
        assert_eq!(result.prices, initial);
        assert_eq!(result.residual, 0.0);
        assert_eq!(result.iterations, 0);
        assert!(result.is_converged());
    }

    #[test]
    fn unreferenced_property_keeps_initial_price() {
        let initial = PriceVector::new([(PropertyId(1), 1.0), (PropertyId(2), 42.0)]);
        let f = LinearExcessDemand {
            property: PropertyId(1),
            intercept: 6.0,
            slope: 3.0,
        };
        let demands: Vec<&dyn ExcessDemand> = vec![&f];
        let result = EquilibriumSolver::default().solve(&initial, &demands);

        assert_eq!(result.prices.get(PropertyId(2)), Some(42.0));
        assert!((result.prices.get(PropertyId(1)).unwrap() - 2.0).abs() < 1e-5);
    }

    #[test]
    fn iteration_cap_returns_best_point() {
        let mut config = SolverConfig::default();
        config.max_iterations = 1;
        let f = LinearExcessDemand {
            property: PropertyId(1),
            intercept: 10.0,
            slope: 2.0,
        };
        let demands: Vec<&dyn ExcessDemand> = vec![&f];
        let result = EquilibriumSolver::new(config).solve(&single(1.0), &demands);

        assert_eq!(result.status, SolverStatus::IterationLimit);
        assert_eq!(result.iterations, 1);
        // one expanded steepest descent step lands near the root
        let p = result.prices.get(PropertyId(1)).unwrap();
        assert!(p > 1.0 && p < 9.0, "p = {p}");
        assert!(result.residual < 64.0);
    }

    #[test]
    fn small_demand_is_not_mistaken_for_convergence() {
        // root 10 with excess demand in the 1e-4 range
        let linear = LinearExcessDemand {
            property: PropertyId(1),
            intercept: 1e-3,
            slope: 1e-4,
        };
        let demands: Vec<&dyn ExcessDemand> = vec![&linear];
        let result = EquilibriumSolver::default().solve(&single(5.0), &demands);
        let p = result.prices.get(PropertyId(1)).unwrap();
        assert!(result.iterations > 1);
        assert!((p - 10.0).abs() < 1e-4, "p = {p}, status {:?}", result.status);

        let isoelastic = IsoelasticExcessDemand {
            property: PropertyId(1),
            budget: 0.05,
            endowment: 0.005,
        };
        let demands: Vec<&dyn ExcessDemand> = vec![&isoelastic];
        let result = EquilibriumSolver::default().solve(&single(20.0), &demands);
        let p = result.prices.get(PropertyId(1)).unwrap();
        assert!((p - 10.0).abs() < 1e-4, "p = {p}, status {:?}", result.status);
    }

    #[test]
    fn residual_is_reported_unscaled() {
        let mut config = SolverConfig::default();
        config.max_iterations = 0;
        let f = LinearExcessDemand {
            property: PropertyId(1),
            intercept: 10.0,
            slope: 2.0,
        };
        let demands: Vec<&dyn ExcessDemand> = vec![&f];
        let result = EquilibriumSolver::new(config).solve(&single(1.0), &demands);
        assert_eq!(result.residual, 64.0);
    }

    #[test]
    fn solves_are_reproducible() {
        let a = LinearExcessDemand {
            property: PropertyId(1),
            intercept: 10.0,
            slope: 1.0,
        };
        let b = IsoelasticExcessDemand {
            property: PropertyId(2),
            budget: 50.0,
            endowment: 2.0,
        };
        let demands: Vec<&dyn ExcessDemand> = vec![&a, &b];
        let initial = PriceVector::new([(PropertyId(1), 1.0), (PropertyId(2), 1.0)]);

        let solver = EquilibriumSolver::default();
        let first = solver.solve(&initial, &demands);
        let second = solver.solve(&initial, &demands);
        assert_eq!(first.prices, second.prices);
        assert_eq!(first.residual.to_bits(), second.residual.to_bits());
    }
}
