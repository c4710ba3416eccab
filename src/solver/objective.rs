//! Aggregate excess demand objective.
//!
//! The solver moves multipliers `x` of the initial quotes, so the price of
//! property `k` is `base_k * x_k`. The objective is the squared norm of the
//! aggregate excess demand at those prices, and its gradient follows from the
//! chain rule through each agent's Jacobian.

use crate::demand::{ExcessDemand, PriceVector};

pub(super) struct Objective<'a> {
    base: &'a PriceVector,
    demands: &'a [&'a dyn ExcessDemand],
    free: Vec<bool>,
    fd_step: f64,
    // value and gradient are divided by this
    scale: f64,
}

#[derive(Debug, Clone)]
pub(super) struct Evaluation {
    pub value: f64,
    pub gradient: Vec<f64>,
    pub excess: Vec<f64>,
}

impl<'a> Objective<'a> {
    pub fn new(base: &'a PriceVector, demands: &'a [&'a dyn ExcessDemand], fd_step: f64) -> Self {
        let free = referenced_properties(base, demands);
        Self {
            base,
            demands,
            free,
            fd_step,
            scale: 1.0,
        }
    }

    /// Measure everything relative to `eval`, the objective at the starting
    /// point, so tolerances do not depend on the units of demand. `eval` is
    /// rescaled in place. A zero start is already a root and stays unscaled.
    pub fn normalize(&mut self, eval: &mut Evaluation) {
        if !(eval.value.is_finite() && eval.value > 0.0) {
            return;
        }
        self.scale = eval.value;
        eval.value = 1.0;
        for g in &mut eval.gradient {
            *g /= self.scale;
        }
    }

    /// Unscaled objective, the squared norm of aggregate excess demand.
    pub fn residual(&self, eval: &Evaluation) -> f64 {
        eval.value * self.scale
    }

    /// Coordinates some demand function reports on. The rest never move.
    pub fn free_mask(&self) -> &[bool] {
        &self.free
    }

    pub fn prices(&self, x: &[f64]) -> PriceVector {
        let values = self
            .base
            .values()
            .iter()
            .zip(x)
            .map(|(base, multiplier)| base * multiplier)
            .collect();
        self.base.with_values(values)
    }

    pub fn evaluate(&self, x: &[f64]) -> Option<Evaluation> {
        let prices = self.prices(x);
        let excess = self.aggregate(&prices)?;
        let value: f64 = excess.iter().map(|z| z * z).sum::<f64>() / self.scale;

        // d(sum z_j^2)/dx_k = sum_j 2 z_j dz_j/dp_k * base_k
        let mut gradient = vec![0.0; x.len()];
        for demand in self.demands {
            let partials = self.partials(*demand, &prices)?;
            for (j, row) in partials.iter().enumerate() {
                for (k, d) in row.iter().enumerate() {
                    gradient[k] += 2.0 * excess[j] * d;
                }
            }
        }
        for (k, g) in gradient.iter_mut().enumerate() {
            *g = if self.free[k] {
                *g * self.base.values()[k] / self.scale
            } else {
                0.0
            };
        }

        if !value.is_finite() || gradient.iter().any(|g| !g.is_finite()) {
            return None;
        }

        Some(Evaluation {
            value,
            gradient,
            excess,
        })
    }

    /// Sum of all agents' excess demand in registration order. Entries for
    /// properties outside the price vector are dropped.
    fn aggregate(&self, prices: &PriceVector) -> Option<Vec<f64>> {
        let mut total = vec![0.0; prices.len()];
        for demand in self.demands {
            accumulate(&mut total, prices, *demand)?;
        }
        Some(total)
    }

    /// Dense `dz_j/dp_k` for one agent. Analytic when the agent provides it,
    /// central differences over the free coordinates otherwise.
    fn partials(&self, demand: &dyn ExcessDemand, prices: &PriceVector) -> Option<Vec<Vec<f64>>> {
        let n = prices.len();
        let mut dense = vec![vec![0.0; n]; n];

        if let Some(jacobian) = demand.jacobian(prices) {
            for ((output, input), d) in jacobian {
                if let (Some(j), Some(k)) = (prices.index_of(output), prices.index_of(input)) {
                    dense[j][k] += d;
                }
            }
            return Some(dense);
        }

        for k in (0..n).filter(|&k| self.free[k]) {
            let p = prices.values()[k];
            let h = self.fd_step * p.abs().max(f64::EPSILON);

            let mut up = prices.values().to_vec();
            up[k] = p + h;
            let mut down = prices.values().to_vec();
            down[k] = p - h;

            let mut plus = vec![0.0; n];
            accumulate(&mut plus, &prices.with_values(up), demand)?;
            let mut minus = vec![0.0; n];
            accumulate(&mut minus, &prices.with_values(down), demand)?;

            for j in 0..n {
                dense[j][k] = (plus[j] - minus[j]) / (2.0 * h);
            }
        }
        Some(dense)
    }
}

fn accumulate(total: &mut [f64], prices: &PriceVector, demand: &dyn ExcessDemand) -> Option<()> {
    for (property, ed) in demand.excess_demand(prices) {
        if !ed.is_finite() {
            return None;
        }
        if let Some(j) = prices.index_of(property) {
            total[j] += ed;
        }
    }
    Some(())
}

fn referenced_properties(base: &PriceVector, demands: &[&dyn ExcessDemand]) -> Vec<bool> {
    let mut free = vec![false; base.len()];
    for demand in demands {
        for property in demand.excess_demand(base).keys() {
            if let Some(k) = base.index_of(*property) {
                free[k] = true;
            }
        }
    }
    free
}
