// 3.2 lbfgs.rs: correction-pair history and the two-loop recursion.

use std::collections::VecDeque;

#[derive(Debug, Clone)]
struct CorrectionPair {
    s: Vec<f64>,
    y: Vec<f64>,
    rho: f64,
}

#[derive(Debug, Clone)]
pub(super) struct History {
    pairs: VecDeque<CorrectionPair>,
    capacity: usize,
    pub curvature_skips: usize,
}

pub(super) fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

pub(super) fn inf_norm(v: &[f64]) -> f64 {
    v.iter().fold(0.0, |acc, x| acc.max(x.abs()))
}

impl History {
    pub fn new(capacity: usize) -> Self {
        Self {
            pairs: VecDeque::with_capacity(capacity),
            capacity,
            curvature_skips: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn clear(&mut self) {
        self.pairs.clear();
    }

    // pairs without positive curvature would break the inverse Hessian estimate
    pub fn update(&mut self, s: Vec<f64>, y: Vec<f64>) {
        let s_dot_y = dot(&s, &y);
        if !s_dot_y.is_finite() || s_dot_y <= f64::EPSILON * dot(&y, &y).sqrt() * dot(&s, &s).sqrt() {
            self.curvature_skips += 1;
            return;
        }

        self.pairs.push_back(CorrectionPair {
            s,
            y,
            rho: 1.0 / s_dot_y,
        });
        while self.pairs.len() > self.capacity {
            self.pairs.pop_front();
        }
    }

    /// Quasi-Newton descent direction `-H g`, restricted to `free` coordinates.
    pub fn direction(&self, gradient: &[f64], free: &[bool]) -> Vec<f64> {
        let mut q: Vec<f64> = gradient
            .iter()
            .zip(free)
            .map(|(g, &is_free)| if is_free { *g } else { 0.0 })
            .collect();

        let mut alphas = Vec::with_capacity(self.pairs.len());
        for pair in self.pairs.iter().rev() {
            let alpha = pair.rho * dot(&pair.s, &q);
            for (qi, yi) in q.iter_mut().zip(&pair.y) {
                *qi -= alpha * yi;
            }
            alphas.push(alpha);
        }

        // scale by s'y / y'y of the newest pair
        let gamma = self
            .pairs
            .back()
            .map(|pair| {
                let yy = dot(&pair.y, &pair.y);
                if yy > 0.0 {
                    1.0 / (pair.rho * yy)
                } else {
                    1.0
                }
            })
            .unwrap_or(1.0);
        let mut r: Vec<f64> = q.iter().map(|qi| gamma * qi).collect();

        for (pair, alpha) in self.pairs.iter().zip(alphas.into_iter().rev()) {
            let beta = pair.rho * dot(&pair.y, &r);
            for (ri, si) in r.iter_mut().zip(&pair.s) {
                *ri += si * (alpha - beta);
            }
        }

        r.iter()
            .zip(free)
            .map(|(ri, &is_free)| if is_free { -ri } else { 0.0 })
            .collect()
    }
}
