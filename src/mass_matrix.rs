//! Online diagonal mass-matrix estimation (Welford).
//!
//! During warmup the estimator accumulates the posterior positions of its own
//! chain; finalization turns the accumulated variance into the diagonal
//! inverse mass. A jitter floor keeps the kinetic metric nonsingular, and
//! degenerate accumulators fall back to the identity.

use crate::tree::ParamTree;

/// Added to every estimated variance entry before it becomes `M⁻¹`.
pub const VARIANCE_JITTER: f32 = 1e-5;

/// Numerically stable running mean/variance over parameter trees.
#[derive(Debug, Clone)]
pub struct RunningVariance {
    count: u64,
    mean: ParamTree,
    m2: ParamTree,
}

impl RunningVariance {
    /// A fresh estimator with the structure of `shape`.
    pub fn new(shape: &ParamTree) -> RunningVariance {
        RunningVariance {
            count: 0,
            mean: shape.zeros_like(),
            m2: shape.zeros_like(),
        }
    }

    /// Folds one position sample into the estimate.
    pub fn add_sample(&mut self, value: &ParamTree) {
        self.count += 1;
        let count = self.count as f32;
        let delta = value.sub(&self.mean);
        self.mean = self.mean.zip_map(&delta, |m, d| m + d / count);
        let delta2 = value.sub(&self.mean);
        self.m2 = self.m2.add(&delta.mul(&delta2));
    }

    /// Number of samples folded in so far.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Finalizes the estimate into a diagonal inverse mass.
    ///
    /// Returns `variance + jitter` elementwise. With fewer than two samples,
    /// or a variance that is not finite and positive in aggregate, falls back
    /// to the identity.
    pub fn inverse_mass(&self) -> ParamTree {
        if self.count < 2 {
            return self.mean.ones_like();
        }
        let denom = (self.count - 1) as f32;
        let variance = self.m2.scale(1.0 / denom);
        let total = variance.sum();
        if !total.is_finite() || total <= 0.0 {
            return self.mean.ones_like();
        }
        variance.map(|v| v + VARIANCE_JITTER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::Key;
    use approx::assert_abs_diff_eq;

    #[test]
    fn matches_two_pass_variance() {
        let shape = ParamTree::node([
            ("a", ParamTree::vector(&[0.0, 0.0])),
            ("b", ParamTree::scalar(0.0)),
        ]);
        let samples: Vec<ParamTree> = Key::from_seed(17)
            .split(200)
            .into_iter()
            .map(|k| k.standard_normal_like(&shape).scale(2.5))
            .collect();

        let mut running = RunningVariance::new(&shape);
        for s in &samples {
            running.add_sample(s);
        }
        let inv_mass = running.inverse_mass();

        // Two-pass reference on the first element of leaf `a`.
        let values: Vec<f64> = samples
            .iter()
            .map(|s| s.get("a").and_then(ParamTree::as_leaf).unwrap()[[0]] as f64)
            .collect();
        let mean = values.iter().sum::<f64>() / values.len() as f64;
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>()
            / (values.len() - 1) as f64;

        let estimated = inv_mass.get("a").and_then(ParamTree::as_leaf).unwrap()[[0]] as f64;
        assert_abs_diff_eq!(estimated, var + VARIANCE_JITTER as f64, epsilon = 5e-3);
    }

    #[test]
    fn too_few_samples_fall_back_to_identity() {
        let shape = ParamTree::vector(&[0.0, 0.0, 0.0]);
        let mut running = RunningVariance::new(&shape);
        assert_eq!(running.inverse_mass(), shape.ones_like());
        running.add_sample(&ParamTree::vector(&[1.0, 2.0, 3.0]));
        assert_eq!(running.inverse_mass(), shape.ones_like());
    }

    #[test]
    fn constant_samples_fall_back_to_identity() {
        let point = ParamTree::vector(&[4.0, -1.0]);
        let mut running = RunningVariance::new(&point);
        for _ in 0..10 {
            running.add_sample(&point);
        }
        assert_eq!(running.inverse_mass(), point.ones_like());
    }

    #[test]
    fn inverse_mass_entries_are_strictly_positive() {
        let shape = ParamTree::vector(&[0.0; 4]);
        let mut running = RunningVariance::new(&shape);
        for k in Key::from_seed(3).split(50) {
            running.add_sample(&k.standard_normal_like(&shape));
        }
        let inv_mass = running.inverse_mass();
        for leaf in inv_mass.leaves() {
            assert!(leaf.iter().all(|&v| v > 0.0));
        }
    }
}
