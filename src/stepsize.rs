//! Step-size adaptation: Nesterov dual averaging plus the doubling search
//! used to prime it.

use crate::distributions::GradientTarget;
use crate::hamiltonian::{energy, leapfrog};
use crate::key::Key;
use crate::tree::ParamTree;

/// Smallest step size the adapter will ever report.
pub const STEP_SIZE_MIN: f64 = 1e-4;
/// Largest step size the adapter will ever report.
pub const STEP_SIZE_MAX: f64 = 100.0;

/// Bound on doubling/halving rounds in the priming search, so targets whose
/// acceptance never crosses 0.5 (e.g. an always-NaN gradient) still
/// terminate.
const MAX_PRIME_ROUNDS: usize = 32;

/// Settings for dual averaging.
#[derive(Debug, Clone, Copy)]
pub struct DualAverageOptions {
    pub gamma: f64,
    pub t0: f64,
    pub kappa: f64,
    /// Target Metropolis acceptance probability δ.
    pub target_accept: f64,
}

impl Default for DualAverageOptions {
    fn default() -> DualAverageOptions {
        DualAverageOptions {
            gamma: 0.05,
            t0: 10.0,
            kappa: 0.75,
            target_accept: 0.8,
        }
    }
}

/// Dual-averaging state for the log step size.
///
/// `advance` is fed the acceptance probability of every warmup transition;
/// `current_step_size` drives the next transition and `adapted_step_size` is
/// the averaged value frozen at the end of warmup.
#[derive(Debug, Clone)]
pub struct DualAverage {
    log_step: f64,
    log_step_avg: f64,
    h_bar: f64,
    count: u64,
    mu: f64,
    options: DualAverageOptions,
}

impl DualAverage {
    pub fn new(options: DualAverageOptions, initial_step: f64) -> DualAverage {
        let initial = initial_step.clamp(STEP_SIZE_MIN, STEP_SIZE_MAX);
        DualAverage {
            log_step: initial.ln(),
            log_step_avg: initial.ln(),
            h_bar: 0.0,
            count: 0,
            mu: (10.0 * initial).ln(),
            options,
        }
    }

    /// Folds in one observed acceptance probability.
    ///
    /// A non-finite observation counts as zero acceptance.
    pub fn advance(&mut self, accept_prob: f64) {
        let alpha = if accept_prob.is_finite() {
            accept_prob
        } else {
            0.0
        };
        self.count += 1;
        let t = self.count as f64;
        let w = 1.0 / (t + self.options.t0);
        self.h_bar = (1.0 - w) * self.h_bar + w * (self.options.target_accept - alpha);
        self.log_step = self.mu - t.sqrt() / self.options.gamma * self.h_bar;
        let wk = t.powf(-self.options.kappa);
        self.log_step_avg = wk * self.log_step + (1.0 - wk) * self.log_step_avg;
    }

    /// Step size for the next warmup transition.
    pub fn current_step_size(&self) -> f64 {
        self.log_step.exp().clamp(STEP_SIZE_MIN, STEP_SIZE_MAX)
    }

    /// Averaged step size, frozen when warmup ends.
    pub fn adapted_step_size(&self) -> f64 {
        self.log_step_avg.exp().clamp(STEP_SIZE_MIN, STEP_SIZE_MAX)
    }
}

/// Finds a step size whose single-step acceptance is near 0.5.
///
/// Starting from `initial_step`, doubles while the acceptance exceeds one
/// half and halves while it falls below, stopping at the first sign flip of
/// `2α - 1`. The result primes dual averaging, which then recentres its
/// anchor at `log(10·ε)`.
pub fn find_reasonable_step_size<T: GradientTarget>(
    target: &T,
    position: &ParamTree,
    inv_mass: &ParamTree,
    initial_step: f64,
    key: Key,
) -> (f64, Key) {
    let (key_momentum, key_next) = key.split2();
    let z = key_momentum.standard_normal_like(position);
    let momentum = z.zip_map(inv_mass, |zi, mi| zi / mi.sqrt());

    let mut step = initial_step.clamp(STEP_SIZE_MIN, STEP_SIZE_MAX);
    let h0 = energy(target, position, &momentum, inv_mass);
    if !h0.is_finite() || !momentum.all_finite() {
        return (step, key_next);
    }

    let accept_at = |step: f64| -> f64 {
        let (q, p) = leapfrog(target, position, &momentum, step, 1, inv_mass);
        let delta = energy(target, &q, &p, inv_mass) - h0;
        if !delta.is_finite() {
            0.0
        } else {
            (-delta).exp().min(1.0)
        }
    };

    let mut alpha = accept_at(step);
    let direction: f64 = if alpha > 0.5 { 1.0 } else { -1.0 };

    for _ in 0..MAX_PRIME_ROUNDS {
        if direction * (2.0 * alpha - 1.0) <= 0.0 {
            break;
        }
        let next = (step * 2.0f64.powf(direction)).clamp(STEP_SIZE_MIN, STEP_SIZE_MAX);
        if next == step {
            break;
        }
        step = next;
        alpha = accept_at(step);
    }

    (step, key_next)
}
