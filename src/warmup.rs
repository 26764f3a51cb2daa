//! The windowed warmup driver.
//!
//! Warmup is split into an initial buffer that adapts only the step size, a
//! middle region that additionally estimates the diagonal mass matrix over
//! doubling windows, and a terminal buffer that re-tunes the step size
//! against the final metric. The mass matrix is frozen (and the Welford
//! accumulator restarted) at the end of every window, after which the step
//! size is re-primed and dual averaging recentres its anchor.

use crate::distributions::GradientTarget;
use crate::hmc::{transition, HmcState};
use crate::key::Key;
use crate::mass_matrix::RunningVariance;
use crate::stepsize::{
    find_reasonable_step_size, DualAverage, DualAverageOptions, STEP_SIZE_MAX, STEP_SIZE_MIN,
};
use indicatif::ProgressBar;

/// Fraction of warmup spent on step size alone before mass estimation.
const INIT_BUFFER_FRACTION: f64 = 0.15;
/// Fraction of warmup reserved for step-size-only tuning at the end.
const TERM_BUFFER_FRACTION: f64 = 0.10;
/// Length of the first mass-matrix window; later windows double.
const FIRST_WINDOW: usize = 25;

/// Tracks which warmup iterations feed the mass estimator and where the
/// doubling windows close.
#[derive(Debug)]
pub(crate) struct WarmupSchedule {
    num_warmup: usize,
    init_buffer: usize,
    term_buffer: usize,
    window_end: usize,
    window_len: usize,
}

impl WarmupSchedule {
    pub(crate) fn new(num_warmup: usize) -> WarmupSchedule {
        let init_buffer = (num_warmup as f64 * INIT_BUFFER_FRACTION).ceil() as usize;
        let term_buffer = (num_warmup as f64 * TERM_BUFFER_FRACTION).ceil() as usize;
        WarmupSchedule {
            num_warmup,
            init_buffer,
            term_buffer,
            window_end: init_buffer + FIRST_WINDOW,
            window_len: FIRST_WINDOW,
        }
    }

    fn mass_region_end(&self) -> usize {
        self.num_warmup.saturating_sub(self.term_buffer)
    }

    /// Whether iteration `iter` (0-based) contributes to the mass estimate.
    pub(crate) fn collects_mass(&self, iter: usize) -> bool {
        iter >= self.init_buffer && iter < self.mass_region_end()
    }

    /// Whether iteration `iter` closes a window. The window length doubles
    /// after each close; the region end forces a final close.
    pub(crate) fn closes_window(&mut self, iter: usize) -> bool {
        if !self.collects_mass(iter) {
            return false;
        }
        if iter + 1 == self.window_end || iter + 1 == self.mass_region_end() {
            self.window_len *= 2;
            self.window_end = (iter + 1) + self.window_len;
            true
        } else {
            false
        }
    }
}

/// Runs `num_warmup` adaptive transitions, freezing `(ε, M⁻¹)` into `state`.
///
/// Returns the chain key advanced past all warmup randomness. The frozen
/// step size is the dual-averaged value from the last adaptation stretch;
/// the frozen inverse mass is the last closed window's estimate (identity
/// when mass adaptation is disabled or warmup is too short to fit a window).
pub fn run_warmup<T: GradientTarget>(
    target: &T,
    state: &mut HmcState,
    key: Key,
    num_warmup: usize,
    n_leapfrog: usize,
    options: DualAverageOptions,
    adapt_mass_matrix: bool,
    progress: Option<&ProgressBar>,
) -> Key {
    if num_warmup == 0 {
        state.step_size = state.step_size.clamp(STEP_SIZE_MIN, STEP_SIZE_MAX);
        return key;
    }

    let (step, mut key) = find_reasonable_step_size(
        target,
        &state.position,
        &state.inv_mass,
        state.step_size,
        key,
    );
    let mut dual = DualAverage::new(options, step);
    let mut schedule = WarmupSchedule::new(num_warmup);
    let mut welford = RunningVariance::new(&state.position);

    for iter in 0..num_warmup {
        state.step_size = dual.current_step_size();
        let (info, next) = transition(target, state, key, n_leapfrog);
        key = next;
        dual.advance(info.accept_prob);

        if adapt_mass_matrix && schedule.collects_mass(iter) {
            welford.add_sample(&state.position);
            if schedule.closes_window(iter) {
                state.inv_mass = welford.inverse_mass();
                welford = RunningVariance::new(&state.position);
                let (step, next) = find_reasonable_step_size(
                    target,
                    &state.position,
                    &state.inv_mass,
                    dual.current_step_size(),
                    key,
                );
                key = next;
                dual = DualAverage::new(options, step);
            }
        }

        if let Some(pb) = progress {
            pb.inc(1);
        }
    }

    state.step_size = dual.adapted_step_size();
    key
}
