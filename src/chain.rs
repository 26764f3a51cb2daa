//! Running a single chain: warmup followed by recorded sampling transitions.

use crate::distributions::GradientTarget;
use crate::hmc::{transition, HmcState};
use crate::key::Key;
use crate::sampler::SamplerOptions;
use crate::stepsize::DualAverageOptions;
use crate::tree::ParamTree;
use crate::warmup::run_warmup;
use indicatif::ProgressBar;

/// Mean of a stream of observations.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RunningMean {
    sum: f64,
    count: u64,
}

impl RunningMean {
    pub(crate) fn new() -> RunningMean {
        RunningMean { sum: 0.0, count: 0 }
    }

    pub(crate) fn add(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    pub(crate) fn current(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }
}

/// Everything a finished chain hands back to the coordinator.
#[derive(Debug, Clone)]
pub struct ChainResult {
    /// One recorded position per post-warmup transition, accepted or not.
    pub draws: Vec<ParamTree>,
    /// Mean acceptance probability over post-warmup transitions.
    pub accept_rate: f64,
    /// Frozen step size used for sampling.
    pub step_size: f64,
    /// Frozen diagonal inverse mass used for sampling.
    pub inv_mass: ParamTree,
}

/// Runs warmup plus `num_samples` recorded transitions on one chain.
pub fn run_chain<T: GradientTarget>(
    target: &T,
    initial: &ParamTree,
    key: Key,
    num_samples: usize,
    options: &SamplerOptions,
) -> ChainResult {
    run_chain_inner(target, initial, key, num_samples, options, None)
}

pub(crate) fn run_chain_inner<T: GradientTarget>(
    target: &T,
    initial: &ParamTree,
    key: Key,
    num_samples: usize,
    options: &SamplerOptions,
    progress: Option<&ProgressBar>,
) -> ChainResult {
    let mut state = HmcState::new(initial.clone(), options.initial_step_size);
    let dual_options = DualAverageOptions {
        target_accept: options.target_accept,
        ..DualAverageOptions::default()
    };

    let mut key = run_warmup(
        target,
        &mut state,
        key,
        options.num_warmup,
        options.num_leapfrog_steps,
        dual_options,
        options.adapt_mass_matrix,
        progress,
    );

    let mut accept = RunningMean::new();
    let mut draws = Vec::with_capacity(num_samples);
    for iter in 0..num_samples {
        let (info, next) = transition(target, &mut state, key, options.num_leapfrog_steps);
        key = next;
        accept.add(info.accept_prob);
        draws.push(state.position.clone());
        if let Some(pb) = progress {
            pb.inc(1);
            if iter % 64 == 0 {
                pb.set_message(format!("p(accept)≈{:.2}", accept.current()));
            }
        }
    }

    ChainResult {
        draws,
        accept_rate: accept.current(),
        step_size: state.step_size,
        inv_mass: state.inv_mass,
    }
}
