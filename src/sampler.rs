//! The top-level sampler: option validation, multi-chain fan-out, and draw
//! stacking.
//!
//! Chains are fully independent: the root key is split into per-chain keys in
//! index order and each chain consumes only its own key, so parallel and
//! sequential execution produce bit-identical results.

use crate::chain::{run_chain, run_chain_inner, ChainResult};
use crate::distributions::GradientTarget;
use crate::key::Key;
use crate::tree::ParamTree;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::thread;
use thiserror::Error;

/// Tunable sampler options with the documented defaults.
#[derive(Debug, Clone)]
pub struct SamplerOptions {
    /// Warmup iterations per chain.
    pub num_warmup: usize,
    /// Leapfrog steps per trajectory.
    pub num_leapfrog_steps: usize,
    /// Number of independent chains.
    pub num_chains: usize,
    /// Step size ε₀ before adaptation.
    pub initial_step_size: f64,
    /// Target acceptance δ for dual averaging.
    pub target_accept: f64,
    /// Whether to estimate the diagonal mass matrix during warmup.
    pub adapt_mass_matrix: bool,
}

impl Default for SamplerOptions {
    fn default() -> SamplerOptions {
        SamplerOptions {
            num_warmup: 1000,
            num_leapfrog_steps: 25,
            num_chains: 1,
            initial_step_size: 0.1,
            target_accept: 0.8,
            adapt_mass_matrix: true,
        }
    }
}

/// Fatal configuration errors, reported before any chain starts.
#[derive(Debug, Error)]
pub enum SamplerError {
    #[error("numSamples must be positive")]
    InvalidSampleCount,
    #[error("numChains must be positive")]
    InvalidChainCount,
    #[error("numLeapfrogSteps must be at least 1")]
    InvalidLeapfrogSteps,
    #[error("initialStepSize must be positive and finite, got {0}")]
    InvalidStepSize(f64),
    #[error("targetAcceptRate must lie strictly between 0 and 1, got {0}")]
    InvalidTargetAccept(f64),
    #[error("gradLogProb output does not match the structure of initialParams")]
    StructureMismatch,
}

/// Per-chain adaptation results and acceptance statistics.
#[derive(Debug, Clone)]
pub struct SampleStats {
    /// Mean post-warmup acceptance probability, one entry per chain.
    pub accept_rate: Vec<f64>,
    /// Frozen step size, one entry per chain.
    pub step_size: Vec<f64>,
    /// Frozen diagonal inverse mass, one tree per chain.
    pub mass_matrix: Vec<ParamTree>,
}

impl SampleStats {
    /// Acceptance rate averaged over chains.
    pub fn mean_accept_rate(&self) -> f64 {
        self.accept_rate.iter().sum::<f64>() / self.accept_rate.len() as f64
    }

    /// Step size averaged over chains.
    pub fn mean_step_size(&self) -> f64 {
        self.step_size.iter().sum::<f64>() / self.step_size.len() as f64
    }

    /// Inverse mass averaged elementwise over chains.
    pub fn mean_mass_matrix(&self) -> ParamTree {
        let sum = self
            .mass_matrix
            .iter()
            .skip(1)
            .fold(self.mass_matrix[0].clone(), |acc, m| acc.add(m));
        sum.scale(1.0 / self.mass_matrix.len() as f32)
    }
}

/// Stacked draws plus per-chain statistics.
#[derive(Debug, Clone)]
pub struct SampleOutput {
    /// Parameter tree whose leaves carry a leading `[numChains, numSamples]`
    /// axis pair ahead of the original leaf shape.
    pub draws: ParamTree,
    pub stats: SampleStats,
}

fn validate<T: GradientTarget>(
    target: &T,
    initial_params: &ParamTree,
    num_samples: usize,
    options: &SamplerOptions,
) -> Result<(), SamplerError> {
    if num_samples == 0 {
        return Err(SamplerError::InvalidSampleCount);
    }
    if options.num_chains == 0 {
        return Err(SamplerError::InvalidChainCount);
    }
    if options.num_leapfrog_steps == 0 {
        return Err(SamplerError::InvalidLeapfrogSteps);
    }
    if !(options.initial_step_size.is_finite() && options.initial_step_size > 0.0) {
        return Err(SamplerError::InvalidStepSize(options.initial_step_size));
    }
    if !(options.target_accept > 0.0 && options.target_accept < 1.0) {
        return Err(SamplerError::InvalidTargetAccept(options.target_accept));
    }
    let gradient = target.grad_logp(initial_params);
    if !gradient.same_structure(initial_params) {
        return Err(SamplerError::StructureMismatch);
    }
    Ok(())
}

fn assemble(results: Vec<ChainResult>) -> SampleOutput {
    let per_chain: Vec<ParamTree> = results.iter().map(|r| ParamTree::stack(&r.draws)).collect();
    let draws = ParamTree::stack(&per_chain);
    let stats = SampleStats {
        accept_rate: results.iter().map(|r| r.accept_rate).collect(),
        step_size: results.iter().map(|r| r.step_size).collect(),
        mass_matrix: results.into_iter().map(|r| r.inv_mass).collect(),
    };
    SampleOutput { draws, stats }
}

/// Draws `num_samples` per chain from `target`, starting every chain at
/// `initial_params`.
///
/// Chains run in parallel through rayon; given the same root key the result
/// is bit-identical to sequential execution.
pub fn sample<T: GradientTarget + Sync>(
    target: &T,
    initial_params: &ParamTree,
    key: Key,
    num_samples: usize,
    options: SamplerOptions,
) -> Result<SampleOutput, SamplerError> {
    validate(target, initial_params, num_samples, &options)?;

    let chain_keys = key.split(options.num_chains);
    let results: Vec<ChainResult> = chain_keys
        .into_par_iter()
        .map(|chain_key| run_chain(target, initial_params, chain_key, num_samples, &options))
        .collect();

    Ok(assemble(results))
}

/// Like [`sample`], with per-chain progress bars and a live acceptance
/// readout. Draws and statistics are bit-identical to [`sample`] for the
/// same key.
pub fn sample_progress<T: GradientTarget + Sync>(
    target: &T,
    initial_params: &ParamTree,
    key: Key,
    num_samples: usize,
    options: SamplerOptions,
) -> Result<SampleOutput, SamplerError> {
    validate(target, initial_params, num_samples, &options)?;

    let multi = MultiProgress::new();
    let style = ProgressStyle::default_bar()
        .template("{prefix:8} {bar:40.cyan/blue} {pos}/{len} ({eta}) | {msg}")
        .expect("progress template is well-formed")
        .progress_chars("=>-");
    let total = (options.num_warmup + num_samples) as u64;

    let bars: Vec<ProgressBar> = (0..options.num_chains)
        .map(|chain_idx| {
            let pb = multi.add(ProgressBar::new(total));
            pb.set_style(style.clone());
            pb.set_prefix(format!("Chain {chain_idx}"));
            pb
        })
        .collect();

    let chain_keys = key.split(options.num_chains);
    let results: Vec<ChainResult> = thread::scope(|scope| {
        let handles: Vec<_> = chain_keys
            .into_iter()
            .zip(&bars)
            .map(|(chain_key, pb)| {
                let options = &options;
                scope.spawn(move || {
                    let result = run_chain_inner(
                        target,
                        initial_params,
                        chain_key,
                        num_samples,
                        options,
                        Some(pb),
                    );
                    pb.finish_with_message(format!("p(accept)≈{:.2}", result.accept_rate));
                    result
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("chain thread completes"))
            .collect()
    });

    Ok(assemble(results))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distributions::StdNormal;

    fn quick_options() -> SamplerOptions {
        SamplerOptions {
            num_warmup: 50,
            num_leapfrog_steps: 10,
            num_chains: 2,
            ..SamplerOptions::default()
        }
    }

    #[test]
    fn draws_carry_chain_and_sample_axes() {
        let initial = ParamTree::node([
            ("a", ParamTree::vector(&[0.0, 0.0, 0.0])),
            ("b", ParamTree::scalar(0.0)),
        ]);
        let out = sample(&StdNormal, &initial, Key::from_seed(42), 30, quick_options()).unwrap();
        let a = out.draws.get("a").and_then(ParamTree::as_leaf).unwrap();
        assert_eq!(a.shape(), &[2, 30, 3]);
        let b = out.draws.get("b").and_then(ParamTree::as_leaf).unwrap();
        assert_eq!(b.shape(), &[2, 30]);
        assert_eq!(out.stats.accept_rate.len(), 2);
        assert_eq!(out.stats.step_size.len(), 2);
        assert!(out.stats.mean_mass_matrix().same_structure(&initial));
    }

    #[test]
    fn invalid_options_are_fatal() {
        let initial = ParamTree::scalar(0.0);
        let err = sample(&StdNormal, &initial, Key::from_seed(0), 0, quick_options());
        assert!(matches!(err, Err(SamplerError::InvalidSampleCount)));

        let mut options = quick_options();
        options.initial_step_size = -1.0;
        let err = sample(&StdNormal, &initial, Key::from_seed(0), 10, options);
        assert!(matches!(err, Err(SamplerError::InvalidStepSize(_))));

        let mut options = quick_options();
        options.target_accept = 1.5;
        let err = sample(&StdNormal, &initial, Key::from_seed(0), 10, options);
        assert!(matches!(err, Err(SamplerError::InvalidTargetAccept(_))));

        let mut options = quick_options();
        options.num_chains = 0;
        let err = sample(&StdNormal, &initial, Key::from_seed(0), 10, options);
        assert!(matches!(err, Err(SamplerError::InvalidChainCount)));

        let mut options = quick_options();
        options.num_leapfrog_steps = 0;
        let err = sample(&StdNormal, &initial, Key::from_seed(0), 10, options);
        assert!(matches!(err, Err(SamplerError::InvalidLeapfrogSteps)));
    }

    #[test]
    fn mismatched_gradient_structure_is_fatal() {
        struct WrongShape;
        impl GradientTarget for WrongShape {
            fn logp(&self, _position: &ParamTree) -> f64 {
                0.0
            }
            fn grad_logp(&self, _position: &ParamTree) -> ParamTree {
                ParamTree::vector(&[0.0])
            }
        }

        let err = sample(
            &WrongShape,
            &ParamTree::vector(&[0.0, 0.0]),
            Key::from_seed(0),
            10,
            quick_options(),
        );
        assert!(matches!(err, Err(SamplerError::StructureMismatch)));
    }
}
