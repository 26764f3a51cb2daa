//! Divergence handling: non-finite gradients must never escape as errors or
//! move the chain.

use tree_hmc::{sample, GradientTarget, Key, ParamTree, SamplerOptions};

/// A target whose gradient is NaN everywhere; every trajectory diverges.
struct NanGradient;

impl GradientTarget for NanGradient {
    fn logp(&self, position: &ParamTree) -> f64 {
        -0.5 * position.dot(position)
    }
    fn grad_logp(&self, position: &ParamTree) -> ParamTree {
        position.map(|_| f32::NAN)
    }
}

#[test]
fn nan_gradients_reject_every_proposal() {
    let initial = ParamTree::vector(&[0.5, -1.5]);
    let options = SamplerOptions {
        num_warmup: 25,
        num_leapfrog_steps: 5,
        num_chains: 2,
        ..SamplerOptions::default()
    };

    let out = sample(&NanGradient, &initial, Key::from_seed(42), 10, options)
        .expect("divergences are not fatal");

    // Every proposal was rejected, so every recorded draw is the initial
    // position.
    let leaf = out.draws.as_leaf().expect("vector target has one leaf");
    assert_eq!(leaf.shape(), &[2, 10, 2]);
    for chain in 0..2 {
        for draw in 0..10 {
            assert_eq!(leaf[[chain, draw, 0]], 0.5);
            assert_eq!(leaf[[chain, draw, 1]], -1.5);
        }
    }
    for rate in &out.stats.accept_rate {
        assert_eq!(*rate, 0.0);
    }
}

#[test]
fn sampling_without_warmup_works() {
    use tree_hmc::distributions::StdNormal;

    let options = SamplerOptions {
        num_warmup: 0,
        num_leapfrog_steps: 10,
        num_chains: 1,
        ..SamplerOptions::default()
    };
    let out = sample(
        &StdNormal,
        &ParamTree::scalar(0.0),
        Key::from_seed(1),
        100,
        options,
    )
    .expect("valid configuration");
    assert_eq!(out.draws.as_leaf().unwrap().shape(), &[1, 100]);
    // With no warmup the initial step size is used as-is.
    assert_eq!(out.stats.step_size, vec![0.1]);
}
