//! Posterior-moment and reproducibility checks on a one-dimensional standard
//! normal target.

use tree_hmc::distributions::StdNormal;
use tree_hmc::{sample, summarize, Key, ParamTree, SamplerOptions};

const SEED: u64 = 42;

fn run() -> tree_hmc::SampleOutput {
    let options = SamplerOptions {
        num_warmup: 500,
        num_leapfrog_steps: 25,
        num_chains: 4,
        ..SamplerOptions::default()
    };
    sample(
        &StdNormal,
        &ParamTree::scalar(0.0),
        Key::from_seed(SEED),
        1000,
        options,
    )
    .expect("valid configuration")
}

#[test]
fn recovers_standard_normal_moments() {
    let out = run();
    let leaf = out.draws.as_leaf().expect("scalar target has one leaf");
    assert_eq!(leaf.shape(), &[4, 1000]);

    let summary = summarize(&out.draws);
    let row = &summary.params[0];

    assert!(
        (-0.05..=0.05).contains(&row.mean),
        "posterior mean {} outside tolerance",
        row.mean
    );
    assert!(
        (0.95..=1.05).contains(&row.sd),
        "posterior sd {} outside tolerance",
        row.sd
    );
    assert!(row.rhat < 1.01, "rhat {} too large", row.rhat);
    assert!(row.ess > 400.0, "ess {} too small", row.ess);

    let accept = out.stats.mean_accept_rate();
    assert!(
        (0.6..=1.0).contains(&accept),
        "mean acceptance {accept} far from the 0.8 target"
    );
}

#[test]
fn identical_keys_give_bit_identical_runs() {
    let a = run();
    let b = run();
    assert_eq!(a.draws, b.draws);
    assert_eq!(a.stats.accept_rate, b.stats.accept_rate);
    assert_eq!(a.stats.step_size, b.stats.step_size);
    assert_eq!(a.stats.mass_matrix, b.stats.mass_matrix);
}

#[test]
fn different_keys_give_different_draws() {
    let a = run();
    let options = SamplerOptions {
        num_warmup: 500,
        num_leapfrog_steps: 25,
        num_chains: 4,
        ..SamplerOptions::default()
    };
    let b = sample(
        &StdNormal,
        &ParamTree::scalar(0.0),
        Key::from_seed(SEED + 1),
        1000,
        options,
    )
    .expect("valid configuration");
    assert_ne!(a.draws, b.draws);
}
