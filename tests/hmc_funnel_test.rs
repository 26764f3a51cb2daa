//! Neal's funnel: the adapted sampler must reach both the mouth and the neck.

use tree_hmc::distributions::NealFunnel;
use tree_hmc::{sample, Key, ParamTree, SamplerOptions};

const SEED: u64 = 42;

#[test]
fn explores_both_ends_of_the_funnel() {
    let target = NealFunnel { dim: 8 };
    let options = SamplerOptions {
        num_warmup: 1500,
        num_chains: 4,
        ..SamplerOptions::default()
    };
    let out = sample(
        &target,
        &target.initial_position(),
        Key::from_seed(SEED),
        2000,
        options,
    )
    .expect("valid configuration");

    let v = out
        .draws
        .get("v")
        .and_then(ParamTree::as_leaf)
        .expect("funnel draws carry a `v` leaf");
    assert_eq!(v.shape(), &[4, 2000]);

    let values: Vec<f64> = v.iter().map(|&x| x as f64).collect();
    let n = values.len() as f64;
    let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let mean = values.iter().sum::<f64>() / n;
    let sd = (values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0)).sqrt();

    assert!(min < -3.0, "chains never entered the neck: min v = {min}");
    assert!(max > 3.0, "chains never reached the mouth: max v = {max}");
    assert!(mean.abs() < 0.25, "E[v] = {mean} too far from 0");
    assert!(
        (sd - 3.0).abs() < 0.35,
        "sd[v] = {sd} too far from the true value 3"
    );
}
