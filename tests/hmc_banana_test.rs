//! The banana density: the sampler must trace the curved ridge, which shows
//! up as strong correlation between x₁² and x₂.

use tree_hmc::distributions::Banana;
use tree_hmc::{sample, Key, ParamTree, SamplerOptions};

const SEED: u64 = 42;

#[test]
fn follows_the_curved_ridge() {
    let options = SamplerOptions {
        num_warmup: 1000,
        num_chains: 4,
        ..SamplerOptions::default()
    };
    let out = sample(
        &Banana,
        &ParamTree::vector(&[0.0, 0.0]),
        Key::from_seed(SEED),
        2000,
        options,
    )
    .expect("valid configuration");

    let leaf = out.draws.as_leaf().expect("vector target has one leaf");
    assert_eq!(leaf.shape(), &[4, 2000, 2]);
    let flat = leaf
        .to_shape((8000, 2))
        .expect("draws reshape to [total, 2]");

    let x1_sq: Vec<f64> = flat.column(0).iter().map(|&v| (v as f64).powi(2)).collect();
    let x2: Vec<f64> = flat.column(1).iter().map(|&v| v as f64).collect();

    let corr = pearson(&x1_sq, &x2);
    assert!(
        corr > 0.5,
        "correlation of x1² and x2 is {corr}; the ridge was not traced"
    );
}

fn pearson(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len() as f64;
    let mean_a = a.iter().sum::<f64>() / n;
    let mean_b = b.iter().sum::<f64>() / n;
    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (&x, &y) in a.iter().zip(b) {
        cov += (x - mean_a) * (y - mean_b);
        var_a += (x - mean_a).powi(2);
        var_b += (y - mean_b).powi(2);
    }
    cov / (var_a.sqrt() * var_b.sqrt())
}
