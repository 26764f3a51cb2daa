//! Samples Neal's funnel with progress display and prints the diagnostics
//! table.

use tree_hmc::distributions::NealFunnel;
use tree_hmc::{sample_progress, summarize, Key, SamplerOptions};

fn main() {
    let target = NealFunnel { dim: 8 };
    let options = SamplerOptions {
        num_warmup: 1000,
        num_chains: 4,
        ..SamplerOptions::default()
    };

    let out = sample_progress(
        &target,
        &target.initial_position(),
        Key::from_seed(42),
        1000,
        options,
    )
    .expect("valid sampler configuration");

    let summary = summarize(&out.draws);
    println!("\n{summary}");
    println!(
        "mean accept rate {:.3} | mean step size {:.4} | max rhat {:.3} | min ess {:.0}",
        out.stats.mean_accept_rate(),
        out.stats.mean_step_size(),
        summary.max_rhat(),
        summary.min_ess(),
    );
}
