//! Multi-chain convergence diagnostics: split-Rhat, effective sample size,
//! and per-parameter summaries.
//!
//! All diagnostics operate on a `[chains, draws]` series per scalar
//! parameter. [`summarize`] walks a stacked draws tree and produces one row
//! per leaf element. ESS follows Geyer's initial monotone sequence with
//! autocovariances computed by FFT for long chains and directly for short
//! ones.

use crate::tree::ParamTree;
use ndarray::{s, Array2, ArrayView2};
use rayon::prelude::*;
use rustfft::{num_complex::Complex, FftPlanner};
use std::fmt;

/// Quantiles reported per parameter.
pub const SUMMARY_QUANTILES: [f64; 5] = [0.05, 0.25, 0.5, 0.75, 0.95];

/// Chains shorter than this use the direct autocovariance; longer chains go
/// through the FFT.
const AUTOCOV_FFT_THRESHOLD: usize = 100;

/// Split-Rhat for one scalar parameter over a `[chains, draws]` series.
///
/// Each chain is halved, giving `2C` chains of length `⌊N/2⌋`; the statistic
/// is `√(Var⁺ / W)` with `Var⁺ = ((N'-1)/N')·W + B/N'`. Values near 1
/// indicate the chains agree; returns NaN when the series is too short to
/// split.
pub fn split_rhat(series: ArrayView2<f32>) -> f64 {
    let n = series.ncols();
    let half = n / 2;
    if series.nrows() == 0 || half < 2 {
        return f64::NAN;
    }

    let mut means = Vec::with_capacity(2 * series.nrows());
    let mut vars = Vec::with_capacity(2 * series.nrows());
    for row in series.rows() {
        for segment in [row.slice(s![..half]), row.slice(s![(n - half)..])] {
            let mean = segment.iter().map(|&v| v as f64).sum::<f64>() / half as f64;
            let var = segment
                .iter()
                .map(|&v| (v as f64 - mean).powi(2))
                .sum::<f64>()
                / (half - 1) as f64;
            means.push(mean);
            vars.push(var);
        }
    }

    let m = means.len() as f64;
    let w = vars.iter().sum::<f64>() / m;
    let grand_mean = means.iter().sum::<f64>() / m;
    let between = half as f64
        * means
            .iter()
            .map(|mean| (mean - grand_mean).powi(2))
            .sum::<f64>()
        / (m - 1.0);

    if w <= 0.0 {
        // Constant chains: identical constants agree perfectly, distinct
        // constants disagree maximally.
        return if between <= f64::EPSILON {
            1.0
        } else {
            f64::INFINITY
        };
    }

    let half = half as f64;
    let var_plus = (half - 1.0) / half * w + between / half;
    (var_plus / w).sqrt()
}

/// Effective sample size for one scalar parameter over a `[chains, draws]`
/// series, clamped to `[1, chains·draws]`.
pub fn ess(series: ArrayView2<f32>) -> f64 {
    let c = series.nrows();
    let n = series.ncols();
    let total = (c * n) as f64;
    if c == 0 || n < 4 {
        return total.max(1.0);
    }

    // Lags 0..=⌊N/2⌋ inclusive, so ⌊N/2⌋ + 1 autocovariance values.
    let max_lag = n / 2 + 1;
    let mut mean_autocov = vec![0.0f64; max_lag];
    let mut within = 0.0f64;
    for row in series.rows() {
        let x: Vec<f64> = row.iter().map(|&v| v as f64).collect();
        for (acc, value) in mean_autocov.iter_mut().zip(autocov(&x, max_lag)) {
            *acc += value;
        }
        let mean = x.iter().sum::<f64>() / n as f64;
        within += x.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
    }
    let chains = c as f64;
    for acc in mean_autocov.iter_mut() {
        *acc /= chains;
    }
    within /= chains;
    if !(within.is_finite() && within > 0.0) {
        return total;
    }

    let rho: Vec<f64> = mean_autocov.iter().map(|g| g / within).collect();

    // Geyer's initial monotone sequence: add lag pairs while their sum stays
    // positive.
    let mut pair_sum = 0.0;
    let mut lag = 1;
    while lag + 1 < rho.len() {
        let pair = rho[lag] + rho[lag + 1];
        if pair <= 0.0 {
            break;
        }
        pair_sum += pair;
        lag += 2;
    }
    let tau = 1.0 + 2.0 * pair_sum;

    (total / tau).clamp(1.0, total)
}

fn autocov(x: &[f64], max_lag: usize) -> Vec<f64> {
    if x.len() <= AUTOCOV_FFT_THRESHOLD {
        autocov_direct(x, max_lag)
    } else {
        autocov_fft(x, max_lag)
    }
}

fn autocov_direct(x: &[f64], max_lag: usize) -> Vec<f64> {
    let n = x.len();
    let mean = x.iter().sum::<f64>() / n as f64;
    (0..max_lag)
        .map(|lag| {
            let mut acc = 0.0;
            for t in 0..(n - lag) {
                acc += (x[t] - mean) * (x[t + lag] - mean);
            }
            acc / n as f64
        })
        .collect()
}

/// FFT autocovariance with zero-padding to the next power of two past
/// `2n - 1`, avoiding circular wrap-around.
fn autocov_fft(x: &[f64], max_lag: usize) -> Vec<f64> {
    let n = x.len();
    let mean = x.iter().sum::<f64>() / n as f64;

    let mut n_padded = 1usize;
    while n_padded < 2 * n - 1 {
        n_padded <<= 1;
    }

    let mut planner = FftPlanner::<f64>::new();
    let forward = planner.plan_fft_forward(n_padded);
    let inverse = planner.plan_fft_inverse(n_padded);

    let mut buf: Vec<Complex<f64>> = x
        .iter()
        .map(|&v| Complex::new(v - mean, 0.0))
        .chain(std::iter::repeat(Complex::new(0.0, 0.0)).take(n_padded - n))
        .collect();
    forward.process(&mut buf);
    for value in buf.iter_mut() {
        *value *= value.conj();
    }
    inverse.process(&mut buf);

    // rustfft does not normalize; the round trip scales by n_padded.
    buf.iter()
        .take(max_lag)
        .map(|v| v.re / n_padded as f64 / n as f64)
        .collect()
}

/// One summary row per scalar parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSummary {
    pub name: String,
    pub mean: f64,
    pub sd: f64,
    /// Values at [`SUMMARY_QUANTILES`].
    pub quantiles: [f64; 5],
    pub rhat: f64,
    pub ess: f64,
}

/// Per-parameter diagnostics over a full sampling run.
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub params: Vec<ParamSummary>,
}

impl Summary {
    /// Largest finite Rhat over all parameters.
    pub fn max_rhat(&self) -> f64 {
        self.params
            .iter()
            .map(|p| p.rhat)
            .fold(f64::NAN, f64::max)
    }

    /// Smallest finite ESS over all parameters.
    pub fn min_ess(&self) -> f64 {
        self.params.iter().map(|p| p.ess).fold(f64::NAN, f64::min)
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:<16} {:>9} {:>9} {:>9} {:>9} {:>9} {:>9} {:>9} {:>7} {:>9}",
            "parameter", "mean", "sd", "5%", "25%", "50%", "75%", "95%", "rhat", "ess"
        )?;
        writeln!(f, "{}", "-".repeat(104))?;
        for p in &self.params {
            writeln!(
                f,
                "{:<16} {:>9.4} {:>9.4} {:>9.4} {:>9.4} {:>9.4} {:>9.4} {:>9.4} {:>7.3} {:>9.1}",
                p.name,
                p.mean,
                p.sd,
                p.quantiles[0],
                p.quantiles[1],
                p.quantiles[2],
                p.quantiles[3],
                p.quantiles[4],
                p.rhat,
                p.ess
            )?;
        }
        Ok(())
    }
}

/// Summarizes a stacked draws tree whose leaves carry leading
/// `[chains, draws]` axes, producing one row per scalar parameter.
///
/// Deterministic: identical draws yield identical summaries.
pub fn summarize(draws: &ParamTree) -> Summary {
    let mut series: Vec<(String, Array2<f32>)> = Vec::new();
    for (name, leaf) in draws.named_leaves() {
        let shape = leaf.shape().to_vec();
        assert!(
            shape.len() >= 2,
            "draw leaves must carry [chains, draws, ...] axes"
        );
        let (chains, draws_len) = (shape[0], shape[1]);
        let elems: usize = shape[2..].iter().product();
        let flat = leaf
            .to_shape((chains, draws_len, elems))
            .expect("stacked draws reshape to [chains, draws, elems]");
        let base = if name.is_empty() {
            "param".to_string()
        } else {
            name
        };
        for j in 0..elems {
            let label = if elems == 1 {
                base.clone()
            } else {
                format!("{base}[{j}]")
            };
            series.push((label, flat.slice(s![.., .., j]).to_owned()));
        }
    }

    let params: Vec<ParamSummary> = series
        .into_par_iter()
        .map(|(name, data)| summarize_series(name, data.view()))
        .collect();
    Summary { params }
}

fn summarize_series(name: String, series: ArrayView2<f32>) -> ParamSummary {
    let total = series.len();
    let mut sorted: Vec<f64> = series.iter().map(|&v| v as f64).collect();
    let mean = sorted.iter().sum::<f64>() / total as f64;
    let sd = (sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (total - 1) as f64).sqrt();
    sorted.sort_by(f64::total_cmp);

    let pick = |q: f64| -> f64 {
        let idx = ((total - 1) as f64 * q).round() as usize;
        sorted[idx]
    };
    let quantiles = SUMMARY_QUANTILES.map(pick);

    ParamSummary {
        name,
        mean,
        sd,
        quantiles,
        rhat: split_rhat(series),
        ess: ess(series),
    }
}
