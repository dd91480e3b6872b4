use crate::dataset::{Period, SignalMatrix};
use anyhow::{Result, bail};
use rand::prelude::*;
use rand_chacha::ChaCha12Rng;
use rand_distr::Uniform;

/// Default number of bootstrap resamples.
pub const N_RESAMPLES: usize = 10_000;

/// Default number of permutations.
pub const N_PERMUTATIONS: usize = 10_000;

/// Default bootstrap seed.
pub const BOOT_SEED: u64 = 42;

/// Compute a 95% bootstrap confidence interval of the mean.
///
/// Draws `n_resamples` resamples with replacement of the same size as `data`
/// and returns the 2.5th and 97.5th percentiles of the resample means.
/// The generator is seeded with `seed`, so identical inputs give identical intervals.
///
/// Empty or entirely missing input returns `(NaN, NaN)` without resampling.
/// Missing values are kept: a resample containing one has a NaN mean,
/// which makes the percentiles NaN as well.
pub fn boot_ci(data: &[f64], n_resamples: usize, seed: u64) -> Result<(f64, f64)> {
    if data.is_empty() || data.iter().all(|val| val.is_nan()) {
        return Ok((f64::NAN, f64::NAN));
    }
    if n_resamples == 0 {
        bail!("number of resamples must be positive");
    }

    let mut rng = ChaCha12Rng::seed_from_u64(seed);
    let n_vals = data.len();
    let idx_dist = Uniform::new(0, n_vals)?;

    let mut resample = vec![0.0; n_vals];
    let mut means = Vec::with_capacity(n_resamples);
    for _ in 0..n_resamples {
        for slot in resample.iter_mut() {
            *slot = data[idx_dist.sample(&mut rng)];
        }
        means.push(compute_mean(&resample));
    }

    if means.iter().any(|mean| mean.is_nan()) {
        return Ok((f64::NAN, f64::NAN));
    }
    means.sort_by(f64::total_cmp);

    Ok((
        compute_percentile(&means, 2.5),
        compute_percentile(&means, 97.5),
    ))
}

/// Two-sided permutation test on the difference of means.
///
/// Returns `(observed_diff, p_value)` where `observed_diff = mean(data_a) - mean(data_b)`
/// and `p_value` is the fraction of shuffles whose absolute difference
/// is at least the observed one. Missing values are dropped before testing.
///
/// # Errors
/// Returns an error if either input has no values left or `n_permutations` is zero.
pub fn perm_test<R: Rng + ?Sized>(
    data_a: &[f64],
    data_b: &[f64],
    n_permutations: usize,
    rng: &mut R,
) -> Result<(f64, f64)> {
    let mut pool: Vec<_> = data_a.iter().copied().filter(|val| !val.is_nan()).collect();
    let n_a = pool.len();
    pool.extend(data_b.iter().copied().filter(|val| !val.is_nan()));
    let n_b = pool.len() - n_a;

    if n_a == 0 || n_b == 0 {
        bail!("both samples must be non-empty, but have sizes {n_a} and {n_b}");
    }
    if n_permutations == 0 {
        bail!("number of permutations must be positive");
    }

    let observed_diff = compute_mean(&pool[..n_a]) - compute_mean(&pool[n_a..]);

    let mut count = 0;
    for _ in 0..n_permutations {
        pool.shuffle(rng);
        let (new_a, new_b) = pool.split_at(n_a);
        let new_diff = compute_mean(new_a) - compute_mean(new_b);
        if new_diff.abs() >= observed_diff.abs() {
            count += 1;
        }
    }

    Ok((observed_diff, count as f64 / n_permutations as f64))
}

/// Compute the per-channel difference `comparison mean - baseline mean`.
///
/// Means ignore missing values; a channel with no values in either window gets NaN.
pub fn calculate_differences(
    matrix: &SignalMatrix,
    baseline: &Period,
    comparison: &Period,
) -> Vec<f64> {
    (0..matrix.n_cols())
        .map(|i_col| {
            let baseline_mean = compute_nan_mean(matrix.column(i_col, baseline));
            let comparison_mean = compute_nan_mean(matrix.column(i_col, comparison));
            comparison_mean - baseline_mean
        })
        .collect()
}

pub fn compute_mean(vals: &[f64]) -> f64 {
    if vals.is_empty() {
        return f64::NAN;
    }
    vals.iter().sum::<f64>() / vals.len() as f64
}

/// Mean over the non-missing values; NaN if there are none.
pub fn compute_nan_mean<I: IntoIterator<Item = f64>>(vals: I) -> f64 {
    let (sum, n_vals) = vals
        .into_iter()
        .filter(|val| !val.is_nan())
        .fold((0.0, 0usize), |(sum, n_vals), val| (sum + val, n_vals + 1));
    if n_vals == 0 {
        return f64::NAN;
    }
    sum / n_vals as f64
}

/// Percentile of sorted values, linearly interpolated between order statistics.
fn compute_percentile(sorted_vals: &[f64], pct: f64) -> f64 {
    if sorted_vals.is_empty() {
        return f64::NAN;
    }
    let pos = pct / 100.0 * (sorted_vals.len() - 1) as f64;
    let i_low = pos.floor() as usize;
    let i_high = pos.ceil() as usize;
    let frac = pos - i_low as f64;
    sorted_vals[i_low] + (sorted_vals[i_high] - sorted_vals[i_low]) * frac
}
