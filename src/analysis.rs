use crate::config::Config;
use crate::dataset::{Dataset, Period};
use crate::ranges::{SigRange, get_significant_ranges};
use crate::stats::{boot_ci, calculate_differences, perm_test};
use anyhow::{Context, Result};
use rand::prelude::*;
use rand_chacha::ChaCha12Rng;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt};

/// Unordered pair of group indices, stored with `i < j`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct GroupPair {
    i: usize,
    j: usize,
}

impl GroupPair {
    pub fn new(a: usize, b: usize) -> Self {
        Self {
            i: a.min(b),
            j: a.max(b),
        }
    }

    pub fn indices(&self) -> [usize; 2] {
        [self.i, self.j]
    }
}

impl fmt::Display for GroupPair {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Group {} vs Group {}", self.i + 1, self.j + 1)
    }
}

/// Outcome of comparing the difference vectors of two groups.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    /// Bootstrap confidence interval of the first group's differences.
    pub ci_a: (f64, f64),
    /// Bootstrap confidence interval of the second group's differences.
    pub ci_b: (f64, f64),
    /// Observed difference of mean differences.
    pub observed_diff: f64,
    /// Permutation p-value.
    pub p_value: f64,
}

/// Outcome of the baseline vs. comparison test within one group.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BaselineTest {
    pub observed_diff: f64,
    pub p_value: f64,
}

/// Resampling parameters of one analysis run.
#[derive(Debug, Clone)]
pub struct Params {
    pub baseline: Period,
    pub comparison: Period,
    pub n_resamples: usize,
    pub n_permutations: usize,
    pub boot_seed: u64,
    pub perm_seed: Option<u64>,
    pub alpha: f64,
    pub time_step: f64,
}

impl Params {
    /// Combine a validated configuration with the periods resolved for `dataset`.
    pub fn new(cfg: &Config, dataset: &Dataset) -> Result<Self> {
        let (baseline, comparison) = cfg
            .periods(dataset.n_rows())
            .context("failed to resolve periods")?;
        Ok(Self {
            baseline,
            comparison,
            n_resamples: cfg.resampling.n_resamples,
            n_permutations: cfg.resampling.n_permutations,
            boot_seed: cfg.resampling.boot_seed,
            perm_seed: cfg.resampling.perm_seed,
            alpha: cfg.resampling.alpha,
            time_step: cfg.ranges.time_step,
        })
    }
}

/// Results of comparing all groups of a dataset.
#[derive(Debug)]
pub struct Analysis {
    /// Between-group comparisons, keyed by group pair.
    pub comparisons: BTreeMap<GroupPair, ComparisonResult>,
    /// Group-level significance over the whole time axis.
    pub significance_map: Vec<u8>,
    /// Per-group baseline significance over the whole time axis.
    pub baseline_diff_map: Vec<Vec<u8>>,
    /// Significant ranges of `significance_map` within the comparison period.
    pub group_ranges: Vec<SigRange>,
    /// Significant ranges of each `baseline_diff_map` row within the comparison period.
    pub baseline_ranges: Vec<Vec<SigRange>>,
    /// Within-group tests; `None` where a window had no values.
    pub baseline_tests: Vec<Option<BaselineTest>>,
    /// Pairs skipped because a difference vector was empty or entirely missing.
    pub skipped: Vec<GroupPair>,
}

/// Source of generators for the permutation tests.
///
/// Each test gets its own generator. Without a seed it is drawn from OS entropy,
/// so repeated runs differ; with a seed the whole run is reproducible.
enum PermRng {
    Os,
    Seeded(ChaCha12Rng),
}

impl PermRng {
    fn new(seed: Option<u64>) -> Self {
        match seed {
            None => Self::Os,
            Some(seed) => Self::Seeded(ChaCha12Rng::seed_from_u64(seed)),
        }
    }

    fn next_rng(&mut self) -> Result<ChaCha12Rng> {
        let rng = match self {
            Self::Os => ChaCha12Rng::try_from_os_rng()?,
            Self::Seeded(master) => ChaCha12Rng::seed_from_u64(master.random()),
        };
        Ok(rng)
    }
}

/// Compare all groups of `dataset` between the baseline and comparison periods.
pub fn analyze(dataset: &Dataset, params: &Params) -> Result<Analysis> {
    let timings = dataset.timings();
    let groups = dataset.groups();
    let n_rows = dataset.n_rows();
    let comparison = params.comparison.range();
    let mut perm_rng = PermRng::new(params.perm_seed);

    // Baseline vs. comparison within each group.
    let mut baseline_diff_map = vec![vec![0; n_rows]; groups.len()];
    let mut baseline_tests = Vec::with_capacity(groups.len());
    for (i_grp, grp) in groups.iter().enumerate() {
        let baseline_vals = grp.flatten(&params.baseline);
        let comparison_vals = grp.flatten(&params.comparison);

        let has_vals = |vals: &[f64]| vals.iter().any(|val| !val.is_nan());
        if !has_vals(&baseline_vals) || !has_vals(&comparison_vals) {
            log::warn!(
                "skipping baseline test of Group {} due to empty or missing values",
                i_grp + 1
            );
            baseline_tests.push(None);
            continue;
        }

        let mut rng = perm_rng.next_rng().context("failed to seed rng")?;
        let (observed_diff, p_value) = perm_test(
            &baseline_vals,
            &comparison_vals,
            params.n_permutations,
            &mut rng,
        )
        .with_context(|| format!("failed to test baseline of Group {}", i_grp + 1))?;
        log::info!(
            "Group {} baseline: observed_diff = {observed_diff:.6}, p_value = {p_value:.4}",
            i_grp + 1
        );

        if p_value < params.alpha {
            baseline_diff_map[i_grp][comparison.clone()].fill(1);
        }
        baseline_tests.push(Some(BaselineTest {
            observed_diff,
            p_value,
        }));
    }

    // Pairwise comparisons between groups.
    let diffs: Vec<_> = groups
        .iter()
        .map(|grp| calculate_differences(grp, &params.baseline, &params.comparison))
        .collect();
    let is_invalid = |diff: &[f64]| diff.is_empty() || diff.iter().all(|val| val.is_nan());

    let mut significance_map = vec![0; n_rows];
    let mut comparisons = BTreeMap::new();
    let mut skipped = Vec::new();
    for i in 0..groups.len() {
        for j in (i + 1)..groups.len() {
            let pair = GroupPair::new(i, j);
            let (diff_a, diff_b) = (&diffs[i], &diffs[j]);

            if is_invalid(diff_a) || is_invalid(diff_b) {
                log::warn!("skipping comparison {pair} due to empty or invalid differences");
                skipped.push(pair);
                continue;
            }

            let mut rng = perm_rng.next_rng().context("failed to seed rng")?;
            let (observed_diff, p_value) =
                perm_test(diff_a, diff_b, params.n_permutations, &mut rng)
                    .with_context(|| format!("failed to test {pair}"))?;
            if p_value < params.alpha {
                significance_map[comparison.clone()].fill(1);
            }

            let ci_a = boot_ci(diff_a, params.n_resamples, params.boot_seed)
                .with_context(|| format!("failed to bootstrap {pair}"))?;
            let ci_b = boot_ci(diff_b, params.n_resamples, params.boot_seed)
                .with_context(|| format!("failed to bootstrap {pair}"))?;

            log::info!("{pair}: observed_diff = {observed_diff:.6}, p_value = {p_value:.4}");
            comparisons.insert(
                pair,
                ComparisonResult {
                    ci_a,
                    ci_b,
                    observed_diff,
                    p_value,
                },
            );
        }
    }

    // Contiguous significant ranges within the comparison period.
    let comparison_timings = &timings[comparison.clone()];
    let group_ranges = get_significant_ranges(
        comparison_timings,
        &significance_map[comparison.clone()],
        params.time_step,
    )
    .context("failed to get group significant ranges")?;
    let baseline_ranges = baseline_diff_map
        .iter()
        .map(|row| {
            get_significant_ranges(comparison_timings, &row[comparison.clone()], params.time_step)
        })
        .collect::<Result<Vec<_>>>()
        .context("failed to get baseline significant ranges")?;

    Ok(Analysis {
        comparisons,
        significance_map,
        baseline_diff_map,
        group_ranges,
        baseline_ranges,
        baseline_tests,
        skipped,
    })
}
