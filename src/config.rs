use crate::dataset::Period;
use crate::ranges::TIME_STEP;
use crate::stats::{BOOT_SEED, N_PERMUTATIONS, N_RESAMPLES};
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::{fmt::Debug, fs, ops::RangeBounds, path::Path};

/// Analysis configuration parameters.
///
/// Loaded from a TOML file and validated before use.
/// See [`Config::from_file`] for loading.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Baseline and comparison windows.
    pub periods: PeriodsConfig,

    /// Resampling parameters.
    #[serde(default)]
    pub resampling: ResamplingConfig,

    /// Range extraction parameters.
    #[serde(default)]
    pub ranges: RangesConfig,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PeriodsConfig {
    /// Inclusive first and last row of the baseline window.
    pub baseline: [usize; 2],
    /// Inclusive first and last row of the comparison window.
    pub comparison: [usize; 2],
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResamplingConfig {
    /// Number of bootstrap resamples.
    pub n_resamples: usize,
    /// Number of permutations per test.
    pub n_permutations: usize,
    /// Seed of the bootstrap generator.
    pub boot_seed: u64,
    /// Seed of the permutation generators (OS entropy per test if absent).
    pub perm_seed: Option<u64>,
    /// Significance level.
    pub alpha: f64,
}

impl Default for ResamplingConfig {
    fn default() -> Self {
        Self {
            n_resamples: N_RESAMPLES,
            n_permutations: N_PERMUTATIONS,
            boot_seed: BOOT_SEED,
            perm_seed: None,
            alpha: 0.05,
        }
    }
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RangesConfig {
    /// Spacing between consecutive timestamps.
    pub time_step: f64,
}

impl Default for RangesConfig {
    fn default() -> Self {
        Self {
            time_step: TIME_STEP,
        }
    }
}

impl Config {
    /// Load a [`Config`] from a file.
    ///
    /// The file must be TOML-encoded and contain a serialized [`Config`].
    /// Performs validation on all parameters before returning.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, deserialized,
    /// or if the configuration values are invalid.
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let contents =
            fs::read_to_string(file).with_context(|| format!("failed to read {file:?}"))?;

        let config: Config = toml::from_str(&contents).context("failed to deserialize config")?;

        config.validate().context("failed to validate config")?;

        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        check_bounds(self.periods.baseline).context("invalid baseline period")?;
        check_bounds(self.periods.comparison).context("invalid comparison period")?;

        let resampling = &self.resampling;
        check_num(resampling.n_resamples, 1..=1_000_000)
            .context("invalid number of resamples")?;
        check_num(resampling.n_permutations, 1..=1_000_000)
            .context("invalid number of permutations")?;
        check_num(resampling.alpha, 0.0..1.0).context("invalid significance level")?;

        if !(self.ranges.time_step > 0.0 && self.ranges.time_step.is_finite()) {
            bail!(
                "time step must be positive and finite, but is {}",
                self.ranges.time_step
            );
        }

        Ok(())
    }

    /// Resolve the configured windows against a time axis of `n_rows` points.
    pub fn periods(&self, n_rows: usize) -> Result<(Period, Period)> {
        let baseline = Period::from_inclusive(self.periods.baseline, n_rows)
            .context("invalid baseline period")?;
        let comparison = Period::from_inclusive(self.periods.comparison, n_rows)
            .context("invalid comparison period")?;
        Ok((baseline, comparison))
    }
}

fn check_num<T, R>(num: T, range: R) -> Result<()>
where
    T: PartialOrd + Debug,
    R: RangeBounds<T> + Debug,
{
    if !range.contains(&num) {
        bail!("number must be in the range {range:?}, but is {num:?}");
    }
    Ok(())
}

fn check_bounds(bounds: [usize; 2]) -> Result<()> {
    let [first, last] = bounds;
    check_num(first, ..=last).context("first row must not be after last row")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(contents: &str) -> Result<Config> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let config = parse("[periods]\nbaseline = [0, 4]\ncomparison = [5, 9]\n").unwrap();
        assert_eq!(config.periods.baseline, [0, 4]);
        assert_eq!(config.resampling, ResamplingConfig::default());
        assert_eq!(config.resampling.n_permutations, 10_000);
        assert_eq!(config.resampling.boot_seed, 42);
        assert_eq!(config.resampling.perm_seed, None);
        assert_eq!(config.ranges.time_step, 1.0);
    }

    #[test]
    fn full_config() {
        let config = parse(
            "[periods]\n\
             baseline = [0, 4]\n\
             comparison = [5, 9]\n\
             [resampling]\n\
             n_resamples = 500\n\
             n_permutations = 200\n\
             perm_seed = 7\n\
             alpha = 0.01\n\
             [ranges]\n\
             time_step = 0.25\n",
        )
        .unwrap();
        assert_eq!(config.resampling.n_resamples, 500);
        assert_eq!(config.resampling.perm_seed, Some(7));
        assert_eq!(config.resampling.boot_seed, 42);
        assert_eq!(config.ranges.time_step, 0.25);
    }

    #[test]
    fn invalid_configs() {
        assert!(parse("[periods]\nbaseline = [4, 0]\ncomparison = [5, 9]\n").is_err());
        assert!(parse("[periods]\nbaseline = [0, 4]\n").is_err());
        assert!(
            parse("[periods]\nbaseline = [0, 4]\ncomparison = [5, 9]\n[resampling]\nalpha = 1.5\n")
                .is_err()
        );
        assert!(
            parse("[periods]\nbaseline = [0, 4]\ncomparison = [5, 9]\n[ranges]\ntime_step = 0.0\n")
                .is_err()
        );
    }

    #[test]
    fn periods_are_checked_against_time_axis() {
        let config = parse("[periods]\nbaseline = [0, 4]\ncomparison = [5, 9]\n").unwrap();
        let (baseline, comparison) = config.periods(10).unwrap();
        assert_eq!(baseline, Period { start: 0, end: 5 });
        assert_eq!(comparison, Period { start: 5, end: 10 });
        assert!(config.periods(9).is_err());
    }
}
