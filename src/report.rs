use crate::analysis::{Analysis, BaselineTest, ComparisonResult, GroupPair};
use crate::ranges::SigRange;
use anyhow::{Context, Result};
use rmp_serde::encode;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

/// Comparison result labelled with its group pair.
#[derive(Debug, Serialize, Deserialize)]
pub struct ComparisonRecord {
    pub label: String,
    pub groups: [usize; 2],
    pub ci_a: (f64, f64),
    pub ci_b: (f64, f64),
    pub observed_diff: f64,
    pub p_value: f64,
}

impl ComparisonRecord {
    fn new(pair: GroupPair, result: ComparisonResult) -> Self {
        Self {
            label: pair.to_string(),
            groups: pair.indices(),
            ci_a: result.ci_a,
            ci_b: result.ci_b,
            observed_diff: result.observed_diff,
            p_value: result.p_value,
        }
    }
}

/// Analysis results as written to disk.
#[derive(Debug, Serialize, Deserialize)]
pub struct Report {
    pub timings: Vec<f64>,
    pub comparisons: Vec<ComparisonRecord>,
    pub significance_map: Vec<u8>,
    pub group_ranges: Vec<SigRange>,
    pub baseline_ranges: Vec<Vec<SigRange>>,
    pub baseline_diff_map: Vec<Vec<u8>>,
    pub baseline_tests: Vec<Option<BaselineTest>>,
    pub skipped: Vec<String>,
}

impl Report {
    pub fn new(timings: &[f64], analysis: Analysis) -> Self {
        let comparisons = analysis
            .comparisons
            .into_iter()
            .map(|(pair, result)| ComparisonRecord::new(pair, result))
            .collect();

        Self {
            timings: timings.to_vec(),
            comparisons,
            significance_map: analysis.significance_map,
            group_ranges: analysis.group_ranges,
            baseline_ranges: analysis.baseline_ranges,
            baseline_diff_map: analysis.baseline_diff_map,
            baseline_tests: analysis.baseline_tests,
            skipped: analysis.skipped.iter().map(ToString::to_string).collect(),
        }
    }

    /// Write the report as MessagePack with named fields.
    pub fn save<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let mut writer = BufWriter::new(file);
        encode::write_named(&mut writer, self).context("failed to serialize report")?;
        writer.flush().context("failed to flush writer stream")?;
        Ok(())
    }

    /// Log a short summary of the report.
    pub fn log_summary(&self) {
        for record in &self.comparisons {
            log::info!(
                "{}: CI 1 = {:?}, CI 2 = {:?}, observed_diff = {:.6}, p_value = {:.4}",
                record.label,
                record.ci_a,
                record.ci_b,
                record.observed_diff,
                record.p_value
            );
        }
        for label in &self.skipped {
            log::info!("{label}: skipped");
        }
        log::info!("group significant ranges: {:?}", self.group_ranges);
        for (i_grp, ranges) in self.baseline_ranges.iter().enumerate() {
            log::info!("Group {} baseline significant ranges: {ranges:?}", i_grp + 1);
        }
    }
}
