//! Photometry dataset types.

use anyhow::{Context, Result, bail};
use glob::glob;
use rmp_serde::decode;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::BufReader,
    ops::Range,
    path::{Path, PathBuf},
};

/// Half-open window `[start, end)` of row indices along the time axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Period {
    pub start: usize,
    pub end: usize,
}

impl Period {
    /// Build a period from inclusive row bounds, checking them against `n_rows`.
    pub fn from_inclusive(bounds: [usize; 2], n_rows: usize) -> Result<Self> {
        let [first, last] = bounds;
        if n_rows == 0 {
            bail!("time axis is empty");
        }
        if first >= n_rows || last >= n_rows {
            bail!(
                "row indices must be in the range 0..={}, but are {first} and {last}",
                n_rows - 1
            );
        }
        if first > last {
            bail!("first row {first} is after last row {last}");
        }
        Ok(Self {
            start: first,
            end: last + 1,
        })
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }
}

/// Signal of one experimental group, with one row per time point and one column per channel.
///
/// Missing values are stored as NaN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Vec<f64>>", into = "Vec<Vec<f64>>")]
pub struct SignalMatrix {
    rows: Vec<Vec<f64>>,
    n_cols: usize,
}

impl SignalMatrix {
    /// Create a matrix from its rows, which must all have the same length.
    pub fn new(rows: Vec<Vec<f64>>) -> Result<Self> {
        let n_cols = rows.first().map_or(0, Vec::len);
        if let Some(i_row) = rows.iter().position(|row| row.len() != n_cols) {
            bail!(
                "matrix must have {n_cols} columns, but row {i_row} has {}",
                rows[i_row].len()
            );
        }
        Ok(Self { rows, n_cols })
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    /// Values of column `i_col` within `period`.
    pub fn column(&self, i_col: usize, period: &Period) -> impl Iterator<Item = f64> + '_ {
        self.rows[period.range()].iter().map(move |row| row[i_col])
    }

    /// All values within `period`, flattened row by row.
    pub fn flatten(&self, period: &Period) -> Vec<f64> {
        self.rows[period.range()].iter().flatten().copied().collect()
    }
}

impl TryFrom<Vec<Vec<f64>>> for SignalMatrix {
    type Error = anyhow::Error;

    fn try_from(rows: Vec<Vec<f64>>) -> Result<Self> {
        Self::new(rows)
    }
}

impl From<SignalMatrix> for Vec<Vec<f64>> {
    fn from(matrix: SignalMatrix) -> Self {
        matrix.rows
    }
}

/// Loaded photometry data: a shared time axis and one signal matrix per group.
///
/// Passed explicitly from the loading step to the analysis.
#[derive(Debug)]
pub struct Dataset {
    timings: Vec<f64>,
    groups: Vec<SignalMatrix>,
}

impl Dataset {
    /// Create a dataset, checking that every group matches the time axis.
    pub fn new(timings: Vec<f64>, groups: Vec<SignalMatrix>) -> Result<Self> {
        if timings.is_empty() {
            bail!("time axis must not be empty");
        }
        if groups.is_empty() {
            bail!("dataset must have at least one group");
        }
        let n_rows = timings.len();
        for (i_grp, grp) in groups.iter().enumerate() {
            if grp.n_rows() != n_rows {
                bail!(
                    "group {} must have {n_rows} rows, but has {}",
                    i_grp + 1,
                    grp.n_rows()
                );
            }
        }
        Ok(Self { timings, groups })
    }

    /// Load the time axis and all group files from `data_dir`.
    ///
    /// Groups are read from `group-*.msgpack` in file name order.
    pub fn from_dir<P: AsRef<Path>>(data_dir: P) -> Result<Self> {
        let data_dir = data_dir.as_ref();

        let timings: Vec<f64> = read_msgpack(data_dir.join("timings.msgpack"))
            .context("failed to read timings")?;

        let mut groups = Vec::new();
        for file in group_files(data_dir).context("failed to find group files")? {
            let grp: SignalMatrix =
                read_msgpack(&file).with_context(|| format!("failed to read {file:?}"))?;
            log::info!("group {file:?} shape: ({}, {})", grp.n_rows(), grp.n_cols());
            groups.push(grp);
        }

        Self::new(timings, groups)
    }

    pub fn timings(&self) -> &[f64] {
        &self.timings
    }

    pub fn groups(&self) -> &[SignalMatrix] {
        &self.groups
    }

    pub fn n_rows(&self) -> usize {
        self.timings.len()
    }
}

fn group_files(data_dir: &Path) -> Result<Vec<PathBuf>> {
    let pattern = data_dir.join("group-*.msgpack");
    let pattern = pattern.to_str().context("pattern is not valid UTF-8")?;
    let mut files: Vec<_> = glob(pattern)
        .context("failed to glob group files")?
        .filter_map(Result::ok)
        .collect();
    files.sort();
    Ok(files)
}

fn read_msgpack<T, P>(file: P) -> Result<T>
where
    T: for<'de> Deserialize<'de>,
    P: AsRef<Path>,
{
    let file = file.as_ref();
    let file = File::open(file).with_context(|| format!("failed to open {file:?}"))?;
    let reader = BufReader::new(file);
    decode::from_read(reader).context("failed to deserialize data")
}
