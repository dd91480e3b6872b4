use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

/// Default spacing between consecutive timestamps.
pub const TIME_STEP: f64 = 1.0;

/// Maximal run of consecutive significant time points, as literal timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SigRange {
    pub start: f64,
    pub end: f64,
}

/// Group the significant timestamps of `sig_map` into contiguous ranges.
///
/// Timestamps are assumed to be evenly spaced by `time_step`: a new range starts
/// whenever the next significant timestamp is more than `time_step` past the previous one.
/// The spacing is not inferred from `timings`.
pub fn get_significant_ranges(
    timings: &[f64],
    sig_map: &[u8],
    time_step: f64,
) -> Result<Vec<SigRange>> {
    if timings.len() != sig_map.len() {
        bail!(
            "significance map length must be {}, but is {}",
            timings.len(),
            sig_map.len()
        );
    }

    let mut sig_times = timings
        .iter()
        .zip(sig_map)
        .filter(|&(_, &sig)| sig == 1)
        .map(|(&time, _)| time);

    let Some(first) = sig_times.next() else {
        return Ok(Vec::new());
    };

    let mut ranges = Vec::new();
    let mut start = first;
    let mut prev = first;
    for time in sig_times {
        if time > prev + time_step {
            ranges.push(SigRange { start, end: prev });
            start = time;
        }
        prev = time;
    }
    ranges.push(SigRange { start, end: prev });

    log::debug!("found {} significant ranges", ranges.len());

    Ok(ranges)
}
