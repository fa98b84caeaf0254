//! Near-duplicate timestamp trimming

use chrono::{DateTime, Duration, SubsecRound, Utc};

/// Truncate to whole seconds and drop every timestamp within `min_diff` of the
/// previously kept one.
///
/// With `keep_latest` the scan runs newest-first, so of a burst of punches the
/// last one survives instead of the first. The result is always ascending.
pub fn trim_timestamps(timestamps: &[DateTime<Utc>], min_diff: Duration, keep_latest: bool) -> Vec<DateTime<Utc>> {
    let mut sorted: Vec<DateTime<Utc>> = timestamps.iter().map(|ts| ts.trunc_subsecs(0)).collect();
    sorted.sort_unstable();
    if keep_latest {
        sorted.reverse();
    }

    let mut kept: Vec<DateTime<Utc>> = Vec::with_capacity(sorted.len());
    for ts in sorted {
        match kept.last() {
            Some(last) if (ts - *last).abs() <= min_diff => {}
            _ => kept.push(ts),
        }
    }

    if keep_latest {
        kept.reverse();
    }
    kept
}
