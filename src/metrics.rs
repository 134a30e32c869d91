//! Run statistics
//!
//! Aggregation over the complete set of outcomes of one run. Failed outcomes
//! are counted like any other: their partial bytes and truncated durations
//! feed throughput, min/avg/max and percentiles.
//!
//! Percentiles use the nearest-rank style index `floor(p * n / 100)` clamped
//! to `[0, n - 1]` over outcomes sorted by duration. For runs with fewer than
//! 100 operations neighbouring percentiles can land on the same index (or
//! skip one), so ladder values are not necessarily distinct. This is an
//! accepted approximation and kept for output compatibility.

use serde::Serialize;
use std::time::Duration;

use crate::constants::{MIB, PERCENTILE_LADDER};
use crate::outcome::{millis, OperationOutcome};

/// Outcomes of one completed run, in arrival order.
#[derive(Debug, Clone)]
pub struct ResultSet {
    outcomes: Vec<OperationOutcome>,
}

impl ResultSet {
    pub fn new(outcomes: Vec<OperationOutcome>) -> Self {
        Self { outcomes }
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Arrival order.
    pub fn outcomes(&self) -> &[OperationOutcome] {
        &self.outcomes
    }

    /// Durations sorted ascending.
    pub fn sorted_durations(&self) -> Vec<Duration> {
        let mut durations: Vec<Duration> = self.outcomes.iter().map(|o| o.duration).collect();
        durations.sort_unstable();
        durations
    }
}

/// Index into a duration-sorted set of `n` outcomes for percentile `p`.
/// `n` must be at least 1.
pub fn percentile_index(p: u32, n: usize) -> usize {
    let idx = (p as usize).saturating_mul(n) / 100;
    idx.min(n.saturating_sub(1))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PercentileValue {
    pub percentile: u32,
    pub duration_ms: f64,
}

/// Summary of a completed run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryStats {
    pub files: usize,
    pub bytes: u64,
    pub succeeded: usize,
    pub failed: usize,
    pub wall_seconds: f64,
    pub bytes_per_second: f64,
    pub mib_per_second: f64,
    pub min_ms: f64,
    pub avg_ms: f64,
    pub max_ms: f64,
    pub percentiles: Vec<PercentileValue>,
}

impl SummaryStats {
    /// Aggregate a result set over the run's wall-clock duration.
    /// Returns `None` for an empty set (no average is defined).
    pub fn compute(results: &ResultSet, wall: Duration) -> Option<Self> {
        if results.is_empty() {
            return None;
        }

        let n = results.len();
        let mut bytes = 0u64;
        let mut succeeded = 0usize;
        let mut min = Duration::MAX;
        let mut max = Duration::ZERO;
        let mut sum = Duration::ZERO;

        for o in results.outcomes() {
            bytes += o.bytes;
            if o.succeeded {
                succeeded += 1;
            }
            min = min.min(o.duration);
            max = max.max(o.duration);
            sum += o.duration;
        }

        let wall_seconds = wall.as_secs_f64();
        let bytes_per_second = if wall_seconds > 0.0 {
            bytes as f64 / wall_seconds
        } else {
            0.0
        };

        let sorted = results.sorted_durations();
        let percentiles = PERCENTILE_LADDER
            .iter()
            .map(|&p| PercentileValue {
                percentile: p,
                duration_ms: millis(sorted[percentile_index(p, n)]),
            })
            .collect();

        Some(Self {
            files: n,
            bytes,
            succeeded,
            failed: n - succeeded,
            wall_seconds,
            bytes_per_second,
            mib_per_second: bytes_per_second / MIB as f64,
            min_ms: millis(min),
            avg_ms: millis(sum) / n as f64,
            max_ms: millis(max),
            percentiles,
        })
    }
}
