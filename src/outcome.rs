// src/outcome.rs
//
// Result of a single timed I/O attempt. Backends build one per task; the
// worker stamps its id and hands it to the result sink, after which it is
// never modified.

use std::fmt;
use std::time::Duration;

/// Convert a duration to fractional milliseconds.
pub fn millis(d: Duration) -> f64 {
    d.as_nanos() as f64 / 1_000_000.0
}

#[derive(Debug, Clone, PartialEq)]
pub struct OperationOutcome {
    /// Backend-qualified label, e.g. `disk-write` or `s3-read`
    pub operation: &'static str,
    pub worker_id: usize,
    pub path: String,
    pub succeeded: bool,
    /// Bytes transferred, including partial transfers of failed operations
    pub bytes: u64,
    /// Offset of dispatch from the run start
    pub start_offset: Duration,
    /// Time from dispatch until success or failure
    pub duration: Duration,
    /// Time from dispatch until the first chunk arrived (reads only)
    pub first_block: Option<Duration>,
}

impl OperationOutcome {
    pub fn new(operation: &'static str, path: impl Into<String>, start_offset: Duration) -> Self {
        Self {
            operation,
            worker_id: 0,
            path: path.into(),
            succeeded: false,
            bytes: 0,
            start_offset,
            duration: Duration::ZERO,
            first_block: None,
        }
    }

    pub fn with_worker(mut self, worker_id: usize) -> Self {
        self.worker_id = worker_id;
        self
    }

    pub fn start_time_ms(&self) -> f64 {
        millis(self.start_offset)
    }

    pub fn duration_ms(&self) -> f64 {
        millis(self.duration)
    }

    /// 0.0 when no block arrived (writes, or reads that failed before data)
    pub fn first_block_ms(&self) -> f64 {
        self.first_block.map(millis).unwrap_or(0.0)
    }
}

impl fmt::Display for OperationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} worker={} path={} ok={} bytes={} start={:.4}ms duration={:.4}ms",
            self.operation,
            self.worker_id,
            self.path,
            self.succeeded,
            self.bytes,
            self.start_time_ms(),
            self.duration_ms(),
        )?;
        if let Some(first) = self.first_block {
            write!(f, " first_block={:.4}ms", millis(first))?;
        }
        Ok(())
    }
}
