//! Storage backends
//!
//! Both variants satisfy the same outcome contract so the worker pool and the
//! statistics never need to know which medium is under test. Per-operation
//! failures are folded into the returned [`OperationOutcome`]; only
//! initialization can fail with an error.

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::{BackendConfig, BackendKind, BenchmarkConfig, Operation};
use crate::outcome::OperationOutcome;

pub mod disk;
pub mod s3;

pub use disk::DiskBackend;
pub use s3::S3Backend;

/// Per-run state shared read-only by every worker.
#[derive(Debug)]
pub struct RunContext {
    operation: Operation,
    started: Instant,
    payload: Bytes,
    block_size: usize,
}

impl RunContext {
    /// Stamps the run start; create it immediately before spawning workers.
    pub fn new(operation: Operation, payload: Bytes, block_size: usize) -> Self {
        Self {
            operation,
            started: Instant::now(),
            payload,
            block_size: block_size.max(1),
        }
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn started(&self) -> Instant {
        self.started
    }

    /// Offset of `at` from the run start.
    pub fn since_start(&self, at: Instant) -> Duration {
        at.saturating_duration_since(self.started)
    }

    /// Shared write payload; empty for read runs.
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }
}

/// Read/write capability of a storage medium.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Backend-specific lines for the parameter block.
    fn describe(&self) -> Vec<(&'static str, String)>;

    /// One-time setup after the dry-run check and before the clock starts.
    async fn prepare(&self, _operation: Operation) -> Result<()> {
        Ok(())
    }

    /// Store the shared payload at `path`.
    async fn write(&self, ctx: &RunContext, path: &str) -> OperationOutcome;

    /// Read `path` to exhaustion.
    async fn read(&self, ctx: &RunContext, path: &str) -> OperationOutcome;

    /// Dispatch on the run's operation.
    async fn execute(&self, ctx: &RunContext, path: &str) -> OperationOutcome {
        match ctx.operation() {
            Operation::Write => self.write(ctx, path).await,
            Operation::Read => self.read(ctx, path).await,
        }
    }
}

/// Build the backend selected by the configuration. Dry runs get an S3
/// client that never resolved region or credentials.
pub async fn create_backend(cfg: &BenchmarkConfig) -> Arc<dyn StorageBackend> {
    match &cfg.backend {
        BackendConfig::Disk(opts) => Arc::new(DiskBackend::new(opts.clone())),
        BackendConfig::S3(opts) if cfg.common.dry_run => Arc::new(S3Backend::offline(opts.clone())),
        BackendConfig::S3(opts) => Arc::new(S3Backend::connect(opts.clone()).await),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_context() {
        let ctx = RunContext::new(Operation::Write, Bytes::from_static(b"abc"), 0);
        assert_eq!(ctx.operation(), Operation::Write);
        assert_eq!(ctx.payload().len(), 3);
        assert_eq!(ctx.block_size(), 1);
        assert_eq!(ctx.since_start(ctx.started()), Duration::ZERO);
        // Instants before the run start clamp to zero
        if let Some(earlier) = ctx.started().checked_sub(Duration::from_millis(1)) {
            assert_eq!(ctx.since_start(earlier), Duration::ZERO);
        }
    }
}
