// src/workload.rs
//
// Benchmark execution engine: a fixed task queue drained by `threads` worker
// tasks, a fan-in result channel, and the `run` orchestrator that prints the
// report around them.

use anyhow::{anyhow, bail, Context, Result};
use bytes::Bytes;
use chrono::{DateTime, Local};
use std::io::Write;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::backend::{RunContext, StorageBackend};
use crate::config::{BenchmarkConfig, Operation};
use crate::metrics::{ResultSet, SummaryStats};
use crate::outcome::OperationOutcome;
use crate::report::{self, ProgressMode};
use crate::task::{build_write_payload, Task, TaskGenerator};

/// Everything a completed run produced.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub results: ResultSet,
    pub summary: SummaryStats,
    /// From run start to receipt of the last outcome
    pub wall: Duration,
    pub started_at: DateTime<Local>,
    pub ended_at: DateTime<Local>,
}

/// Queue every task up front and close the queue.
///
/// Capacity equals the task count, so filling never waits and workers see
/// `None` exactly when the batch is exhausted.
pub fn fill_task_queue(tasks: TaskGenerator) -> Result<mpsc::Receiver<Task>> {
    let (tx, rx) = mpsc::channel(tasks.len().max(1));
    for task in tasks {
        tx.try_send(task)
            .map_err(|e| anyhow!("Failed to queue task: {}", e))?;
    }
    Ok(rx)
}

/// Fixed set of workers sharing one task queue and one result sink.
pub struct WorkerPool {
    threads: usize,
}

impl WorkerPool {
    pub fn new(threads: usize) -> Self {
        Self { threads }
    }

    /// Spawn the workers. Each takes tasks first-ready-first-served until the
    /// queue reports exhaustion and emits one outcome per task.
    pub fn spawn(
        &self,
        backend: Arc<dyn StorageBackend>,
        ctx: Arc<RunContext>,
        tasks: mpsc::Receiver<Task>,
        results: mpsc::Sender<OperationOutcome>,
    ) -> Vec<JoinHandle<()>> {
        let tasks = Arc::new(Mutex::new(tasks));
        let mut handles = Vec::with_capacity(self.threads);

        for worker_id in 0..self.threads {
            let tasks = tasks.clone();
            let results = results.clone();
            let backend = backend.clone();
            let ctx = ctx.clone();

            handles.push(tokio::spawn(async move {
                debug!("Worker {}: started", worker_id);
                let mut processed = 0usize;
                loop {
                    let task = {
                        let mut rx = tasks.lock().await;
                        rx.recv().await
                    };

                    let Some(task) = task else {
                        debug!("Worker {}: no more tasks, stopping after {}", worker_id, processed);
                        break;
                    };

                    let outcome = backend
                        .execute(&ctx, &task.path)
                        .await
                        .with_worker(worker_id);
                    processed += 1;

                    if results.send(outcome).await.is_err() {
                        debug!("Worker {}: result sink closed, stopping", worker_id);
                        break;
                    }
                }
            }));
        }

        handles
    }
}

/// Blocks until exactly `expected` outcomes have arrived.
pub struct ResultCollector {
    expected: usize,
    rx: mpsc::Receiver<OperationOutcome>,
}

impl ResultCollector {
    pub fn new(expected: usize, rx: mpsc::Receiver<OperationOutcome>) -> Self {
        Self { expected, rx }
    }

    /// Receive outcomes in arrival order, calling `observe` on each.
    ///
    /// Returns the outcomes and the instant the last one was received. The
    /// channel closing early means workers died: that is an error.
    pub async fn collect<F>(mut self, mut observe: F) -> Result<(Vec<OperationOutcome>, Instant)>
    where
        F: FnMut(&OperationOutcome) -> Result<()>,
    {
        let mut outcomes = Vec::with_capacity(self.expected);
        let mut last = Instant::now();

        while outcomes.len() < self.expected {
            match self.rx.recv().await {
                Some(outcome) => {
                    last = Instant::now();
                    observe(&outcome)?;
                    outcomes.push(outcome);
                }
                None => bail!(
                    "Result channel closed after {} of {} outcomes",
                    outcomes.len(),
                    self.expected
                ),
            }
        }

        Ok((outcomes, last))
    }
}

/// Execute one benchmark run and write its report to `out`.
///
/// Returns `None` for dry runs, which stop after the parameter block.
pub async fn run<W: Write>(
    cfg: &BenchmarkConfig,
    backend: Arc<dyn StorageBackend>,
    out: &mut W,
) -> Result<Option<RunReport>> {
    cfg.validate()?;
    let common = &cfg.common;

    report::write_parameters(out, cfg, &backend.describe())?;
    if common.dry_run {
        info!("Dry run: skipping execution");
        return Ok(None);
    }

    backend
        .prepare(common.operation)
        .await
        .context("Backend preparation failed")?;

    let tasks = TaskGenerator::new(cfg.target_prefix(), common.iterations, common.files);
    let task_rx = fill_task_queue(tasks)?;

    let payload = match common.operation {
        Operation::Write => build_write_payload(cfg.payload_bytes()?),
        Operation::Read => Bytes::new(),
    };
    let block_size = cfg.block_size_bytes()?;

    info!(
        "Starting {}:{} with {} iterations on {} workers",
        cfg.kind(),
        common.operation,
        common.iterations,
        common.threads
    );

    let ctx = Arc::new(RunContext::new(common.operation, payload, block_size));
    let started_at = Local::now();
    writeln!(out, "Starting... {}", started_at)?;

    let (result_tx, result_rx) = mpsc::channel(common.iterations);
    let handles = WorkerPool::new(common.threads).spawn(backend, ctx.clone(), task_rx, result_tx);

    let progress = ProgressMode::from_debug(common.debug);
    let (outcomes, last) = ResultCollector::new(common.iterations, result_rx)
        .collect(|o| progress.record(&mut *out, o).map_err(Into::into))
        .await?;
    progress.finish(out)?;

    let wall = ctx.since_start(last);
    let ended_at = Local::now();
    writeln!(out, "Ending... {}", ended_at)?;
    writeln!(out, "Duration: {:?}", wall)?;

    for handle in handles {
        handle.await.context("Worker task failed")?;
    }

    let results = ResultSet::new(outcomes);
    if common.csv {
        report::write_csv(out, results.outcomes())?;
    }

    let summary = SummaryStats::compute(&results, wall)
        .ok_or_else(|| anyhow!("No outcomes collected"))?;
    report::write_statistics(out, cfg, &summary)?;
    out.flush()?;

    info!(
        "Run complete: {} succeeded, {} failed, {:.4} MiB/sec",
        summary.succeeded, summary.failed, summary.mib_per_second
    );

    Ok(Some(RunReport {
        results,
        summary,
        wall,
        started_at,
        ended_at,
    }))
}
