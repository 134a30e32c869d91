//! Results directory management for kioperf
//!
//! Optionally persists a completed run next to the console report:
//! - `config.yaml`: the effective configuration
//! - `results.csv`: one row per outcome, arrival order
//! - `summary.json`: aggregate statistics
//! - `metadata.json`: version, host, command line and timing
//!
//! Directory format: kioperf-{YYYYMMDD-HHMMSS}-{backend}-{op}/

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::BenchmarkConfig;
use crate::constants::RESULTS_DIR_PREFIX;
use crate::workload::RunReport;

/// Metadata about a benchmark run
#[derive(Debug, Serialize, Deserialize)]
pub struct RunMetadata {
    pub version: String,
    pub backend: String,
    pub operation: String,
    pub start_time: String,
    pub end_time: String,
    pub wall_seconds: f64,
    pub command_line: Vec<String>,
    pub hostname: String,
}

impl RunMetadata {
    pub fn new(cfg: &BenchmarkConfig, report: &RunReport) -> Self {
        let hostname = hostname::get()
            .unwrap_or_else(|_| "unknown".into())
            .to_string_lossy()
            .to_string();

        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            backend: cfg.kind().to_string(),
            operation: cfg.common.operation.to_string(),
            start_time: report.started_at.to_rfc3339(),
            end_time: report.ended_at.to_rfc3339(),
            wall_seconds: report.wall.as_secs_f64(),
            command_line: std::env::args().collect(),
            hostname,
        }
    }
}

/// One `results.csv` row. Same columns as the console CSV block, minus the tag.
#[derive(Debug, Serialize)]
struct ResultRow<'a> {
    #[serde(rename = "Operation")]
    operation: &'a str,
    #[serde(rename = "WorkerId")]
    worker_id: usize,
    #[serde(rename = "Path")]
    path: &'a str,
    #[serde(rename = "Succeeded")]
    succeeded: bool,
    #[serde(rename = "Bytes")]
    bytes: u64,
    #[serde(rename = "StartTimeMs")]
    start_time_ms: String,
    #[serde(rename = "Duration")]
    duration_ms: String,
    #[serde(rename = "FirstBlockArrivalMs")]
    first_block_ms: String,
}

/// Results directory manager
pub struct ResultsDir {
    path: PathBuf,
}

impl ResultsDir {
    /// Directory name for a run started at `started_at`.
    pub fn dir_name(cfg: &BenchmarkConfig, started_at: &DateTime<Local>) -> String {
        format!(
            "{}-{}-{}-{}",
            RESULTS_DIR_PREFIX,
            started_at.format("%Y%m%d-%H%M%S"),
            cfg.kind(),
            cfg.common.operation
        )
    }

    /// Create `<base_dir>/<dir_name>` for the given run.
    pub fn create(base_dir: &Path, cfg: &BenchmarkConfig, report: &RunReport) -> Result<Self> {
        let dir_path = base_dir.join(Self::dir_name(cfg, &report.started_at));

        fs::create_dir_all(&dir_path)
            .with_context(|| format!("Failed to create results directory: {}", dir_path.display()))?;

        tracing::info!("Created results directory: {}", dir_path.display());
        Ok(Self { path: dir_path })
    }

    /// Get the path to the results directory
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write_config(&self, cfg: &BenchmarkConfig) -> Result<()> {
        let yaml = serde_yaml::to_string(cfg).context("Failed to serialize config")?;
        fs::write(self.path.join("config.yaml"), yaml)
            .context("Failed to write config.yaml")?;
        Ok(())
    }

    pub fn write_results(&self, report: &RunReport) -> Result<()> {
        let csv_path = self.path.join("results.csv");
        let mut writer = csv::Writer::from_path(&csv_path)
            .with_context(|| format!("Failed to create {}", csv_path.display()))?;

        for o in report.results.outcomes() {
            writer.serialize(ResultRow {
                operation: o.operation,
                worker_id: o.worker_id,
                path: &o.path,
                succeeded: o.succeeded,
                bytes: o.bytes,
                start_time_ms: format!("{:.4}", o.start_time_ms()),
                duration_ms: format!("{:.4}", o.duration_ms()),
                first_block_ms: format!("{:.4}", o.first_block_ms()),
            })?;
        }
        writer.flush().context("Failed to flush results.csv")?;
        Ok(())
    }

    pub fn write_summary(&self, report: &RunReport) -> Result<()> {
        let json = serde_json::to_string_pretty(&report.summary)
            .context("Failed to serialize summary")?;
        fs::write(self.path.join("summary.json"), json)
            .context("Failed to write summary.json")?;
        Ok(())
    }

    /// Write metadata to metadata.json
    pub fn write_metadata(&self, metadata: &RunMetadata) -> Result<()> {
        let json = serde_json::to_string_pretty(metadata)
            .context("Failed to serialize metadata")?;
        fs::write(self.path.join("metadata.json"), json)
            .context("Failed to write metadata.json")?;
        Ok(())
    }

    /// Create the directory and write every artifact of a completed run.
    pub fn save(base_dir: &Path, cfg: &BenchmarkConfig, report: &RunReport) -> Result<Self> {
        let dir = Self::create(base_dir, cfg, report)?;
        dir.write_config(cfg)?;
        dir.write_results(report)?;
        dir.write_summary(report)?;
        dir.write_metadata(&RunMetadata::new(cfg, report))?;
        tracing::info!("Results saved to: {}", dir.path().display());
        Ok(dir)
    }
}
