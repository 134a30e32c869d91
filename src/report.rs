//! Console report
//!
//! Everything the run prints to stdout: the parameter block, progress marks,
//! the statistics and percentile blocks and the optional `CSV1` block. All
//! functions write to a caller-supplied `Write` so the report can be captured.

use std::io::{self, Write};

use crate::config::{BackendKind, BenchmarkConfig};
use crate::constants::{CSV_HEADER, CSV_TAG};
use crate::metrics::SummaryStats;
use crate::outcome::OperationOutcome;

/// How each collected outcome is shown while the run is in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressMode {
    /// One `.` per completed operation
    Dots,
    /// One line per completed operation
    Verbose,
}

impl ProgressMode {
    pub fn from_debug(debug: bool) -> Self {
        if debug {
            ProgressMode::Verbose
        } else {
            ProgressMode::Dots
        }
    }

    pub fn record<W: Write>(&self, out: &mut W, outcome: &OperationOutcome) -> io::Result<()> {
        match self {
            ProgressMode::Dots => {
                write!(out, ".")?;
                out.flush()
            }
            ProgressMode::Verbose => writeln!(out, "{}", outcome),
        }
    }

    pub fn finish<W: Write>(&self, out: &mut W) -> io::Result<()> {
        match self {
            ProgressMode::Dots => writeln!(out),
            ProgressMode::Verbose => Ok(()),
        }
    }
}

fn operation_line(kind: BackendKind, cfg: &BenchmarkConfig) -> String {
    format!("{}:{}", kind, cfg.common.operation)
}

/// `TEST PARAMETERS` block followed by backend-specific lines.
pub fn write_parameters<W: Write>(
    out: &mut W,
    cfg: &BenchmarkConfig,
    backend_lines: &[(&'static str, String)],
) -> io::Result<()> {
    let c = &cfg.common;
    writeln!(out, "TEST PARAMETERS")?;
    writeln!(out, "    Operation:   {}", operation_line(cfg.kind(), cfg))?;
    writeln!(out, "    Iterations:  {}", c.iterations)?;
    writeln!(out, "    Threads:     {}", c.threads)?;
    writeln!(out, "    Files:       {}", c.files)?;
    writeln!(out, "    FileSizeMiB: {}", c.file_size_mib)?;
    writeln!(out, "    BlockSize:   {}", c.block_size)?;
    for (name, value) in backend_lines {
        let label = format!("{}:", name);
        writeln!(out, "    {:<12} {}", label, value)?;
    }
    Ok(())
}

/// `CSV1` header plus one row per outcome, in the order given.
pub fn write_csv<W: Write>(out: &mut W, outcomes: &[OperationOutcome]) -> io::Result<()> {
    writeln!(out, "{}", CSV_HEADER)?;
    for o in outcomes {
        writeln!(
            out,
            "{},{},{},{},{},{},{:.4},{:.4},{:.4}",
            CSV_TAG,
            o.operation,
            o.worker_id,
            o.path,
            o.succeeded,
            o.bytes,
            o.start_time_ms(),
            o.duration_ms(),
            o.first_block_ms(),
        )?;
    }
    Ok(())
}

/// `STATISTICS` and percentile blocks.
pub fn write_statistics<W: Write>(
    out: &mut W,
    cfg: &BenchmarkConfig,
    stats: &SummaryStats,
) -> io::Result<()> {
    writeln!(out, "    Operation:   {}", operation_line(cfg.kind(), cfg))?;
    writeln!(out, "STATISTICS")?;
    writeln!(out, "  Throughput: {:.4} MiB/sec", stats.mib_per_second)?;
    writeln!(out, "  Files:      {}", stats.files)?;
    writeln!(out, "  Bytes:      {}", stats.bytes)?;
    writeln!(out, "  Succeeded:  {}", stats.succeeded)?;
    writeln!(out, "  Failed:     {}", stats.failed)?;
    writeln!(out, "  I/O Duration Statistics")?;
    writeln!(out, "    Min:        {:.4} msec", stats.min_ms)?;
    writeln!(out, "    Avg:        {:.4} msec", stats.avg_ms)?;
    writeln!(out, "    Max:        {:.4} msec", stats.max_ms)?;
    writeln!(out, "  I/O Duration Percentiles")?;
    for p in &stats.percentiles {
        writeln!(out, "    P{}: {:.4}", p.percentile, p.duration_ms)?;
    }
    Ok(())
}
