// Local Disk Backend Integration Tests
// End-to-end runs of the benchmark engine against temporary directories.
//
// These tests always run - no credentials needed for local filesystem.
//
// Run with: cargo test --test disk_tests -- --nocapture

use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;
use tempfile::TempDir;

use kioperf::backend::{DiskBackend, StorageBackend};
use kioperf::config::{BackendConfig, BenchmarkConfig, CommonConfig, DiskOptions, Operation};
use kioperf::constants::{CSV_HEADER, MIB};
use kioperf::workload::{self, RunReport};

fn disk_config(dir: &str, operation: Operation, iterations: usize, threads: usize, files: usize) -> BenchmarkConfig {
    BenchmarkConfig {
        common: CommonConfig {
            operation,
            iterations,
            threads,
            files,
            file_size_mib: 1,
            block_size: 1024,
            debug: false,
            csv: false,
            dry_run: false,
        },
        backend: BackendConfig::Disk(DiskOptions {
            dir_path: dir.to_string(),
            direct: false,
            fsync: false,
        }),
    }
}

fn backend_for(cfg: &BenchmarkConfig) -> Arc<dyn StorageBackend> {
    match &cfg.backend {
        BackendConfig::Disk(opts) => Arc::new(DiskBackend::new(opts.clone())),
        BackendConfig::S3(_) => unreachable!("disk tests only"),
    }
}

async fn run_captured(cfg: &BenchmarkConfig) -> Result<(Option<RunReport>, String)> {
    let mut out = Vec::new();
    let report = workload::run(cfg, backend_for(cfg), &mut out).await?;
    Ok((report, String::from_utf8(out)?))
}

#[tokio::test]
async fn test_write_run_distributes_over_pool() -> Result<()> {
    let temp = TempDir::new()?;
    let dir = temp.path().join("data").display().to_string();
    let cfg = disk_config(&dir, Operation::Write, 4, 2, 2);

    let (report, output) = run_captured(&cfg).await?;
    let report = report.expect("non-dry run returns a report");

    let outcomes = report.results.outcomes();
    assert_eq!(outcomes.len(), 4);
    assert!(outcomes.iter().all(|o| o.succeeded));
    assert!(outcomes.iter().all(|o| o.operation == "disk-write"));

    let mut per_path: HashMap<&str, usize> = HashMap::new();
    for o in outcomes {
        *per_path.entry(o.path.as_str()).or_default() += 1;
    }
    assert_eq!(per_path.len(), 2);
    assert!(per_path.values().all(|&n| n == 2));

    assert_eq!(report.summary.bytes, 4 * MIB);
    assert_eq!(report.summary.succeeded, 4);
    assert_eq!(report.summary.failed, 0);

    // Prepare created the missing directory
    for i in 0..2 {
        let path = temp.path().join("data").join(format!("kioperf-file-{}.dat", i));
        assert_eq!(std::fs::metadata(&path)?.len(), MIB);
    }

    assert!(output.starts_with("TEST PARAMETERS\n"));
    assert!(output.contains("Starting... "));
    assert!(output.contains("Ending... "));
    assert!(output.contains("....\n"));
    assert!(output.contains("  Succeeded:  4\n"));
    println!("{}", output);
    Ok(())
}

#[tokio::test]
async fn test_read_existing_file() -> Result<()> {
    let temp = TempDir::new()?;
    let dir = temp.path().display().to_string();
    let size = 300_000usize;
    std::fs::write(temp.path().join("kioperf-file-0.dat"), vec![42u8; size])?;

    let cfg = disk_config(&dir, Operation::Read, 3, 1, 1);
    let (report, _) = run_captured(&cfg).await?;
    let report = report.expect("report");

    assert_eq!(report.results.len(), 3);
    for o in report.results.outcomes() {
        assert!(o.succeeded);
        assert_eq!(o.bytes, size as u64);
        assert_eq!(o.worker_id, 0);
        assert!(o.first_block.is_some());
    }
    assert_eq!(report.summary.bytes, 3 * size as u64);
    Ok(())
}

#[tokio::test]
async fn test_write_then_read_round_trip() -> Result<()> {
    let temp = TempDir::new()?;
    let dir = temp.path().display().to_string();

    let mut cfg = disk_config(&dir, Operation::Write, 2, 2, 2);
    cfg.common.file_size_mib = 2;
    run_captured(&cfg).await?;

    cfg.common.operation = Operation::Read;
    let (report, _) = run_captured(&cfg).await?;
    let report = report.expect("report");
    assert!(report.results.outcomes().iter().all(|o| o.succeeded && o.bytes == 2 * MIB));
    Ok(())
}

#[tokio::test]
async fn test_read_missing_files_all_fail() -> Result<()> {
    let temp = TempDir::new()?;
    let dir = temp.path().join("does-not-exist").display().to_string();
    let cfg = disk_config(&dir, Operation::Read, 5, 2, 3);

    let (report, output) = run_captured(&cfg).await?;
    let report = report.expect("failed operations still produce a report");

    assert_eq!(report.results.len(), 5);
    assert!(report.results.outcomes().iter().all(|o| !o.succeeded && o.bytes == 0));
    assert_eq!(report.summary.failed, 5);
    assert_eq!(report.summary.succeeded, 0);
    assert!(output.contains("  Failed:     5\n"));

    // Reads never create the target directory
    assert!(!temp.path().join("does-not-exist").exists());
    Ok(())
}

#[tokio::test]
async fn test_dry_run_touches_nothing() -> Result<()> {
    let temp = TempDir::new()?;
    let target = temp.path().join("dry");
    let mut cfg = disk_config(&target.display().to_string(), Operation::Write, 4, 2, 2);
    cfg.common.dry_run = true;
    cfg.common.csv = true;

    let (report, output) = run_captured(&cfg).await?;
    assert!(report.is_none());
    assert!(!target.exists());
    assert!(output.starts_with("TEST PARAMETERS\n"));
    assert!(output.contains("    DirPath:     "));
    assert!(!output.contains("Starting..."));
    assert!(!output.contains(CSV_HEADER));
    Ok(())
}

#[tokio::test]
async fn test_csv_block_has_one_row_per_iteration() -> Result<()> {
    let temp = TempDir::new()?;
    let dir = temp.path().display().to_string();
    let mut cfg = disk_config(&dir, Operation::Write, 7, 3, 2);
    cfg.common.csv = true;

    let (_, output) = run_captured(&cfg).await?;
    let csv_lines: Vec<&str> = output.lines().filter(|l| l.starts_with("CSV1,")).collect();
    assert_eq!(csv_lines.len(), 7 + 1);
    assert_eq!(csv_lines[0], CSV_HEADER);
    for row in &csv_lines[1..] {
        let fields: Vec<&str> = row.split(',').collect();
        assert_eq!(fields.len(), 9);
        assert_eq!(fields[1], "disk-write");
        assert_eq!(fields[4], "true");
        assert_eq!(fields[5], MIB.to_string());
        // Write runs report no first-block arrival
        assert_eq!(fields[8], "0.0000");
    }
    Ok(())
}

#[tokio::test]
async fn test_debug_prints_every_outcome() -> Result<()> {
    let temp = TempDir::new()?;
    let dir = temp.path().display().to_string();
    let mut cfg = disk_config(&dir, Operation::Write, 3, 1, 1);
    cfg.common.debug = true;

    let (_, output) = run_captured(&cfg).await?;
    let lines = output.lines().filter(|l| l.starts_with("disk-write worker=")).count();
    assert_eq!(lines, 3);
    Ok(())
}

#[tokio::test]
async fn test_invalid_config_rejected_before_any_io() {
    let temp = TempDir::new().unwrap();
    let target = temp.path().join("never");
    let cfg = disk_config(&target.display().to_string(), Operation::Write, 0, 1, 1);

    let mut out = Vec::new();
    let err = workload::run(&cfg, backend_for(&cfg), &mut out).await.unwrap_err();
    assert!(err.to_string().contains("iterations"));
    assert!(out.is_empty());
    assert!(!target.exists());
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn test_direct_io_write_and_read() -> Result<()> {
    // tmpfs rejects O_DIRECT, so use a directory under the crate target
    let base = std::env::current_dir()?.join("target");
    std::fs::create_dir_all(&base)?;
    let temp = TempDir::new_in(&base)?;
    let dir = temp.path().display().to_string();

    let mut cfg = disk_config(&dir, Operation::Write, 2, 2, 1);
    cfg.common.block_size = 64 * 1024;
    if let BackendConfig::Disk(disk) = &mut cfg.backend {
        disk.direct = true;
        disk.fsync = true;
    }

    let (report, _) = run_captured(&cfg).await?;
    let report = report.expect("report");
    if !report.results.outcomes().iter().all(|o| o.succeeded) {
        println!("Skipping: filesystem at {} does not support O_DIRECT", dir);
        return Ok(());
    }
    assert_eq!(report.summary.bytes, 2 * MIB);

    cfg.common.operation = Operation::Read;
    let (report, _) = run_captured(&cfg).await?;
    let report = report.expect("report");
    assert!(report.results.outcomes().iter().all(|o| o.succeeded && o.bytes == MIB));
    Ok(())
}
