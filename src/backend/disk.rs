//! Local-file backend
//!
//! Each operation runs as a single `spawn_blocking` call, so the measured
//! duration covers the blocking file I/O only. Writes stream the shared
//! payload in `block_size` chunks; reads drain the file in the same chunk
//! size and record when the first chunk arrived.

use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::fs::{File, OpenOptions};
use std::io::{self, ErrorKind, Read, Write};
use std::path::Path;
use std::time::Instant;
use tracing::{info, warn};

use super::{RunContext, StorageBackend};
use crate::config::{BackendKind, DiskOptions, Operation};
use crate::constants::DIRECT_IO_ALIGNMENT;
use crate::outcome::OperationOutcome;

pub const DISK_WRITE: &str = "disk-write";
pub const DISK_READ: &str = "disk-read";

pub struct DiskBackend {
    opts: DiskOptions,
}

impl DiskBackend {
    pub fn new(opts: DiskOptions) -> Self {
        Self { opts }
    }
}

#[async_trait]
impl StorageBackend for DiskBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Disk
    }

    fn describe(&self) -> Vec<(&'static str, String)> {
        vec![
            ("DirPath", self.opts.dir_path.clone()),
            ("Direct", self.opts.direct.to_string()),
            ("Fsync", self.opts.fsync.to_string()),
        ]
    }

    async fn prepare(&self, operation: Operation) -> Result<()> {
        if operation == Operation::Write {
            let dir = self.opts.dir_path.clone();
            info!("Ensuring target directory exists: {}", dir);
            tokio::fs::create_dir_all(&dir)
                .await
                .with_context(|| format!("Failed to create target directory: {}", dir))?;
        }
        Ok(())
    }

    async fn write(&self, ctx: &RunContext, path: &str) -> OperationOutcome {
        let job = WriteJob {
            path: path.to_string(),
            payload: ctx.payload().clone(),
            block_size: ctx.block_size(),
            direct: self.opts.direct,
            fsync: self.opts.fsync,
            run_start: ctx.started(),
        };
        run_blocking(DISK_WRITE, path, ctx, move || job.run()).await
    }

    async fn read(&self, ctx: &RunContext, path: &str) -> OperationOutcome {
        let job = ReadJob {
            path: path.to_string(),
            block_size: ctx.block_size(),
            direct: self.opts.direct,
            run_start: ctx.started(),
        };
        run_blocking(DISK_READ, path, ctx, move || job.run()).await
    }
}

/// Run a blocking job; a panicked job becomes a failed outcome.
async fn run_blocking<F>(label: &'static str, path: &str, ctx: &RunContext, job: F) -> OperationOutcome
where
    F: FnOnce() -> OperationOutcome + Send + 'static,
{
    match tokio::task::spawn_blocking(job).await {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!("{} task for {} did not complete: {}", label, path, e);
            OperationOutcome::new(label, path, ctx.since_start(Instant::now()))
        }
    }
}

struct WriteJob {
    path: String,
    payload: Bytes,
    block_size: usize,
    direct: bool,
    fsync: bool,
    run_start: Instant,
}

impl WriteJob {
    fn run(self) -> OperationOutcome {
        let start = Instant::now();
        let mut outcome = OperationOutcome::new(
            DISK_WRITE,
            self.path.as_str(),
            start.saturating_duration_since(self.run_start),
        );

        let mut file = match open_file(&self.path, true, self.direct) {
            Ok(f) => f,
            Err(e) => {
                warn!("open {} for write failed: {}", self.path, e);
                outcome.duration = start.elapsed();
                return outcome;
            }
        };

        self.write_to(&mut file, &mut outcome);
        drop(file);
        outcome.duration = start.elapsed();
        outcome
    }

    /// Stream the payload into `sink` and optionally sync it. Bytes count
    /// whole chunks accepted; success needs every chunk and the sync.
    fn write_to<S: PayloadSink>(&self, sink: &mut S, outcome: &mut OperationOutcome) {
        // O_DIRECT needs an aligned source buffer; the shared payload is not
        let mut scratch = self
            .direct
            .then(|| AlignedBuffer::new(self.block_size, DIRECT_IO_ALIGNMENT));

        for chunk in self.payload.chunks(self.block_size) {
            let result = match scratch.as_mut() {
                Some(buf) => {
                    let dst = &mut buf.as_mut_slice()[..chunk.len()];
                    dst.copy_from_slice(chunk);
                    sink.write_all(dst)
                }
                None => sink.write_all(chunk),
            };
            if let Err(e) = result {
                warn!("write to {} failed after {} bytes: {}", self.path, outcome.bytes, e);
                return;
            }
            outcome.bytes += chunk.len() as u64;
        }

        if self.fsync {
            if let Err(e) = sink.sync() {
                warn!("fsync of {} failed: {}", self.path, e);
                return;
            }
        }

        outcome.succeeded = true;
    }
}

/// Destination of a write job.
trait PayloadSink: Write {
    /// Flush data and metadata to stable storage.
    fn sync(&mut self) -> io::Result<()>;
}

impl PayloadSink for File {
    fn sync(&mut self) -> io::Result<()> {
        self.sync_all()
    }
}

struct ReadJob {
    path: String,
    block_size: usize,
    direct: bool,
    run_start: Instant,
}

impl ReadJob {
    fn run(self) -> OperationOutcome {
        let start = Instant::now();
        let mut outcome = OperationOutcome::new(
            DISK_READ,
            self.path.as_str(),
            start.saturating_duration_since(self.run_start),
        );

        let mut file = match open_file(&self.path, false, self.direct) {
            Ok(f) => f,
            Err(e) => {
                warn!("open {} for read failed: {}", self.path, e);
                outcome.duration = start.elapsed();
                return outcome;
            }
        };

        let align = if self.direct { DIRECT_IO_ALIGNMENT } else { 1 };
        let mut buf = AlignedBuffer::new(self.block_size, align);

        loop {
            match file.read(buf.as_mut_slice()) {
                Ok(0) => {
                    outcome.succeeded = true;
                    break;
                }
                Ok(n) => {
                    outcome.bytes += n as u64;
                    if outcome.first_block.is_none() {
                        outcome.first_block = Some(start.elapsed());
                    }
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!("read of {} failed after {} bytes: {}", self.path, outcome.bytes, e);
                    break;
                }
            }
        }

        outcome.duration = start.elapsed();
        outcome
    }
}

/// Open a target file, optionally bypassing the page cache.
fn open_file(path: &str, write: bool, direct: bool) -> io::Result<File> {
    let mut options = OpenOptions::new();
    if write {
        options.write(true).create(true).truncate(true);
    } else {
        options.read(true);
    }

    if direct {
        #[cfg(target_os = "linux")]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.custom_flags(libc::O_DIRECT);
        }

        #[cfg(not(any(target_os = "linux", target_os = "macos")))]
        {
            warn!("Direct I/O not supported on this platform, falling back to buffered I/O");
        }
    }

    let file = options.open(Path::new(path))?;

    // macOS has no O_DIRECT; F_NOCACHE on the open descriptor is the equivalent
    #[cfg(target_os = "macos")]
    {
        if direct {
            use std::os::unix::io::AsRawFd;
            let rc = unsafe { libc::fcntl(file.as_raw_fd(), libc::F_NOCACHE, 1) };
            if rc == -1 {
                warn!("Failed to set F_NOCACHE on {}, continuing with buffered I/O", path);
            }
        }
    }

    Ok(file)
}

/// Heap buffer whose usable window starts on an `align` boundary.
struct AlignedBuffer {
    storage: Vec<u8>,
    offset: usize,
    len: usize,
}

impl AlignedBuffer {
    fn new(len: usize, align: usize) -> Self {
        let align = align.max(1);
        let storage = vec![0u8; len + align];
        let offset = storage.as_ptr().align_offset(align).min(align);
        Self { storage, offset, len }
    }

    fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.storage[self.offset..self.offset + self.len]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::build_write_payload;
    use std::time::Duration;
    use tempfile::TempDir;

    fn backend(dir: &TempDir, fsync: bool) -> DiskBackend {
        DiskBackend::new(DiskOptions {
            dir_path: dir.path().display().to_string(),
            direct: false,
            fsync,
        })
    }

    /// Accepts `limit` bytes, then fails every write; optionally fails sync.
    #[derive(Default)]
    struct FailingSink {
        accepted: Vec<u8>,
        limit: usize,
        fail_sync: bool,
        synced: bool,
    }

    impl Write for FailingSink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let room = self.limit.saturating_sub(self.accepted.len());
            if room == 0 {
                return Err(io::Error::new(ErrorKind::Other, "no space left"));
            }
            let n = room.min(buf.len());
            self.accepted.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl PayloadSink for FailingSink {
        fn sync(&mut self) -> io::Result<()> {
            if self.fail_sync {
                return Err(io::Error::new(ErrorKind::Other, "sync failed"));
            }
            self.synced = true;
            Ok(())
        }
    }

    fn write_job(payload_len: usize, block_size: usize, fsync: bool) -> WriteJob {
        WriteJob {
            path: "sink.dat".to_string(),
            payload: build_write_payload(payload_len),
            block_size,
            direct: false,
            fsync,
            run_start: Instant::now(),
        }
    }

    #[test]
    fn test_write_failing_partway_counts_whole_chunks() {
        let job = write_job(4096, 1024, false);
        let mut sink = FailingSink {
            limit: 2500,
            ..Default::default()
        };
        let mut outcome = OperationOutcome::new(DISK_WRITE, "sink.dat", Duration::ZERO);

        job.write_to(&mut sink, &mut outcome);
        assert!(!outcome.succeeded);
        assert_eq!(outcome.bytes, 2048);
        assert_eq!(sink.accepted.len(), 2500);
    }

    #[test]
    fn test_fsync_failure_fails_the_write() {
        let job = write_job(4096, 1024, true);
        let mut sink = FailingSink {
            limit: usize::MAX,
            fail_sync: true,
            ..Default::default()
        };
        let mut outcome = OperationOutcome::new(DISK_WRITE, "sink.dat", Duration::ZERO);

        job.write_to(&mut sink, &mut outcome);
        assert!(!outcome.succeeded);
        assert_eq!(outcome.bytes, 4096);
        assert_eq!(sink.accepted.len(), 4096);
    }

    #[test]
    fn test_sync_only_when_requested() {
        let mut sink = FailingSink {
            limit: usize::MAX,
            fail_sync: true,
            ..Default::default()
        };
        let mut outcome = OperationOutcome::new(DISK_WRITE, "sink.dat", Duration::ZERO);
        write_job(3000, 1024, false).write_to(&mut sink, &mut outcome);
        assert!(outcome.succeeded);
        assert_eq!(outcome.bytes, 3000);

        let mut sink = FailingSink {
            limit: usize::MAX,
            ..Default::default()
        };
        let mut outcome = OperationOutcome::new(DISK_WRITE, "sink.dat", Duration::ZERO);
        write_job(3000, 1024, true).write_to(&mut sink, &mut outcome);
        assert!(outcome.succeeded);
        assert!(sink.synced);
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_write_to_full_device_fails() {
        if !Path::new("/dev/full").exists() {
            println!("Skipping: /dev/full not available");
            return;
        }
        let dir = TempDir::new().unwrap();
        let be = backend(&dir, false);

        let ctx = RunContext::new(Operation::Write, build_write_payload(4096), 1024);
        let w = be.write(&ctx, "/dev/full").await;
        assert!(!w.succeeded);
        assert_eq!(w.bytes, 0);
    }

    #[test]
    fn test_aligned_buffer() {
        let mut buf = AlignedBuffer::new(8192, 4096);
        let slice = buf.as_mut_slice();
        assert_eq!(slice.len(), 8192);
        assert_eq!(slice.as_ptr() as usize % 4096, 0);
    }

    #[tokio::test]
    async fn test_write_then_read_round_trip() {
        let dir = TempDir::new().unwrap();
        let be = backend(&dir, true);
        let path = dir.path().join("kioperf-file-0.dat").display().to_string();

        let payload = build_write_payload(1024 * 1024);
        let ctx = RunContext::new(Operation::Write, payload.clone(), 1024);
        let w = be.write(&ctx, &path).await;
        assert!(w.succeeded);
        assert_eq!(w.operation, DISK_WRITE);
        assert_eq!(w.bytes, 1024 * 1024);
        assert!(w.first_block.is_none());

        let on_disk = std::fs::read(&path).unwrap();
        assert_eq!(on_disk.as_slice(), payload.as_ref());

        let ctx = RunContext::new(Operation::Read, Bytes::new(), 1024);
        let r = be.read(&ctx, &path).await;
        assert!(r.succeeded);
        assert_eq!(r.operation, DISK_READ);
        assert_eq!(r.bytes, 1024 * 1024);
        assert!(r.first_block.is_some());
        assert!(r.first_block.unwrap() <= r.duration);
    }

    #[tokio::test]
    async fn test_block_size_that_does_not_divide_payload() {
        let dir = TempDir::new().unwrap();
        let be = backend(&dir, false);
        let path = dir.path().join("odd.dat").display().to_string();

        let ctx = RunContext::new(Operation::Write, build_write_payload(10_000), 3000);
        let w = be.write(&ctx, &path).await;
        assert!(w.succeeded);
        assert_eq!(w.bytes, 10_000);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 10_000);
    }

    #[tokio::test]
    async fn test_rewrite_truncates() {
        let dir = TempDir::new().unwrap();
        let be = backend(&dir, false);
        let path = dir.path().join("t.dat").display().to_string();
        std::fs::write(&path, vec![7u8; 5000]).unwrap();

        let ctx = RunContext::new(Operation::Write, build_write_payload(1000), 1024);
        assert!(be.write(&ctx, &path).await.succeeded);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 1000);
    }

    #[tokio::test]
    async fn test_read_missing_file_fails() {
        let dir = TempDir::new().unwrap();
        let be = backend(&dir, false);
        let path = dir.path().join("missing.dat").display().to_string();

        let ctx = RunContext::new(Operation::Read, Bytes::new(), 1024);
        let r = be.read(&ctx, &path).await;
        assert!(!r.succeeded);
        assert_eq!(r.bytes, 0);
        assert!(r.first_block.is_none());
    }

    #[tokio::test]
    async fn test_write_into_missing_directory_fails() {
        let dir = TempDir::new().unwrap();
        let be = backend(&dir, false);
        let path = dir.path().join("nope").join("f.dat").display().to_string();

        let ctx = RunContext::new(Operation::Write, build_write_payload(4096), 1024);
        let w = be.write(&ctx, &path).await;
        assert!(!w.succeeded);
        assert_eq!(w.bytes, 0);
    }

    #[tokio::test]
    async fn test_prepare_creates_directory_for_writes_only() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("a").join("b");
        let be = DiskBackend::new(DiskOptions {
            dir_path: target.display().to_string(),
            direct: false,
            fsync: false,
        });

        be.prepare(Operation::Read).await.unwrap();
        assert!(!target.exists());

        be.prepare(Operation::Write).await.unwrap();
        assert!(target.is_dir());
    }
}
