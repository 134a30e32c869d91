// src/config.rs
//
// Benchmark configuration shared by both backends. Built once from the CLI,
// validated before anything touches storage, and immutable for the run.

use serde::Serialize;
use std::fmt;
use thiserror::Error;
use url::Url;

use crate::constants::{
    DEFAULT_S3_PREFIX, DEFAULT_S3_URL, DIRECT_IO_ALIGNMENT, FILE_NAME_EXTENSION, FILE_NAME_TOOL, MIB,
};

/// Fatal configuration problems, reported before any worker starts.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("iterations must be at least 1")]
    ZeroIterations,

    #[error("threads must be at least 1")]
    ZeroThreads,

    #[error("files must be at least 1")]
    ZeroFiles,

    #[error("size must be at least 1 MiB for write operations")]
    ZeroFileSize,

    #[error("block size must be at least 1 byte")]
    ZeroBlockSize,

    #[error("size of {0} MiB is too large for a single in-memory payload")]
    FileSizeTooLarge(u64),

    #[error("block size {0} is too large for an in-memory transfer buffer")]
    BlockSizeTooLarge(u64),

    #[error("block size {0} must be a multiple of 4096 bytes when direct I/O is enabled")]
    UnalignedDirectBlockSize(u64),

    #[error("invalid S3 URL '{url}': {reason}")]
    InvalidS3Url { url: String, reason: String },

    #[error("a bucket name is required")]
    MissingBucket,

    #[error("conflicting flags: {0}")]
    ConflictingFlags(String),

    #[error("invalid size: {0}")]
    InvalidSize(String),
}

/// I/O operation performed by every iteration of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Read,
    Write,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Read => "read",
            Operation::Write => "write",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Storage medium under test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Disk,
    S3,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Disk => "disk",
            BackendKind::S3 => "s3",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Settings common to every backend.
#[derive(Debug, Clone, Serialize)]
pub struct CommonConfig {
    /// Read or write
    pub operation: Operation,

    /// Total number of operations to run
    pub iterations: usize,

    /// Number of concurrent workers
    pub threads: usize,

    /// Size of the target file pool; iteration `i` targets file `i % files`
    pub files: usize,

    /// Write payload size in MiB (ignored for reads)
    pub file_size_mib: u64,

    /// Chunk size for chunked transfers, in bytes
    pub block_size: u64,

    /// Print every outcome instead of progress dots
    pub debug: bool,

    /// Print the per-operation CSV block
    pub csv: bool,

    /// Validate and print parameters, then stop
    pub dry_run: bool,
}

/// Local-file backend options.
#[derive(Debug, Clone, Serialize)]
pub struct DiskOptions {
    /// Directory that holds the target files
    pub dir_path: String,

    /// Open files with O_DIRECT (F_NOCACHE on macOS)
    pub direct: bool,

    /// fsync each file before reporting a write as successful
    pub fsync: bool,
}

/// Bucket and key prefix resolved from an `s3://bucket/path` URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct S3Location {
    pub bucket: String,
    /// Key prefix without leading or trailing '/'; may be empty
    pub prefix: String,
}

impl S3Location {
    /// Parse `s3://bucket/path`. The path must be present (`s3://bucket/`
    /// is fine and yields an empty prefix, `s3://bucket` is rejected).
    pub fn parse(url: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidS3Url {
            url: url.to_string(),
            reason: reason.to_string(),
        };

        let parsed = Url::parse(url).map_err(|e| invalid(&e.to_string()))?;
        if parsed.scheme() != "s3" {
            return Err(invalid("URL must have format s3://bucket/path"));
        }
        let bucket = match parsed.host_str() {
            Some(host) if !host.is_empty() => host.to_string(),
            _ => return Err(invalid("URL must have format s3://bucket/path")),
        };
        if parsed.path().is_empty() {
            return Err(invalid("URL must have format s3://bucket/path"));
        }

        Ok(Self {
            bucket,
            prefix: normalize_prefix(parsed.path()),
        })
    }

    /// Build a location from separate `--bucket` and `--prefix` values.
    pub fn from_parts(bucket: &str, prefix: &str) -> Result<Self, ConfigError> {
        let bucket = bucket.trim();
        if bucket.is_empty() {
            return Err(ConfigError::MissingBucket);
        }
        Ok(Self {
            bucket: bucket.to_string(),
            prefix: normalize_prefix(prefix),
        })
    }

    /// Canonical `s3://bucket/prefix/` form used in reports.
    pub fn url(&self) -> String {
        if self.prefix.is_empty() {
            format!("s3://{}/", self.bucket)
        } else {
            format!("s3://{}/{}/", self.bucket, self.prefix)
        }
    }
}

fn normalize_prefix(path: &str) -> String {
    path.trim_matches('/').to_string()
}

/// Object-store backend options.
#[derive(Debug, Clone, Serialize)]
pub struct S3Options {
    /// URL as given on the command line (or synthesized from bucket/prefix)
    pub url: String,

    pub location: S3Location,

    /// Explicit region; otherwise the AWS provider chain decides
    pub region: Option<String>,

    /// Custom endpoint for S3-compatible services
    pub endpoint_url: Option<String>,
}

impl S3Options {
    pub fn from_url(
        url: &str,
        region: Option<String>,
        endpoint_url: Option<String>,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            url: url.to_string(),
            location: S3Location::parse(url)?,
            region,
            endpoint_url,
        })
    }

    pub fn from_bucket(
        bucket: &str,
        prefix: &str,
        region: Option<String>,
        endpoint_url: Option<String>,
    ) -> Result<Self, ConfigError> {
        let location = S3Location::from_parts(bucket, prefix)?;
        Ok(Self {
            url: location.url(),
            location,
            region,
            endpoint_url,
        })
    }

    /// Pick between the `--s3-url` and `--bucket`/`--prefix` spellings.
    /// Neither given falls back to the default URL. Mixing the two, or a
    /// prefix without a bucket, is an error.
    pub fn resolve(
        s3_url: Option<&str>,
        bucket: Option<&str>,
        prefix: Option<&str>,
        region: Option<String>,
        endpoint_url: Option<String>,
    ) -> Result<Self, ConfigError> {
        match (s3_url, bucket, prefix) {
            (Some(_), Some(_), _) => Err(ConfigError::ConflictingFlags(
                "--bucket cannot be combined with --s3-url".to_string(),
            )),
            (Some(_), None, Some(_)) => Err(ConfigError::ConflictingFlags(
                "--prefix cannot be combined with --s3-url".to_string(),
            )),
            (None, Some(bucket), prefix) => Self::from_bucket(
                bucket,
                prefix.unwrap_or(DEFAULT_S3_PREFIX),
                region,
                endpoint_url,
            ),
            (None, None, Some(_)) => Err(ConfigError::MissingBucket),
            (url, None, None) => Self::from_url(url.unwrap_or(DEFAULT_S3_URL), region, endpoint_url),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BackendConfig {
    Disk(DiskOptions),
    S3(S3Options),
}

#[derive(Debug, Clone, Serialize)]
pub struct BenchmarkConfig {
    pub common: CommonConfig,
    pub backend: BackendConfig,
}

impl BenchmarkConfig {
    pub fn kind(&self) -> BackendKind {
        match self.backend {
            BackendConfig::Disk(_) => BackendKind::Disk,
            BackendConfig::S3(_) => BackendKind::S3,
        }
    }

    /// Check every invariant the run depends on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let c = &self.common;
        if c.iterations == 0 {
            return Err(ConfigError::ZeroIterations);
        }
        if c.threads == 0 {
            return Err(ConfigError::ZeroThreads);
        }
        if c.files == 0 {
            return Err(ConfigError::ZeroFiles);
        }
        if c.operation == Operation::Write && c.file_size_mib == 0 {
            return Err(ConfigError::ZeroFileSize);
        }
        if c.block_size == 0 {
            return Err(ConfigError::ZeroBlockSize);
        }
        self.block_size_bytes()?;
        if c.operation == Operation::Write {
            self.payload_bytes()?;
        }
        if let BackendConfig::Disk(disk) = &self.backend {
            if disk.direct && c.block_size % DIRECT_IO_ALIGNMENT as u64 != 0 {
                return Err(ConfigError::UnalignedDirectBlockSize(c.block_size));
            }
        }
        Ok(())
    }

    /// Directory (disk) or key prefix (s3) under which target files live.
    pub fn target_prefix(&self) -> &str {
        match &self.backend {
            BackendConfig::Disk(disk) => &disk.dir_path,
            BackendConfig::S3(s3) => &s3.location.prefix,
        }
    }

    /// Size of the shared write payload in bytes. It must be addressable as
    /// one buffer.
    pub fn payload_bytes(&self) -> Result<usize, ConfigError> {
        let mib = self.common.file_size_mib;
        mib.checked_mul(MIB)
            .and_then(|bytes| usize::try_from(bytes).ok())
            .filter(|&bytes| bytes <= isize::MAX as usize)
            .ok_or(ConfigError::FileSizeTooLarge(mib))
    }

    /// Transfer chunk size in bytes, with room for direct-I/O alignment slack.
    pub fn block_size_bytes(&self) -> Result<usize, ConfigError> {
        let size = self.common.block_size;
        usize::try_from(size)
            .ok()
            .filter(|bytes| bytes.checked_add(DIRECT_IO_ALIGNMENT).is_some())
            .ok_or(ConfigError::BlockSizeTooLarge(size))
    }
}

/// File name for pool index `index`, e.g. `kioperf-file-3.dat`.
pub fn file_name(index: usize) -> String {
    format!("{}-file-{}.{}", FILE_NAME_TOOL, index, FILE_NAME_EXTENSION)
}
