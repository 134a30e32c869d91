// src/constants.rs
//
// Central location for the defaults and magic numbers used throughout kioperf.
// CLI defaults, file naming, chunking and reporting all read from here.

// =============================================================================
// Size Units
// =============================================================================

/// Bytes per KiB
pub const KIB: u64 = 1024;

/// Bytes per MiB
pub const MIB: u64 = 1024 * 1024;

// =============================================================================
// CLI Defaults
// =============================================================================

/// Default number of operations to perform
pub const DEFAULT_ITERATIONS: usize = 1;

/// Default number of concurrent workers
pub const DEFAULT_THREADS: usize = 1;

/// Default size of the target file pool
pub const DEFAULT_FILES: usize = 1;

/// Default write payload size (MiB)
pub const DEFAULT_FILE_SIZE_MIB: u64 = 1;

/// Default chunk size for disk reads and writes, as accepted by `--block-size`
pub const DEFAULT_BLOCK_SIZE: &str = "1KiB";

/// Default directory for the disk backend
pub const DEFAULT_DIR_PATH: &str = "./kioperf-data";

/// Default object-store URL
pub const DEFAULT_S3_URL: &str = "s3://bucket/kioperf-data/";

/// Default key prefix when `--bucket` is used instead of `--s3-url`
pub const DEFAULT_S3_PREFIX: &str = "kioperf-data";

/// Region used when neither `--region` nor the AWS provider chain yields one
pub const DEFAULT_S3_REGION: &str = "us-west-2";

// =============================================================================
// File Naming
// =============================================================================

/// Tool tag used in generated file names: `<prefix>/kioperf-file-<index>.dat`
pub const FILE_NAME_TOOL: &str = "kioperf";

/// Extension of generated file names
pub const FILE_NAME_EXTENSION: &str = "dat";

// =============================================================================
// Direct I/O
// =============================================================================

/// Buffer and length alignment required for O_DIRECT transfers.
/// 4 KiB covers both 512e and 4Kn devices.
pub const DIRECT_IO_ALIGNMENT: usize = 4096;

// =============================================================================
// Reporting
// =============================================================================

/// Percentiles reported in the duration percentile block
pub const PERCENTILE_LADDER: [u32; 12] = [0, 10, 20, 30, 40, 50, 60, 70, 80, 90, 95, 99];

/// Header of the per-operation CSV block
pub const CSV_HEADER: &str =
    "CSV1,Operation,WorkerId,Path,Succeeded,Bytes,StartTimeMs,Duration,FirstBlockArrivalMs";

/// Tag prefixed to every CSV row so rows can be grepped out of mixed output
pub const CSV_TAG: &str = "CSV1";

/// Name prefix of results directories: `kioperf-{YYYYMMDD-HHMMSS}-{backend}-{op}`
pub const RESULTS_DIR_PREFIX: &str = "kioperf";
