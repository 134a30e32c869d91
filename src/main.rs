// src/main.rs
//
// -----------------------------------------------------------------------------
// kioperf - throughput and latency benchmark for local disk and S3 storage
// -----------------------------------------------------------------------------

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use dotenvy::dotenv;
use kioperf::backend::create_backend;
use kioperf::config::{
    BackendConfig, BenchmarkConfig, CommonConfig, DiskOptions, Operation, S3Options,
};
use kioperf::constants::{
    DEFAULT_BLOCK_SIZE, DEFAULT_DIR_PATH, DEFAULT_FILES, DEFAULT_FILE_SIZE_MIB,
    DEFAULT_ITERATIONS, DEFAULT_THREADS,
};
use kioperf::results_dir::ResultsDir;
use kioperf::size_parser::parse_size;
use kioperf::workload;
use std::path::PathBuf;
use tokio::runtime::Builder as RtBuilder;
use tracing::{debug, info};

// -----------------------------------------------------------------------------
// CLI definition
// -----------------------------------------------------------------------------
#[derive(Parser)]
#[command(name = "kioperf", version, about = "Throughput and latency benchmark for disk and S3 storage")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging (-v for info, -vv for debug, -vvv for trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Benchmark a local directory
    ///
    /// Examples:
    ///   kioperf disk --operation write --iterations 100 --threads 8 --files 10 --size 4
    ///   kioperf disk --operation read --iterations 100 --threads 8 --files 10 --direct --block-size 1MiB
    Disk {
        #[command(flatten)]
        common: CommonArgs,

        /// Directory that holds the target files
        #[arg(long, default_value = DEFAULT_DIR_PATH)]
        dir_path: String,

        /// fsync every file before a write is reported as complete
        #[arg(long, alias = "sync")]
        fsync: bool,

        /// Bypass the page cache (O_DIRECT on Linux, F_NOCACHE on macOS)
        #[arg(long)]
        direct: bool,
    },
    /// Benchmark an S3 bucket or S3-compatible service
    ///
    /// Examples:
    ///   kioperf s3 --s3-url s3://my-bucket/kioperf-data/ --operation write --iterations 100
    ///   kioperf s3 --bucket my-bucket --prefix test --operation read --threads 16
    S3 {
        #[command(flatten)]
        common: CommonArgs,

        /// Target location [default: s3://bucket/kioperf-data/]
        #[arg(long)]
        s3_url: Option<String>,

        /// Bucket name (alternative to --s3-url)
        #[arg(long)]
        bucket: Option<String>,

        /// Key prefix, only valid with --bucket [default: kioperf-data]
        #[arg(long)]
        prefix: Option<String>,

        /// AWS region (defaults to the environment/profile chain)
        #[arg(long)]
        region: Option<String>,

        /// Custom endpoint for S3-compatible services (uses path-style addressing)
        #[arg(long)]
        endpoint_url: Option<String>,
    },
}

#[derive(Args)]
struct CommonArgs {
    /// Operation to benchmark
    #[arg(long, value_enum, default_value_t = Operation::Read)]
    operation: Operation,

    /// Total number of operations
    #[arg(long, default_value_t = DEFAULT_ITERATIONS)]
    iterations: usize,

    /// Number of concurrent workers
    #[arg(long, default_value_t = DEFAULT_THREADS)]
    threads: usize,

    /// Number of files in the target pool
    #[arg(long, default_value_t = DEFAULT_FILES)]
    files: usize,

    /// Write size in MiB
    #[arg(long, default_value_t = DEFAULT_FILE_SIZE_MIB)]
    size: u64,

    /// Transfer chunk size (e.g. 4096, 64KiB, 1MiB)
    #[arg(long, default_value = DEFAULT_BLOCK_SIZE)]
    block_size: String,

    /// Print every operation instead of progress dots
    #[arg(long)]
    debug: bool,

    /// Print one CSV row per operation
    #[arg(long)]
    csv: bool,

    /// Print the parameters and exit without touching storage
    #[arg(long)]
    dry_run: bool,

    /// Save config, per-operation results and summary under this directory
    #[arg(long, value_name = "DIR")]
    results_dir: Option<PathBuf>,
}

impl CommonArgs {
    fn to_config(&self) -> Result<CommonConfig> {
        let block_size = parse_size(&self.block_size)
            .with_context(|| format!("Invalid --block-size '{}'", self.block_size))?;
        Ok(CommonConfig {
            operation: self.operation,
            iterations: self.iterations,
            threads: self.threads,
            files: self.files,
            file_size_mib: self.size,
            block_size,
            debug: self.debug,
            csv: self.csv,
            dry_run: self.dry_run,
        })
    }
}

// -----------------------------------------------------------------------------
// main
// -----------------------------------------------------------------------------
fn main() -> Result<()> {
    dotenv().ok();
    let cli = Cli::parse();

    let debug_flag = match &cli.command {
        Commands::Disk { common, .. } | Commands::S3 { common, .. } => common.debug,
    };
    init_tracing(cli.verbose, debug_flag);

    let (cfg, results_dir) = build_config(&cli.command)?;
    cfg.validate().context("Invalid configuration")?;
    debug!("Effective configuration: {:?}", cfg);

    let rt = RtBuilder::new_multi_thread().enable_all().build()?;
    rt.block_on(async {
        let backend = create_backend(&cfg).await;
        let mut stdout = std::io::stdout();
        let report = workload::run(&cfg, backend, &mut stdout).await?;

        if let (Some(report), Some(base)) = (report, results_dir) {
            let dir = ResultsDir::save(&base, &cfg, &report)?;
            info!("Results written to {}", dir.path().display());
        }
        Ok::<(), anyhow::Error>(())
    })
}

/// Map -v count to a level for this crate. `RUST_LOG` wins when set.
fn init_tracing(verbose: u8, debug_flag: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let level = match (verbose, debug_flag) {
        (0, false) => "warn",
        (1, false) => "info",
        (0..=2, _) => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("kioperf={}", level)));
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn build_config(command: &Commands) -> Result<(BenchmarkConfig, Option<PathBuf>)> {
    match command {
        Commands::Disk {
            common,
            dir_path,
            fsync,
            direct,
        } => Ok((
            BenchmarkConfig {
                common: common.to_config()?,
                backend: BackendConfig::Disk(DiskOptions {
                    dir_path: dir_path.clone(),
                    direct: *direct,
                    fsync: *fsync,
                }),
            },
            common.results_dir.clone(),
        )),
        Commands::S3 {
            common,
            s3_url,
            bucket,
            prefix,
            region,
            endpoint_url,
        } => {
            let opts = S3Options::resolve(
                s3_url.as_deref(),
                bucket.as_deref(),
                prefix.as_deref(),
                region.clone(),
                endpoint_url.clone(),
            )
            .context("Invalid S3 target")?;
            Ok((
                BenchmarkConfig {
                    common: common.to_config()?,
                    backend: BackendConfig::S3(opts),
                },
                common.results_dir.clone(),
            ))
        }
    }
}
