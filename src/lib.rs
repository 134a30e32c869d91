// src/lib.rs

pub mod backend; // Storage backends: local disk and S3
pub mod config;
pub mod constants;
pub mod metrics; // Summary statistics and percentile ladder
pub mod outcome;
pub mod report; // Console report blocks and CSV rows
pub mod results_dir; // Optional on-disk results directory
pub mod size_parser;
pub mod task;
pub mod workload;
