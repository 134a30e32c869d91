// src/backend/s3.rs
//
// Object-store backend on the AWS SDK. Paths produced by the task generator
// are used verbatim as object keys under the configured bucket. One client is
// built at startup and shared by every worker (the SDK client is internally
// reference counted and pools connections).

use async_trait::async_trait;
use aws_config::meta::region::RegionProviderChain;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3 as s3;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use std::time::Instant;
use tracing::{info, warn};

use super::{RunContext, StorageBackend};
use crate::config::{BackendKind, S3Options};
use crate::constants::DEFAULT_S3_REGION;
use crate::outcome::OperationOutcome;

pub const S3_WRITE: &str = "s3-write";
pub const S3_READ: &str = "s3-read";

/// Reported region when the provider chain was never consulted.
const UNRESOLVED_REGION: &str = "auto";

pub struct S3Backend {
    opts: S3Options,
    client: s3::Client,
    region: String,
}

impl S3Backend {
    /// Resolve region and credentials and build the shared client.
    pub async fn connect(opts: S3Options) -> Self {
        let region_provider = RegionProviderChain::first_try(opts.region.clone().map(Region::new))
            .or_default_provider()
            .or_else(Region::new(DEFAULT_S3_REGION));

        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(region_provider)
            .load()
            .await;

        let region = sdk_config
            .region()
            .map(|r| r.to_string())
            .unwrap_or_else(|| DEFAULT_S3_REGION.to_string());

        let mut builder = s3::config::Builder::from(&sdk_config);
        if let Some(endpoint) = &opts.endpoint_url {
            info!("Using custom S3 endpoint: {}", endpoint);
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }
        let client = s3::Client::from_conf(builder.build());

        info!(
            "S3 client ready: bucket={} prefix={} region={}",
            opts.location.bucket, opts.location.prefix, region
        );

        Self { opts, client, region }
    }

    /// Client for runs that never send a request (dry runs). Skips the
    /// region and credential provider chains, so nothing touches the network
    /// or the instance metadata service.
    pub fn offline(opts: S3Options) -> Self {
        let region = opts
            .region
            .clone()
            .unwrap_or_else(|| UNRESOLVED_REGION.to_string());

        let mut builder = s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(
                opts.region.clone().unwrap_or_else(|| DEFAULT_S3_REGION.to_string()),
            ));
        if let Some(endpoint) = &opts.endpoint_url {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }
        let client = s3::Client::from_conf(builder.build());

        Self { opts, client, region }
    }

    fn bucket(&self) -> &str {
        &self.opts.location.bucket
    }
}

#[async_trait]
impl StorageBackend for S3Backend {
    fn kind(&self) -> BackendKind {
        BackendKind::S3
    }

    fn describe(&self) -> Vec<(&'static str, String)> {
        let mut lines = vec![
            ("S3Url", self.opts.url.clone()),
            ("S3Bucket", self.opts.location.bucket.clone()),
            ("S3Prefix", self.opts.location.prefix.clone()),
            ("Region", self.region.clone()),
        ];
        if let Some(endpoint) = &self.opts.endpoint_url {
            lines.push(("EndpointUrl", endpoint.clone()));
        }
        lines
    }

    async fn write(&self, ctx: &RunContext, path: &str) -> OperationOutcome {
        let start = Instant::now();
        let mut outcome = OperationOutcome::new(S3_WRITE, path, ctx.since_start(start));

        let payload = ctx.payload().clone();
        let len = payload.len() as u64;
        let result = self
            .client
            .put_object()
            .bucket(self.bucket())
            .key(path)
            .content_length(len as i64)
            .body(ByteStream::from(payload))
            .send()
            .await;

        outcome.duration = start.elapsed();
        match result {
            Ok(_) => {
                outcome.bytes = len;
                outcome.succeeded = true;
            }
            Err(e) => warn!("failed to upload {}: {}", path, DisplayErrorContext(&e)),
        }
        outcome
    }

    async fn read(&self, ctx: &RunContext, path: &str) -> OperationOutcome {
        let start = Instant::now();
        let mut outcome = OperationOutcome::new(S3_READ, path, ctx.since_start(start));

        let resp = match self
            .client
            .get_object()
            .bucket(self.bucket())
            .key(path)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                warn!("failed to download {}: {}", path, DisplayErrorContext(&e));
                outcome.duration = start.elapsed();
                return outcome;
            }
        };

        let reported = resp.content_length();
        let mut body = resp.body;
        loop {
            match body.next().await {
                Some(Ok(chunk)) => {
                    if chunk.is_empty() {
                        continue;
                    }
                    if outcome.first_block.is_none() {
                        outcome.first_block = Some(start.elapsed());
                    }
                    outcome.bytes += chunk.len() as u64;
                }
                Some(Err(e)) => {
                    warn!("download of {} failed after {} bytes: {}", path, outcome.bytes, e);
                    outcome.duration = start.elapsed();
                    return outcome;
                }
                None => break,
            }
        }
        outcome.duration = start.elapsed();

        // A length mismatch is only reported; the transfer itself completed
        if let Some(reported) = reported {
            if reported as u64 != outcome.bytes {
                warn!(
                    "byte count mismatch for {}: content-length={} counted={}",
                    path, reported, outcome.bytes
                );
            }
        }
        outcome.succeeded = true;
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offline_describe() {
        let opts = S3Options::from_url(
            "s3://bkt/data/",
            None,
            Some("http://localhost:9000".to_string()),
        )
        .unwrap();
        let backend = S3Backend::offline(opts);
        assert_eq!(backend.kind(), BackendKind::S3);

        let lines = backend.describe();
        assert!(lines.contains(&("S3Bucket", "bkt".to_string())));
        assert!(lines.contains(&("S3Prefix", "data".to_string())));
        assert!(lines.contains(&("Region", "auto".to_string())));
        assert!(lines.contains(&("EndpointUrl", "http://localhost:9000".to_string())));
    }

    #[test]
    fn test_offline_keeps_explicit_region() {
        let opts = S3Options::from_url("s3://bkt/", Some("eu-west-1".to_string()), None).unwrap();
        let lines = S3Backend::offline(opts).describe();
        assert!(lines.contains(&("Region", "eu-west-1".to_string())));
        assert!(!lines.iter().any(|(key, _)| *key == "EndpointUrl"));
    }
}
