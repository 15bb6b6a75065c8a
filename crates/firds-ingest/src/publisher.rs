//! Publishing the finished table to object storage

use crate::config::PublisherConfig;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::retry::RetryConfig;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration};
use aws_sdk_s3::Client;
use std::path::Path;
use tracing::{debug, error, info, instrument};

/// Uploads a local file to a named bucket
///
/// Failures are reported as `false`, never as an error: the table already
/// exists locally and the caller decides what an unpublished run means.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, file: &Path, bucket: &str) -> bool;
}

/// S3 (or S3-compatible) publisher
#[derive(Clone)]
pub struct S3Publisher {
    client: Client,
    region: String,
}

impl S3Publisher {
    pub async fn new(config: PublisherConfig) -> Self {
        debug!("Initializing S3 publisher with config: {:?}", config);

        let region = Region::new(config.region.clone());
        let mut builder = match (&config.access_key, &config.secret_key) {
            (Some(access_key), Some(secret_key)) => aws_sdk_s3::Config::builder()
                .credentials_provider(Credentials::new(
                    access_key,
                    secret_key,
                    None,
                    None,
                    "firds-ingest",
                ))
                .region(region),
            _ => {
                let shared = aws_config::defaults(BehaviorVersion::latest())
                    .region(region)
                    .load()
                    .await;
                aws_sdk_s3::config::Builder::from(&shared)
            },
        };

        builder = builder
            .force_path_style(config.path_style)
            .retry_config(RetryConfig::disabled());
        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        info!(region = %config.region, endpoint = ?config.endpoint, "S3 publisher initialized");

        Self {
            client: Client::from_conf(builder.build()),
            region: config.region,
        }
    }

    /// Wrap an already configured client
    pub fn from_client(client: Client, region: impl Into<String>) -> Self {
        Self {
            client,
            region: region.into(),
        }
    }

    /// Create the bucket unless it already exists
    #[instrument(skip(self))]
    async fn ensure_bucket(&self, bucket: &str) -> Result<()> {
        match self.client.head_bucket().bucket(bucket).send().await {
            Ok(_) => {
                debug!("Bucket {} exists", bucket);
                return Ok(());
            },
            Err(err) if err.as_service_error().is_some_and(|e| e.is_not_found()) => {
                info!("Bucket {} not found, creating it", bucket);
            },
            Err(err) => {
                return Err(err).context(format!("Failed to look up bucket {}", bucket));
            },
        }

        let mut request = self.client.create_bucket().bucket(bucket);
        // us-east-1 rejects an explicit location constraint
        if self.region != "us-east-1" {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(self.region.as_str()))
                    .build(),
            );
        }

        request
            .send()
            .await
            .context(format!("Failed to create bucket {}", bucket))?;

        info!("Created bucket {} in {}", bucket, self.region);
        Ok(())
    }

    #[instrument(skip(self))]
    async fn upload(&self, file: &Path, bucket: &str) -> Result<()> {
        let key = file
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| anyhow!("{} has no file name", file.display()))?;

        let body = ByteStream::from_path(file)
            .await
            .with_context(|| format!("Failed to read {}", file.display()))?;

        debug!("Uploading {} to s3://{}/{}", file.display(), bucket, key);

        self.client
            .put_object()
            .bucket(bucket)
            .key(&key)
            .content_type("text/csv")
            .body(body)
            .send()
            .await
            .context("Failed to upload to S3")?;

        info!("Successfully uploaded to s3://{}/{}", bucket, key);
        Ok(())
    }
}

#[async_trait]
impl Publisher for S3Publisher {
    async fn publish(&self, file: &Path, bucket: &str) -> bool {
        let result = async {
            self.ensure_bucket(bucket).await?;
            self.upload(file, bucket).await
        }
        .await;

        match result {
            Ok(()) => true,
            Err(e) => {
                error!(
                    bucket = %bucket,
                    path = %file.display(),
                    error = ?e,
                    "Publishing failed"
                );
                false
            },
        }
    }
}
