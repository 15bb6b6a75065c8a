//! Ingestion configuration
//!
//! Values come from defaults, then the environment (a `.env` file is loaded
//! first when present), then command-line flags applied through the builder.

use crate::index::DEFAULT_FILE_TYPE;
use crate::projection::{ProjectionError, TagSpec, DEFAULT_TAGS};
use firds_common::{FirdsError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

// ============================================================================
// Ingestion Defaults
// ============================================================================

/// Working directory for downloaded and generated files.
pub const DEFAULT_SCRATCH_DIR: &str = "tmp";

/// File name used for the index document when the server suggests none.
pub const DEFAULT_INDEX_FILE_NAME: &str = "index.xml";

/// Destination bucket for the generated CSV.
pub const DEFAULT_BUCKET: &str = "firds-dltins";

/// Region used when neither `S3_REGION` nor `AWS_REGION` is set.
pub const DEFAULT_S3_REGION: &str = "us-east-1";

/// Pipeline settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Scratch directory for the index, archive, payload and CSV
    pub scratch_dir: PathBuf,
    /// Index `file_type` code to download
    pub file_type: String,
    /// Tag specification keys, in column order
    pub tags: Vec<String>,
    /// Stop after this many rows
    pub max_rows: Option<usize>,
    pub bucket: String,
    /// Upload the CSV when the run completes
    pub publish: bool,
    /// Per-request timeout; `None` waits indefinitely
    pub request_timeout_secs: Option<u64>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            scratch_dir: PathBuf::from(DEFAULT_SCRATCH_DIR),
            file_type: DEFAULT_FILE_TYPE.to_string(),
            tags: DEFAULT_TAGS.iter().map(|tag| tag.to_string()).collect(),
            max_rows: None,
            bucket: DEFAULT_BUCKET.to_string(),
            publish: true,
            request_timeout_secs: None,
        }
    }
}

impl IngestConfig {
    /// Load configuration from the environment
    ///
    /// # Environment Variables
    /// - `FIRDS_SCRATCH_DIR`: scratch directory (default `tmp`)
    /// - `FIRDS_FILE_TYPE`: index file type code (default `DLTINS`)
    /// - `FIRDS_TAGS`: comma-separated tag specification
    /// - `FIRDS_MAX_ROWS`: row cap
    /// - `FIRDS_BUCKET`: destination bucket (default `firds-dltins`)
    /// - `FIRDS_PUBLISH`: upload the result (true/false)
    /// - `FIRDS_REQUEST_TIMEOUT_SECS`: HTTP request timeout
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::default().merge_env()
    }

    /// Overlay environment variables on top of an existing configuration
    pub fn merge_env(mut self) -> Result<Self> {
        if let Ok(dir) = std::env::var("FIRDS_SCRATCH_DIR") {
            self.scratch_dir = PathBuf::from(dir);
        }

        if let Ok(file_type) = std::env::var("FIRDS_FILE_TYPE") {
            self.file_type = file_type;
        }

        if let Ok(tags) = std::env::var("FIRDS_TAGS") {
            self.tags = split_tags(&tags);
        }

        if let Some(max_rows) = parse_var("FIRDS_MAX_ROWS")? {
            self.max_rows = Some(max_rows);
        }

        if let Ok(bucket) = std::env::var("FIRDS_BUCKET") {
            self.bucket = bucket;
        }

        if let Ok(val) = std::env::var("FIRDS_PUBLISH") {
            self.publish = parse_bool("FIRDS_PUBLISH", &val)?;
        }

        if let Some(secs) = parse_var("FIRDS_REQUEST_TIMEOUT_SECS")? {
            self.request_timeout_secs = Some(secs);
        }

        Ok(self)
    }

    pub fn builder() -> IngestConfigBuilder {
        IngestConfigBuilder::default()
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.file_type.trim().is_empty() {
            return Err(FirdsError::Config("File type cannot be empty".to_string()));
        }

        validate_bucket_name(&self.bucket)?;

        if self.request_timeout_secs == Some(0) {
            return Err(FirdsError::Config(
                "Request timeout must be greater than 0".to_string(),
            ));
        }

        self.tag_spec()
            .map_err(|e| FirdsError::Config(e.to_string()))?;

        Ok(())
    }

    /// Build the tag specification from the configured keys
    pub fn tag_spec(&self) -> std::result::Result<TagSpec, ProjectionError> {
        TagSpec::new(self.tags.iter().map(String::as_str))
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

/// Fluent overrides on top of a base configuration
#[derive(Debug, Default)]
pub struct IngestConfigBuilder {
    config: IngestConfig,
}

impl IngestConfigBuilder {
    /// Start from an existing configuration instead of the defaults
    pub fn from_config(config: IngestConfig) -> Self {
        Self { config }
    }

    pub fn scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.scratch_dir = dir.into();
        self
    }

    pub fn file_type(mut self, file_type: impl Into<String>) -> Self {
        self.config.file_type = file_type.into();
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn max_rows(mut self, max_rows: Option<usize>) -> Self {
        self.config.max_rows = max_rows;
        self
    }

    pub fn bucket(mut self, bucket: impl Into<String>) -> Self {
        self.config.bucket = bucket.into();
        self
    }

    pub fn publish(mut self, publish: bool) -> Self {
        self.config.publish = publish;
        self
    }

    pub fn request_timeout_secs(mut self, secs: Option<u64>) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    pub fn build(self) -> IngestConfig {
        self.config
    }
}

/// S3 connection settings
///
/// Static keys are optional; without them the default AWS provider chain
/// supplies credentials.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublisherConfig {
    /// Custom endpoint, e.g. a MinIO server
    pub endpoint: Option<String>,
    pub region: String,
    pub path_style: bool,
    #[serde(skip_serializing)]
    pub access_key: Option<String>,
    #[serde(skip_serializing)]
    pub secret_key: Option<String>,
}

impl std::fmt::Debug for PublisherConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublisherConfig")
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .field("path_style", &self.path_style)
            .field("access_key", &self.access_key.as_ref().map(|_| "<redacted>"))
            .field("secret_key", &self.secret_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            region: DEFAULT_S3_REGION.to_string(),
            path_style: false,
            access_key: None,
            secret_key: None,
        }
    }
}

impl PublisherConfig {
    /// Load S3 settings from the environment
    ///
    /// # Environment Variables
    /// - `S3_ENDPOINT`: custom endpoint URL
    /// - `S3_REGION`, falling back to `AWS_REGION` (default `us-east-1`)
    /// - `S3_PATH_STYLE`: path-style addressing (true/false)
    /// - `S3_ACCESS_KEY` / `S3_SECRET_KEY`: static credentials
    pub fn from_env() -> Result<Self> {
        let path_style = match std::env::var("S3_PATH_STYLE") {
            Ok(val) => parse_bool("S3_PATH_STYLE", &val)?,
            Err(_) => false,
        };

        Ok(Self {
            endpoint: std::env::var("S3_ENDPOINT").ok().filter(|v| !v.is_empty()),
            region: std::env::var("S3_REGION")
                .or_else(|_| std::env::var("AWS_REGION"))
                .unwrap_or_else(|_| DEFAULT_S3_REGION.to_string()),
            path_style,
            access_key: std::env::var("S3_ACCESS_KEY").ok(),
            secret_key: std::env::var("S3_SECRET_KEY").ok(),
        })
    }

    /// Path-style settings for an S3-compatible server such as MinIO
    pub fn for_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: Some(endpoint.into()),
            path_style: true,
            ..Self::default()
        }
    }

    pub fn with_static_credentials(
        mut self,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        self.access_key = Some(access_key.into());
        self.secret_key = Some(secret_key.into());
        self
    }
}

/// Split a comma-separated tag list, dropping blank entries
pub fn split_tags(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_var<T: FromStr>(key: &str) -> Result<Option<T>> {
    match std::env::var(key) {
        Ok(val) => val
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| FirdsError::InvalidValue {
                key: key.to_string(),
                value: val,
            }),
        Err(_) => Ok(None),
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(FirdsError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

// Bucket naming rules shared by S3 and MinIO
fn validate_bucket_name(bucket: &str) -> Result<()> {
    let valid_chars = bucket
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.');
    let valid_edges = bucket
        .chars()
        .next()
        .zip(bucket.chars().last())
        .is_some_and(|(first, last)| first.is_ascii_alphanumeric() && last.is_ascii_alphanumeric());

    if (3..=63).contains(&bucket.len()) && valid_chars && valid_edges {
        Ok(())
    } else {
        Err(FirdsError::InvalidValue {
            key: "bucket".to_string(),
            value: bucket.to_string(),
        })
    }
}
