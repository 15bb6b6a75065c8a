//! End-to-end ingestion run
//!
//! index URL → index document → download link → archive → XML payload → CSV → bucket

use crate::config::{IngestConfig, DEFAULT_INDEX_FILE_NAME};
use crate::extractor::{extract_archive, ExtractError};
use crate::fetcher::{file_name_from_url, FetchError, Fetcher};
use crate::index::{IndexError, IndexResolver};
use crate::projection::{project_file, CsvRowSink, ProjectionError, TagSpec};
use crate::publisher::Publisher;
use firds_common::FirdsError;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{error, info, instrument, warn};

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] FirdsError),

    #[error("Failed to prepare scratch directory {}: {source}", path.display())]
    ScratchDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error("No {file_type} entry with a download link in index {url}")]
    NoMatchingEntry { file_type: String, url: String },

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    Projection(#[from] ProjectionError),

    #[error("CSV output error: {0}")]
    Csv(#[from] csv::Error),
}

/// What a completed run produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOutcome {
    pub csv_path: PathBuf,
    /// Data rows written (header excluded)
    pub rows: usize,
    /// `false` when publishing was disabled or the upload failed
    pub published: bool,
}

/// Runs the stages in order, each one feeding the next
pub struct Pipeline<P: Publisher> {
    config: IngestConfig,
    spec: TagSpec,
    resolver: IndexResolver,
    fetcher: Fetcher,
    publisher: P,
}

impl<P: Publisher> Pipeline<P> {
    pub fn new(config: IngestConfig, publisher: P) -> Result<Self> {
        config.validate()?;
        let spec = config.tag_spec()?;
        let resolver = IndexResolver::new(config.file_type.clone());
        let fetcher = Fetcher::new(config.request_timeout())?;

        Ok(Self {
            config,
            spec,
            resolver,
            fetcher,
            publisher,
        })
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    #[instrument(skip(self))]
    pub async fn run(&self, index_url: &str) -> Result<PipelineOutcome> {
        let started = Instant::now();
        let scratch = self.config.scratch_dir.as_path();

        tokio::fs::create_dir_all(scratch)
            .await
            .map_err(|source| PipelineError::ScratchDir {
                path: scratch.to_path_buf(),
                source,
            })?;

        info!(url = %index_url, "Downloading index document");
        let index_path = self
            .fetcher
            .download(index_url, scratch, DEFAULT_INDEX_FILE_NAME)
            .await?;

        let entry = self.resolver.resolve_file(&index_path)?.ok_or_else(|| {
            error!(url = %index_url, file_type = %self.config.file_type, "No matching index entry");
            PipelineError::NoMatchingEntry {
                file_type: self.config.file_type.clone(),
                url: index_url.to_string(),
            }
        })?;
        info!(
            link = %entry.download_link,
            file_name = ?entry.file_name,
            checksum = ?entry.checksum,
            published_at = ?entry.publication_date,
            "Resolved archive"
        );

        let archive_name = file_name_from_url(&entry.download_link)
            .or_else(|| entry.file_name.clone())
            .unwrap_or_else(|| format!("{}.zip", self.config.file_type));
        let archive_path = self
            .fetcher
            .download(&entry.download_link, scratch, &archive_name)
            .await?;

        let payload_name = extract_archive(&archive_path, scratch)?;
        let payload_path = scratch.join(&payload_name);
        let csv_path = csv_path_for(scratch, &payload_name, &self.config.file_type);

        let stats = {
            let mut sink = CsvRowSink::create(&csv_path)?;
            sink.write_header(&self.spec)?;
            let stats = project_file(&payload_path, &self.spec, &mut sink, self.config.max_rows)?;
            sink.flush().map_err(csv::Error::from)?;
            stats
        };
        info!(
            csv = %csv_path.display(),
            rows = stats.rows,
            capped = stats.capped,
            "CSV written"
        );

        let published = if self.config.publish {
            let published = self.publisher.publish(&csv_path, &self.config.bucket).await;
            if !published {
                warn!(bucket = %self.config.bucket, csv = %csv_path.display(), "CSV was not published");
            }
            published
        } else {
            info!("Publishing disabled, keeping CSV locally");
            false
        };

        info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            rows = stats.rows,
            published,
            "Pipeline finished"
        );

        Ok(PipelineOutcome {
            csv_path,
            rows: stats.rows,
            published,
        })
    }
}

/// `<scratch>/<payload stem>.csv`
fn csv_path_for(scratch: &Path, payload_name: &str, fallback_stem: &str) -> PathBuf {
    let stem = Path::new(payload_name)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .filter(|stem| !stem.is_empty())
        .unwrap_or_else(|| fallback_stem.to_string());
    scratch.join(format!("{stem}.csv"))
}
