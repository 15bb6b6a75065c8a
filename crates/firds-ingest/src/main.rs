//! FIRDS Ingest - reference data ingestion tool

use anyhow::{Context, Result};
use clap::Parser;
use firds_common::logging::{init_logging, LogConfig, LogLevel};
use firds_ingest::config::{split_tags, IngestConfig, IngestConfigBuilder, PublisherConfig};
use firds_ingest::pipeline::Pipeline;
use firds_ingest::publisher::S3Publisher;
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "firds-ingest")]
#[command(author, version, about = "Convert the latest FIRDS reference data file to CSV and publish it")]
struct Cli {
    /// URL of the FIRDS file index (Solr search response)
    #[arg(env = "FIRDS_INDEX_URL")]
    index_url: String,

    /// Directory for downloaded and generated files
    #[arg(long)]
    scratch_dir: Option<PathBuf>,

    /// Directory for log files
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Destination bucket
    #[arg(long)]
    bucket: Option<String>,

    /// Index file type to download
    #[arg(long)]
    file_type: Option<String>,

    /// Comma-separated tag specification, e.g. "FinInstrmGnlAttrbts.Id,Issr"
    #[arg(long)]
    tags: Option<String>,

    /// Stop after this many rows
    #[arg(long)]
    max_rows: Option<usize>,

    /// Keep the CSV locally instead of uploading it
    #[arg(long)]
    no_publish: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    /// Apply command-line overrides on top of the environment configuration
    fn ingest_config(&self, base: IngestConfig) -> IngestConfig {
        let mut builder = IngestConfigBuilder::from_config(base);

        if let Some(dir) = &self.scratch_dir {
            builder = builder.scratch_dir(dir);
        }
        if let Some(bucket) = &self.bucket {
            builder = builder.bucket(bucket);
        }
        if let Some(file_type) = &self.file_type {
            builder = builder.file_type(file_type);
        }
        if let Some(tags) = &self.tags {
            builder = builder.tags(split_tags(tags));
        }
        if self.max_rows.is_some() {
            builder = builder.max_rows(self.max_rows);
        }
        if self.no_publish {
            builder = builder.publish(false);
        }

        builder.build()
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env first so clap's `env` fallbacks can see it
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut log_config = LogConfig::from_env()?;
    if cli.verbose {
        log_config.level = LogLevel::Debug;
        log_config.console_level = LogLevel::Debug;
    }
    if let Some(dir) = &cli.log_dir {
        log_config.log_dir = dir.clone();
    }
    let _guard = init_logging(&log_config)?;

    let config = cli.ingest_config(IngestConfig::from_env()?);
    info!(
        scratch_dir = %config.scratch_dir.display(),
        file_type = %config.file_type,
        bucket = %config.bucket,
        max_rows = ?config.max_rows,
        "Starting ingestion"
    );

    let publisher = S3Publisher::new(PublisherConfig::from_env()?).await;
    let pipeline = Pipeline::new(config, publisher).context("Invalid ingestion configuration")?;

    match pipeline.run(&cli.index_url).await {
        Ok(outcome) => {
            info!(
                csv = %outcome.csv_path.display(),
                rows = outcome.rows,
                published = outcome.published,
                "Ingestion complete"
            );
            Ok(())
        },
        Err(e) => {
            error!(error = %e, "Ingestion failed");
            Err(e.into())
        },
    }
}
