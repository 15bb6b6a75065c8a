//! FIRDS Ingest Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Turns the ESMA FIRDS reference data register into a flat CSV table.
//!
//! # Stages
//!
//! - **Fetcher**: HTTP download into a scratch directory
//! - **Index**: finds the archive link for a file type in the register
//! - **Extractor**: unpacks the zip archive
//! - **Projection**: streams the XML payload into CSV rows
//! - **Publisher**: uploads the CSV to S3
//!
//! [`pipeline::Pipeline`] runs them in sequence.
//!
//! # Example
//!
//! ```no_run
//! use firds_ingest::config::{IngestConfig, PublisherConfig};
//! use firds_ingest::pipeline::Pipeline;
//! use firds_ingest::publisher::S3Publisher;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = IngestConfig::from_env()?;
//!     let publisher = S3Publisher::new(PublisherConfig::from_env()?).await;
//!     let outcome = Pipeline::new(config, publisher)?
//!         .run("https://registers.esma.europa.eu/solr/esma_registers_firds_files/select?q=*")
//!         .await?;
//!     println!("{} rows in {}", outcome.rows, outcome.csv_path.display());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod extractor;
pub mod fetcher;
pub mod index;
pub mod pipeline;
pub mod projection;
pub mod publisher;

pub use config::{IngestConfig, PublisherConfig};
pub use index::{IndexEntry, IndexResolver};
pub use pipeline::{Pipeline, PipelineError, PipelineOutcome};
pub use projection::TagSpec;
pub use publisher::{Publisher, S3Publisher};
