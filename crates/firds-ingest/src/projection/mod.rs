//! Streaming XML-to-tabular projection
//!
//! Converts a large, nested, namespaced XML document into flat rows without
//! building a tree. Columns are declared with a [`TagSpec`]: each key is a bare
//! tag name (`Issr`) or a one-level path (`FinInstrmGnlAttrbts.Id`).
//!
//! The engine walks the document as enter/exit events, keeping only the
//! ancestor stack ([`ElementContext`]) and the record being accumulated. When
//! the boundary element closes, the record is handed to a [`RowSink`] and
//! accumulation starts over from an empty [`RecordTemplate`].
//!
//! # Example
//!
//! ```no_run
//! use firds_ingest::projection::{project_file, CsvRowSink, TagSpec};
//! use std::path::Path;
//!
//! fn main() -> anyhow::Result<()> {
//!     let spec = TagSpec::firds_default();
//!     let mut sink = CsvRowSink::create(Path::new("tmp/DLTINS.csv"))?;
//!     sink.write_header(&spec)?;
//!     let stats = project_file(Path::new("tmp/DLTINS.xml"), &spec, &mut sink, Some(100))?;
//!     sink.flush()?;
//!     println!("{} rows", stats.rows);
//!     Ok(())
//! }
//! ```

pub mod context;
pub mod engine;
pub mod record;
pub mod sink;
pub mod tag_spec;

pub use context::{strip_namespace, ElementContext};
pub use engine::{project_file, ProjectionStats, Projector};
pub use record::{RecordTemplate, Row};
pub use sink::{CsvRowSink, RowSink};
pub use tag_spec::{TagSpec, DEFAULT_TAGS};

/// Result type for projection operations
pub type Result<T> = std::result::Result<T, ProjectionError>;

/// Error types for the projection engine
#[derive(Debug, thiserror::Error)]
pub enum ProjectionError {
    #[error("XML error at byte {position}: {source}")]
    Xml {
        position: u64,
        #[source]
        source: quick_xml::Error,
    },

    #[error("Malformed XML: {0}")]
    Parse(String),

    #[error("Invalid tag spec: {0}")]
    InvalidTagSpec(String),

    #[error("Row sink error: {0}")]
    Sink(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
