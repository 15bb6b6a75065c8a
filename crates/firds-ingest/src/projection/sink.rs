//! Row sinks: where projected rows go

use super::record::Row;
use super::tag_spec::TagSpec;
use std::convert::Infallible;
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

/// Accepts one finished row at a time
///
/// Write failures are returned to the engine, which aborts the run with
/// [`ProjectionError::Sink`](super::ProjectionError::Sink). Nothing is retried.
pub trait RowSink {
    type Error: std::error::Error + Send + Sync + 'static;

    fn write_row(&mut self, row: Row) -> Result<(), Self::Error>;
}

/// Collects rows in memory
impl RowSink for Vec<Row> {
    type Error = Infallible;

    fn write_row(&mut self, row: Row) -> Result<(), Self::Error> {
        self.push(row);
        Ok(())
    }
}

/// Comma-delimited UTF-8 output through the `csv` crate
pub struct CsvRowSink<W: Write> {
    writer: csv::Writer<W>,
    rows: usize,
}

impl CsvRowSink<File> {
    /// Create (or truncate) a CSV file
    pub fn create(path: &Path) -> Result<Self, csv::Error> {
        let writer = csv::WriterBuilder::new().delimiter(b',').from_path(path)?;
        Ok(Self { writer, rows: 0 })
    }
}

impl<W: Write> CsvRowSink<W> {
    pub fn new(inner: W) -> Self {
        Self {
            writer: csv::WriterBuilder::new().delimiter(b',').from_writer(inner),
            rows: 0,
        }
    }

    /// Write the header line: the tag keys in column order
    pub fn write_header(&mut self, spec: &TagSpec) -> Result<(), csv::Error> {
        self.writer.write_record(spec.keys())
    }

    /// Data rows written so far (header excluded)
    pub fn rows_written(&self) -> usize {
        self.rows
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }

    /// Flush and return the underlying writer
    pub fn into_inner(self) -> io::Result<W> {
        self.writer.into_inner().map_err(|e| e.into_error())
    }
}

impl<W: Write> RowSink for CsvRowSink<W> {
    type Error = csv::Error;

    fn write_row(&mut self, row: Row) -> Result<(), Self::Error> {
        self.writer.write_record(row.values())?;
        self.rows += 1;
        Ok(())
    }
}
