//! Size-based rotating log file writer
//!
//! `tracing-appender` only rolls files on a time schedule. The ingest job
//! rotates on size instead: once `main.log` would grow past `max_bytes`, it is
//! renamed to `main.log.1` (shifting older backups up by one) and a fresh file
//! is started. At most `max_backups` rotated files are kept.
//!
//! The writer is meant to sit behind [`tracing_appender::non_blocking`], which
//! hands it one formatted event per `write` call, so rotation always happens
//! on a line boundary.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// A `Write` implementation that rotates its target file by size
#[derive(Debug)]
pub struct RotatingFileWriter {
    path: PathBuf,
    max_bytes: u64,
    max_backups: usize,
    file: Option<File>,
    written: u64,
}

impl RotatingFileWriter {
    /// Open (or create) `dir/file_name` in append mode
    ///
    /// A `max_bytes` of zero disables rotation.
    pub fn new(
        dir: impl AsRef<Path>,
        file_name: &str,
        max_bytes: u64,
        max_backups: usize,
    ) -> io::Result<Self> {
        fs::create_dir_all(dir.as_ref())?;
        let path = dir.as_ref().join(file_name);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let written = file.metadata()?.len();

        Ok(Self {
            path,
            max_bytes,
            max_backups,
            file: Some(file),
            written,
        })
    }

    /// Path of the active log file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn backup_path(&self, index: usize) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(format!(".{}", index));
        PathBuf::from(name)
    }

    fn rotate(&mut self) -> io::Result<()> {
        // Close the handle before renaming; required on Windows.
        self.file.take();

        if self.max_backups > 0 {
            let oldest = self.backup_path(self.max_backups);
            if oldest.exists() {
                fs::remove_file(&oldest)?;
            }
            for index in (1..self.max_backups).rev() {
                let src = self.backup_path(index);
                if src.exists() {
                    fs::rename(&src, self.backup_path(index + 1))?;
                }
            }
            if self.path.exists() {
                fs::rename(&self.path, self.backup_path(1))?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.path)?;
        self.file = Some(file);
        self.written = 0;
        Ok(())
    }

    fn needs_rotation(&self, incoming: usize) -> bool {
        self.max_bytes > 0 && self.written > 0 && self.written + incoming as u64 > self.max_bytes
    }
}

impl Write for RotatingFileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.needs_rotation(buf.len()) {
            self.rotate()?;
        }

        if self.file.is_none() {
            // A previous rotation failed half-way; reopen and keep logging.
            let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
            self.written = file.metadata()?.len();
            self.file = Some(file);
        }

        let n = match self.file.as_mut() {
            Some(file) => file.write(buf)?,
            None => return Err(io::Error::other("log file is not open")),
        };
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}
