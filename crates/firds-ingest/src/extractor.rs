//! Zip archive extraction

use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};
use zip::result::ZipError;
use zip::ZipArchive;

pub type Result<T> = std::result::Result<T, ExtractError>;

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("Archive {} contains no entries", path.display())]
    EmptyArchive { path: PathBuf },

    #[error("Failed to read archive {}: {source}", path.display())]
    Zip {
        path: PathBuf,
        #[source]
        source: ZipError,
    },

    #[error("Failed to open archive {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Extract every entry of `archive_path` into `dest_dir`
///
/// Returns the name of the first entry, which is taken to be the payload.
/// Entry names that would escape `dest_dir` are rejected by the zip reader.
pub fn extract_archive(archive_path: &Path, dest_dir: &Path) -> Result<String> {
    let zip_error = |source: ZipError| {
        error!(archive = %archive_path.display(), error = %source, "Archive could not be read");
        ExtractError::Zip {
            path: archive_path.to_path_buf(),
            source,
        }
    };

    let file = File::open(archive_path).map_err(|source| ExtractError::Io {
        path: archive_path.to_path_buf(),
        source,
    })?;
    let mut archive = ZipArchive::new(file).map_err(zip_error)?;

    if archive.is_empty() {
        error!(archive = %archive_path.display(), "Archive is empty");
        return Err(ExtractError::EmptyArchive {
            path: archive_path.to_path_buf(),
        });
    }

    let first = archive.by_index(0).map_err(zip_error)?.name().to_string();
    debug!(archive = %archive_path.display(), entries = archive.len(), "Extracting archive");

    archive.extract(dest_dir).map_err(zip_error)?;

    info!(
        archive = %archive_path.display(),
        dest = %dest_dir.display(),
        entry = %first,
        "Extracted archive"
    );
    Ok(first)
}
