//! Metadata sidecar persistence.
//!
//! Writes go to a temporary file in the destination directory which is
//! then renamed over the destination, so readers never observe a partially
//! written sidecar.

use crate::codec::{from_xml_str, to_xml_string, SerializationError};
use crate::records::MetadataTreeAsset;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Errors raised while reading or writing a sidecar file.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Reading the file failed.
    #[error("failed to read {}: {source}", path.display())]
    Read {
        /// File being read
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },
    /// Writing the file failed.
    #[error("failed to write {}: {source}", path.display())]
    Write {
        /// File being written
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },
    /// The file contents could not be converted.
    #[error("invalid metadata in {}: {source}", path.display())]
    Serialization {
        /// File being converted
        path: PathBuf,
        /// Underlying error
        source: SerializationError,
    },
}

/// Load the metadata tree stored at `path`.
///
/// # Errors
///
/// Returns an error if the file cannot be read or does not hold a valid
/// metadata tree.
pub fn load_metadata(path: &Path) -> Result<MetadataTreeAsset, StoreError> {
    let xml = std::fs::read_to_string(path).map_err(|source| StoreError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let tree = from_xml_str(&xml).map_err(|source| StoreError::Serialization {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::debug!(path = %path.display(), task_layers = tree.task_layers.len(), "Loaded metadata");
    Ok(tree)
}

/// Atomically replace the file at `path` with `tree`.
///
/// # Errors
///
/// Returns an error if the tree cannot be rendered or the file cannot be
/// written.
pub fn write_metadata(path: &Path, tree: &MetadataTreeAsset) -> Result<(), StoreError> {
    let xml = to_xml_string(tree).map_err(|source| StoreError::Serialization {
        path: path.to_path_buf(),
        source,
    })?;
    let write_error = |source: std::io::Error| StoreError::Write {
        path: path.to_path_buf(),
        source,
    };

    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut file = NamedTempFile::new_in(directory).map_err(write_error)?;
    file.write_all(xml.as_bytes()).map_err(write_error)?;
    file.as_file().sync_all().map_err(write_error)?;
    file.persist(path).map_err(|e| write_error(e.error))?;

    tracing::info!(path = %path.display(), version = %tree.asset.version, "Wrote metadata");
    Ok(())
}
