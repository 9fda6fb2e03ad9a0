//! Reading and writing scene documents.

use asset_pipeline_core::Document;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// File extension of JSON scene documents.
pub const JSON_EXTENSION: &str = "json";

/// Errors raised by a document provider.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The file could not be read or written.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// Document file
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },
    /// The file is not a valid document.
    #[error("invalid document {}: {source}", path.display())]
    Format {
        /// Document file
        path: PathBuf,
        /// Underlying error
        source: serde_json::Error,
    },
}

/// Access to on-disk scene documents.
pub trait DocumentProvider {
    /// File extension of the documents this provider handles.
    fn extension(&self) -> &str;

    /// Load the document at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be read or decoded.
    fn load(&self, path: &Path) -> Result<Document, ProviderError>;

    /// Replace the document at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be encoded or written.
    fn save(&self, path: &Path, document: &Document) -> Result<(), ProviderError>;
}

/// Stores documents as pretty-printed JSON, written atomically.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonDocumentProvider;

impl DocumentProvider for JsonDocumentProvider {
    fn extension(&self) -> &str {
        JSON_EXTENSION
    }

    fn load(&self, path: &Path) -> Result<Document, ProviderError> {
        let json = std::fs::read_to_string(path).map_err(|source| ProviderError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&json).map_err(|source| ProviderError::Format {
            path: path.to_path_buf(),
            source,
        })
    }

    fn save(&self, path: &Path, document: &Document) -> Result<(), ProviderError> {
        let json = serde_json::to_string_pretty(document).map_err(|source| ProviderError::Format {
            path: path.to_path_buf(),
            source,
        })?;
        let io_error = |source: std::io::Error| ProviderError::Io {
            path: path.to_path_buf(),
            source,
        };

        let directory = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(directory).map_err(io_error)?;
        let mut file = NamedTempFile::new_in(directory).map_err(io_error)?;
        file.write_all(json.as_bytes()).map_err(io_error)?;
        file.as_file().sync_all().map_err(io_error)?;
        file.persist(path).map_err(|e| io_error(e.error))?;

        tracing::info!(path = %path.display(), "Saved document");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use asset_pipeline_core::EntityKind;

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("publish").join("einar.v001.json");
        let mut document = Document::new("Scene");
        let root = document.add_group("einar");
        document.link_child(document.scene(), root).unwrap();
        let body = document.add_entity("GEO-body", EntityKind::Mesh);
        document.link_entity(root, body).unwrap();

        JsonDocumentProvider.save(&path, &document).unwrap();

        assert_eq!(JsonDocumentProvider.load(&path).unwrap(), document);
    }

    #[test]
    fn test_load_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "[1, 2]").unwrap();

        assert!(matches!(
            JsonDocumentProvider.load(&path),
            Err(ProviderError::Format { .. })
        ));
        assert!(matches!(
            JsonDocumentProvider.load(&dir.path().join("missing.json")),
            Err(ProviderError::Io { .. })
        ));
    }
}
