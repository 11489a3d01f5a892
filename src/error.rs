//! Error types for index building and serving

use std::path::PathBuf;
use thiserror::Error;

/// Result type for index operations
pub type Result<T> = std::result::Result<T, IndexError>;

/// Errors surfaced by the index store, builder and cache manager
#[derive(Error, Debug)]
pub enum IndexError {
    /// Neither a persisted index nor a caption source exists for the key
    #[error("Caption source not found for video={video_id} lang={lang}")]
    SourceMissing { video_id: String, lang: String },

    /// A read or write against the storage root failed
    #[error("Storage failure at {}: {source}", .path.display())]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A persisted index exists but does not decode
    #[error("Corrupt index file {}: {source}", .path.display())]
    CorruptIndex {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A manifest exists but is not a valid manifest document
    #[error("Invalid manifest {}: {source}", .path.display())]
    Manifest {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A video id or language code that cannot be used as a path component
    #[error("Invalid index key: {0}")]
    InvalidKey(String),

    /// The background load/build task panicked or was aborted
    #[error("Index task failed: {0}")]
    Task(String),
}

impl IndexError {
    pub(crate) fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        IndexError::Storage {
            path: path.into(),
            source,
        }
    }

    /// True when the error means "no captions for this key" rather than a fault
    pub fn is_source_missing(&self) -> bool {
        matches!(self, IndexError::SourceMissing { .. })
    }
}
