//! Speech Index - keyword search over video transcripts
//!
//! Builds per-video, per-language word → timestamp indexes from WebVTT
//! captions, persists them next to the captions, and serves them from an
//! in-memory cache that loads or builds each index at most once.

pub mod captions;
pub mod config;
pub mod error;
pub mod index;
pub mod manifest;

// Re-export main types for easy access
pub use crate::captions::{normalize, Cue, VttGenerator};
pub use crate::config::{Config, ConfigBuilder, ConfigSource};
pub use crate::error::{IndexError, Result};
pub use crate::index::{
    build_index, CacheStats, IndexBuilder, IndexKey, IndexStore, PrefetchReport, SearchIndex,
    SearchIndexManager,
};
pub use crate::manifest::Manifest;
