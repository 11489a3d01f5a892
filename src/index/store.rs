//! On-disk layout of caption sources, manifests and persisted indexes.
//!
//! Everything lives flat under one root directory:
//!
//! - `{video_id}.{lang}.vtt` caption source
//! - `{video_id}.{lang}.index.json` persisted index
//! - `{video_id}.manifest.json` manifest

use super::{validate_component, IndexKey, SearchIndex};
use crate::error::{IndexError, Result};
use crate::manifest::Manifest;
use serde::Serialize;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

const INDEX_SUFFIX: &str = ".index.json";
const MANIFEST_SUFFIX: &str = ".manifest.json";

/// A persisted index found under the root
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersistedIndexInfo {
    pub video_id: String,
    pub lang: String,
    pub path: PathBuf,
    pub size_bytes: u64,
}

/// File-system store rooted at one directory
#[derive(Debug, Clone)]
pub struct IndexStore {
    root: PathBuf,
}

impl IndexStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the root directory if needed
    pub async fn initialize(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| IndexError::storage(&self.root, e))?;
        debug!("Index store root ready: {}", self.root.display());
        Ok(())
    }

    pub fn caption_path(&self, key: &IndexKey) -> PathBuf {
        self.root.join(format!("{}.{}.vtt", key.video_id(), key.lang()))
    }

    pub fn index_path(&self, key: &IndexKey) -> PathBuf {
        self.root
            .join(format!("{}.{}{}", key.video_id(), key.lang(), INDEX_SUFFIX))
    }

    pub fn manifest_path(&self, video_id: &str) -> PathBuf {
        self.root.join(format!("{}{}", video_id, MANIFEST_SUFFIX))
    }

    /// Raw caption text, or `None` when there is no caption file
    pub async fn read_captions(&self, key: &IndexKey) -> Result<Option<String>> {
        read_optional(&self.caption_path(key)).await
    }

    /// Persisted index, or `None` when it has not been built yet
    pub async fn load_index(&self, key: &IndexKey) -> Result<Option<SearchIndex>> {
        let path = self.index_path(key);
        let Some(content) = read_optional(&path).await? else {
            return Ok(None);
        };

        match SearchIndex::from_json(&content) {
            Ok(index) => Ok(Some(index)),
            Err(source) => {
                warn!("Persisted index {} does not decode: {}", path.display(), source);
                Err(IndexError::CorruptIndex { path, source })
            }
        }
    }

    /// Persist an index; readers see either the old file or the complete new one
    pub async fn save_index(&self, key: &IndexKey, index: &SearchIndex) -> Result<()> {
        let path = self.index_path(key);
        let json = index.to_json().map_err(|source| IndexError::CorruptIndex {
            path: path.clone(),
            source,
        })?;

        self.write_atomic(path.clone(), json.into_bytes()).await?;
        info!("💾 Persisted index {} ({} words)", path.display(), index.len());
        Ok(())
    }

    /// Manifest for a video, or `None` when the video has none
    pub async fn read_manifest(&self, video_id: &str) -> Result<Option<Manifest>> {
        validate_component("video id", video_id)?;

        let path = self.manifest_path(video_id);
        let Some(content) = read_optional(&path).await? else {
            return Ok(None);
        };

        serde_json::from_str(&content)
            .map(Some)
            .map_err(|source| IndexError::Manifest { path, source })
    }

    /// Write a manifest for `video_id`
    pub async fn save_manifest(&self, video_id: &str, manifest: &Manifest) -> Result<()> {
        validate_component("video id", video_id)?;

        let path = self.manifest_path(video_id);
        let json = serde_json::to_string_pretty(manifest).map_err(|source| {
            IndexError::Manifest {
                path: path.clone(),
                source,
            }
        })?;

        self.write_atomic(path, json.into_bytes()).await
    }

    /// All persisted indexes under the root, sorted by video then language
    pub async fn list_indexes(&self) -> Result<Vec<PersistedIndexInfo>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let mut found = Vec::new();

        for entry in WalkDir::new(&self.root).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(self.root.as_path()).to_path_buf();
                IndexError::storage(path, e.into())
            })?;

            let Some(name) = entry.file_name().to_str() else {
                continue;
            };
            let Some((video_id, lang)) = name
                .strip_suffix(INDEX_SUFFIX)
                .and_then(|stem| stem.rsplit_once('.'))
            else {
                continue;
            };

            let size_bytes = entry.metadata().map(|m| m.len()).unwrap_or(0);
            found.push(PersistedIndexInfo {
                video_id: video_id.to_string(),
                lang: lang.to_string(),
                path: entry.path().to_path_buf(),
                size_bytes,
            });
        }

        found.sort_by(|a, b| (&a.video_id, &a.lang).cmp(&(&b.video_id, &b.lang)));
        Ok(found)
    }

    /// Write to a temporary file next to `path`, then rename over it
    async fn write_atomic(&self, path: PathBuf, contents: Vec<u8>) -> Result<()> {
        let dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.root.clone());

        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut tmp = tempfile::NamedTempFile::new_in(&dir)
                .map_err(|e| IndexError::storage(&dir, e))?;
            tmp.write_all(&contents)
                .and_then(|_| tmp.as_file().sync_all())
                .map_err(|e| IndexError::storage(tmp.path(), e))?;
            tmp.persist(&path)
                .map_err(|e| IndexError::storage(&path, e.error))?;
            Ok(())
        })
        .await
        .map_err(|e| IndexError::Task(e.to_string()))?
    }
}

async fn read_optional(path: &Path) -> Result<Option<String>> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(IndexError::storage(path, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn key(video_id: &str, lang: &str) -> IndexKey {
        IndexKey::new(video_id, lang).unwrap()
    }

    #[test]
    fn test_paths() {
        let store = IndexStore::new("/data/vtts");
        let k = key("abc123", "en");

        assert_eq!(store.caption_path(&k), PathBuf::from("/data/vtts/abc123.en.vtt"));
        assert_eq!(
            store.index_path(&k),
            PathBuf::from("/data/vtts/abc123.en.index.json")
        );
        assert_eq!(
            store.manifest_path("abc123"),
            PathBuf::from("/data/vtts/abc123.manifest.json")
        );
    }

    #[tokio::test]
    async fn test_missing_files_are_none() {
        let temp_dir = TempDir::new().unwrap();
        let store = IndexStore::new(temp_dir.path());
        let k = key("nothing", "en");

        assert!(store.read_captions(&k).await.unwrap().is_none());
        assert!(store.load_index(&k).await.unwrap().is_none());
        assert!(store.read_manifest("nothing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_and_load_index() {
        let temp_dir = TempDir::new().unwrap();
        let store = IndexStore::new(temp_dir.path());
        let k = key("vid", "en");

        let mut raw = BTreeMap::new();
        raw.insert("hello".to_string(), vec![1.0, 5.25]);
        let index = SearchIndex::from_occurrences(raw);

        store.save_index(&k, &index).await.unwrap();
        let loaded = store.load_index(&k).await.unwrap().unwrap();
        assert_eq!(loaded, index);

        // Only the final file remains; the temporary one was renamed away
        let names: Vec<_> = std::fs::read_dir(temp_dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("vid.en.index.json")]);
    }

    #[tokio::test]
    async fn test_corrupt_index_is_reported() {
        let temp_dir = TempDir::new().unwrap();
        let store = IndexStore::new(temp_dir.path());
        let k = key("vid", "en");

        tokio::fs::write(store.index_path(&k), b"{not json").await.unwrap();
        let err = store.load_index(&k).await.unwrap_err();
        assert!(matches!(err, IndexError::CorruptIndex { .. }));
    }

    #[tokio::test]
    async fn test_invalid_manifest_is_reported() {
        let temp_dir = TempDir::new().unwrap();
        let store = IndexStore::new(temp_dir.path());

        tokio::fs::write(store.manifest_path("vid"), b"[1, 2]").await.unwrap();
        let err = store.read_manifest("vid").await.unwrap_err();
        assert!(matches!(err, IndexError::Manifest { .. }));
    }

    #[tokio::test]
    async fn test_manifest_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let store = IndexStore::new(temp_dir.path());
        let manifest = Manifest::new("vid", vec!["en".to_string(), "ta".to_string()]);

        store.save_manifest("vid", &manifest).await.unwrap();
        assert_eq!(store.read_manifest("vid").await.unwrap(), Some(manifest));
    }

    #[tokio::test]
    async fn test_list_indexes() {
        let temp_dir = TempDir::new().unwrap();
        let store = IndexStore::new(temp_dir.path());

        for (video_id, lang) in [("b", "en"), ("a", "hi"), ("a", "en")] {
            store.save_index(&key(video_id, lang), &SearchIndex::default()).await.unwrap();
        }
        tokio::fs::write(temp_dir.path().join("a.en.vtt"), "WEBVTT\n").await.unwrap();

        let listed: Vec<(String, String)> = store
            .list_indexes()
            .await
            .unwrap()
            .into_iter()
            .map(|info| (info.video_id, info.lang))
            .collect();

        assert_eq!(
            listed,
            vec![
                ("a".to_string(), "en".to_string()),
                ("a".to_string(), "hi".to_string()),
                ("b".to_string(), "en".to_string()),
            ]
        );
    }
}
