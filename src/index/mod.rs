//! Word → timestamp search indexes: on-disk store, builder and cache manager
pub mod builder;
pub mod manager;
pub mod store;

pub use builder::{build_index, IndexBuilder};
pub use manager::{CacheStats, PrefetchReport, SearchIndexManager};
pub use store::{IndexStore, PersistedIndexInfo};

use crate::error::{IndexError, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Decimal places kept on indexed timestamps
pub const TIMESTAMP_DECIMALS: usize = 2;

/// Round a timestamp to [`TIMESTAMP_DECIMALS`] places.
///
/// Rounds the exact binary value, so `0.015` (stored just below) goes down
/// and `0.025` (stored just above) goes up. Exact ties go to even.
pub fn round_timestamp(seconds: f64) -> f64 {
    format!("{:.*}", TIMESTAMP_DECIMALS, seconds)
        .parse()
        .unwrap_or(seconds)
}

/// Identifies one index: a video and one of its caption languages
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IndexKey {
    video_id: String,
    lang: String,
}

impl IndexKey {
    /// Build a key; both parts end up in file names, so only
    /// `[A-Za-z0-9_-]` is accepted. Language codes are lower-cased.
    pub fn new(video_id: &str, lang: &str) -> Result<Self> {
        validate_component("video id", video_id)?;
        validate_component("language", lang)?;

        Ok(Self {
            video_id: video_id.to_string(),
            lang: lang.to_ascii_lowercase(),
        })
    }

    pub fn video_id(&self) -> &str {
        &self.video_id
    }

    pub fn lang(&self) -> &str {
        &self.lang
    }
}

impl fmt::Display for IndexKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.video_id, self.lang)
    }
}

pub(crate) fn validate_component(what: &str, value: &str) -> Result<()> {
    let valid = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

    if valid {
        Ok(())
    } else {
        Err(IndexError::InvalidKey(format!("{} {:?}", what, value)))
    }
}

/// Mapping from normalized word to the ascending, de-duplicated start times
/// of the cues it is spoken in.
///
/// Serializes as a plain JSON object with keys in sorted order, so the same
/// captions always persist to the same bytes.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct SearchIndex {
    words: BTreeMap<String, Vec<f64>>,
}

impl SearchIndex {
    /// Build from raw occurrences, enforcing the index invariants:
    /// rounded, sorted, unique timestamps and no empty keys or lists.
    pub fn from_occurrences(occurrences: BTreeMap<String, Vec<f64>>) -> Self {
        let words = occurrences
            .into_iter()
            .filter(|(word, _)| !word.is_empty())
            .filter_map(|(word, times)| {
                let mut times: Vec<f64> = times.into_iter().map(round_timestamp).collect();
                times.sort_by(f64::total_cmp);
                times.dedup();
                (!times.is_empty()).then_some((word, times))
            })
            .collect();

        Self { words }
    }

    /// Timestamps for an already-normalized word; empty when absent
    pub fn lookup(&self, word: &str) -> &[f64] {
        self.words.get(word).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, word: &str) -> bool {
        self.words.contains_key(word)
    }

    /// Number of distinct words
    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Words in sorted order
    pub fn words(&self) -> impl Iterator<Item = &str> {
        self.words.keys().map(String::as_str)
    }

    /// Total number of (word, timestamp) pairs
    pub fn occurrence_count(&self) -> usize {
        self.words.values().map(Vec::len).sum()
    }

    /// Persisted form
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Decode a persisted index, re-applying the invariants
    pub fn from_json(content: &str) -> serde_json::Result<Self> {
        serde_json::from_str(content)
    }
}

// Decoded maps go through `from_occurrences` so the invariants always hold
impl<'de> Deserialize<'de> for SearchIndex {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        BTreeMap::<String, Vec<f64>>::deserialize(deserializer).map(Self::from_occurrences)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_timestamp() {
        assert_eq!(round_timestamp(1.0), 1.0);
        assert_eq!(round_timestamp(5.254), 5.25);
        assert_eq!(round_timestamp(5.256), 5.26);
        assert_eq!(round_timestamp(1.125), 1.12);
        assert_eq!(round_timestamp(1.375), 1.38);
    }

    #[test]
    fn test_round_timestamp_uses_stored_value() {
        // 0.005 and 0.025 are stored slightly above, 0.015 slightly below
        assert_eq!(round_timestamp(0.005), 0.01);
        assert_eq!(round_timestamp(0.015), 0.01);
        assert_eq!(round_timestamp(0.025), 0.03);
        assert_eq!(round_timestamp(2.675), 2.67);
    }

    #[test]
    fn test_deserialize_enforces_invariants() {
        let index: SearchIndex =
            serde_json::from_str(r#"{"b": [2.0, 1.0, 1.004], "": [1.0], "e": []}"#).unwrap();

        assert_eq!(index.len(), 1);
        assert_eq!(index.lookup("b"), &[1.0, 2.0]);
        assert!(!index.contains("e"));
    }

    #[test]
    fn test_index_key_validation() {
        let key = IndexKey::new("3f2a9c1d", "EN").unwrap();
        assert_eq!(key.lang(), "en");
        assert_eq!(key.to_string(), "3f2a9c1d.en");

        assert!(IndexKey::new("", "en").is_err());
        assert!(IndexKey::new("abc", "").is_err());
        assert!(IndexKey::new("../etc", "en").is_err());
        assert!(IndexKey::new("abc", "en.index").is_err());
        assert!(IndexKey::new("a/b", "en").is_err());
    }

    #[test]
    fn test_from_occurrences_enforces_invariants() {
        let mut raw = BTreeMap::new();
        raw.insert("hello".to_string(), vec![5.25, 1.0, 1.001, 5.25]);
        raw.insert("".to_string(), vec![2.0]);
        raw.insert("empty".to_string(), vec![]);

        let index = SearchIndex::from_occurrences(raw);
        assert_eq!(index.len(), 1);
        assert_eq!(index.lookup("hello"), &[1.0, 5.25]);
        assert!(index.lookup("").is_empty());
        assert!(!index.contains("empty"));
    }

    #[test]
    fn test_json_round_trip() {
        let mut raw = BTreeMap::new();
        raw.insert("zeta".to_string(), vec![0.1, 0.2, 0.3]);
        raw.insert("alpha".to_string(), vec![3600.01]);
        raw.insert("नमस्ते".to_string(), vec![12.34]);
        let index = SearchIndex::from_occurrences(raw);

        let json = index.to_json().unwrap();
        assert!(json.find("alpha").unwrap() < json.find("zeta").unwrap());
        assert!(json.contains("नमस्ते"));

        let loaded = SearchIndex::from_json(&json).unwrap();
        assert_eq!(loaded, index);
        assert_eq!(loaded.to_json().unwrap(), json);
    }
}
