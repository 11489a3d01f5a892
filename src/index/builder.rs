use super::{IndexKey, IndexStore, SearchIndex};
use crate::captions::{self, Cue};
use crate::error::{IndexError, Result};
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::info;

/// Build an index from parsed cues.
///
/// Every word of a cue maps to that cue's start time. Pure: the same cues
/// always give the same index.
pub fn build_index(cues: &[Cue]) -> SearchIndex {
    let mut occurrences: BTreeMap<String, Vec<f64>> = BTreeMap::new();

    for cue in cues {
        for word in captions::tokens(&cue.text) {
            occurrences.entry(word).or_default().push(cue.start);
        }
    }

    SearchIndex::from_occurrences(occurrences)
}

/// Builds indexes from caption sources and persists them through the store
#[derive(Debug, Clone)]
pub struct IndexBuilder {
    store: IndexStore,
}

impl IndexBuilder {
    pub fn new(store: IndexStore) -> Self {
        Self { store }
    }

    /// Parse the caption source for `key`, build its index and persist it.
    ///
    /// Fails with `SourceMissing` when there is no caption file for the key.
    pub async fn build(&self, key: &IndexKey) -> Result<SearchIndex> {
        let started = Instant::now();

        let raw = self
            .store
            .read_captions(key)
            .await?
            .ok_or_else(|| IndexError::SourceMissing {
                video_id: key.video_id().to_string(),
                lang: key.lang().to_string(),
            })?;

        let cues = captions::parse(&raw);
        let index = build_index(&cues);
        self.store.save_index(key, &index).await?;

        info!(
            "🔨 Built index for {}: {} cues, {} words in {:.2}s",
            key,
            cues.len(),
            index.len(),
            started.elapsed().as_secs_f64()
        );

        Ok(index)
    }
}
