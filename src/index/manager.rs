use super::{IndexBuilder, IndexKey, IndexStore, SearchIndex};
use crate::captions::normalize;
use crate::config::Config;
use crate::error::{IndexError, Result};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{OnceCell, RwLock};
use tracing::{debug, info};

/// Once-initialised holder for one key's index. Empty means the key is
/// absent or being loaded/built; set means ready.
type Slot = Arc<OnceCell<Arc<SearchIndex>>>;

#[derive(Debug, Default)]
struct Counters {
    memory_hits: AtomicU64,
    storage_loads: AtomicU64,
    builds: AtomicU64,
}

/// Snapshot of cache activity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Requests answered from memory
    pub memory_hits: u64,
    /// Indexes loaded from a persisted file
    pub storage_loads: u64,
    /// Indexes built from caption sources
    pub builds: u64,
    /// Indexes currently held in memory
    pub resident: usize,
}

/// Outcome of warming the cache for one video
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PrefetchReport {
    pub video_id: String,
    /// Languages now held in memory
    pub indexed: Vec<String>,
    /// Languages listed in the manifest but without usable captions
    pub skipped: Vec<String>,
}

impl PrefetchReport {
    fn new(video_id: &str) -> Self {
        Self {
            video_id: video_id.to_string(),
            ..Self::default()
        }
    }
}

/// Serves search indexes per (video, language), loading or building each at
/// most once.
///
/// Cheap to clone: clones share the same in-memory cache. Construct one at
/// start-up and hand clones to whatever serves requests.
#[derive(Debug, Clone)]
pub struct SearchIndexManager {
    store: IndexStore,
    builder: IndexBuilder,
    slots: Arc<RwLock<HashMap<IndexKey, Slot>>>,
    counters: Arc<Counters>,
    prefetch_concurrency: usize,
}

impl SearchIndexManager {
    pub fn new(store: IndexStore) -> Self {
        Self {
            builder: IndexBuilder::new(store.clone()),
            store,
            slots: Arc::new(RwLock::new(HashMap::new())),
            counters: Arc::new(Counters::default()),
            prefetch_concurrency: 1,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(IndexStore::new(config.storage.root.clone()))
            .with_prefetch_concurrency(config.index.prefetch_concurrency)
    }

    /// Maximum number of languages prefetched at once
    pub fn with_prefetch_concurrency(mut self, concurrency: usize) -> Self {
        self.prefetch_concurrency = concurrency.max(1);
        self
    }

    pub fn store(&self) -> &IndexStore {
        &self.store
    }

    /// Index for (video_id, lang): from memory, else from its persisted file,
    /// else freshly built from the caption source.
    ///
    /// Concurrent callers for the same key share one load/build. The work
    /// runs on its own task, so a caller that goes away does not abort it for
    /// the others. Failures leave the key absent and are not cached.
    pub async fn get_or_build(&self, video_id: &str, lang: &str) -> Result<Arc<SearchIndex>> {
        let key = IndexKey::new(video_id, lang)?;
        let slot = self.slot(&key).await;

        if let Some(index) = slot.get() {
            self.counters.memory_hits.fetch_add(1, Ordering::Relaxed);
            debug!("Cache hit for {}", key);
            return Ok(Arc::clone(index));
        }

        let manager = self.clone();
        tokio::spawn(async move {
            let result = slot
                .get_or_try_init(|| manager.load_or_build(&key))
                .await
                .cloned();

            if result.is_err() {
                manager.forget_failed(&key, &slot).await;
            }
            result
        })
        .await
        .map_err(|e| IndexError::Task(e.to_string()))?
    }

    /// Timestamps at which `query` is spoken, ascending.
    ///
    /// The whole query is normalized into one word. An unknown word is not
    /// an error and yields no hits.
    pub async fn search(&self, video_id: &str, lang: &str, query: &str) -> Result<Vec<f64>> {
        let word = normalize(query);
        let index = self.get_or_build(video_id, lang).await?;

        let hits = index.lookup(&word).to_vec();
        debug!(
            "Search {}.{} for {:?} -> {} hits",
            video_id,
            lang,
            word,
            hits.len()
        );
        Ok(hits)
    }

    /// Make sure every language in the video's manifest is indexed and cached.
    ///
    /// Best effort: no manifest means nothing to do, and languages without a
    /// caption source are skipped. Storage failures are still returned.
    pub async fn prefetch(&self, video_id: &str) -> Result<PrefetchReport> {
        let mut report = PrefetchReport::new(video_id);

        let Some(manifest) = self.store.read_manifest(video_id).await? else {
            debug!("No manifest for video {}, nothing to prefetch", video_id);
            return Ok(report);
        };

        let langs: BTreeSet<String> = manifest.langs.into_iter().collect();
        let results: Vec<(String, Result<Arc<SearchIndex>>)> = stream::iter(langs)
            .map(|lang| async move {
                let result = self.get_or_build(video_id, &lang).await;
                (lang, result)
            })
            .buffer_unordered(self.prefetch_concurrency)
            .collect()
            .await;

        for (lang, result) in results {
            match result {
                Ok(_) => report.indexed.push(lang),
                Err(e @ (IndexError::SourceMissing { .. } | IndexError::InvalidKey(_))) => {
                    debug!("Prefetch skipping {}.{}: {}", video_id, lang, e);
                    report.skipped.push(lang);
                }
                Err(e) => return Err(e),
            }
        }

        report.indexed.sort();
        report.skipped.sort();

        info!(
            "🔥 Prefetched video {}: {} indexed, {} skipped",
            video_id,
            report.indexed.len(),
            report.skipped.len()
        );
        Ok(report)
    }

    /// Whether the index for (video_id, lang) is held in memory
    pub async fn is_cached(&self, video_id: &str, lang: &str) -> bool {
        let Ok(key) = IndexKey::new(video_id, lang) else {
            return false;
        };

        self.slots
            .read()
            .await
            .get(&key)
            .is_some_and(|slot| slot.initialized())
    }

    /// Drop one in-memory index. The persisted file is kept, so the next
    /// request reloads it. A load/build already in flight still completes for
    /// the callers waiting on it.
    pub async fn evict(&self, video_id: &str, lang: &str) -> Result<bool> {
        let key = IndexKey::new(video_id, lang)?;
        let removed = self.slots.write().await.remove(&key);
        Ok(removed.is_some_and(|slot| slot.initialized()))
    }

    /// Drop every in-memory index; returns how many were ready
    pub async fn clear(&self) -> usize {
        let mut slots = self.slots.write().await;
        let ready = slots.values().filter(|slot| slot.initialized()).count();
        slots.clear();

        info!("🧹 Cleared {} cached indexes", ready);
        ready
    }

    pub async fn stats(&self) -> CacheStats {
        let resident = self
            .slots
            .read()
            .await
            .values()
            .filter(|slot| slot.initialized())
            .count();

        CacheStats {
            memory_hits: self.counters.memory_hits.load(Ordering::Relaxed),
            storage_loads: self.counters.storage_loads.load(Ordering::Relaxed),
            builds: self.counters.builds.load(Ordering::Relaxed),
            resident,
        }
    }

    /// The slot for `key`, created empty on first use. The map lock is only
    /// held for the lookup, never across I/O.
    async fn slot(&self, key: &IndexKey) -> Slot {
        if let Some(slot) = self.slots.read().await.get(key) {
            return Arc::clone(slot);
        }

        Arc::clone(self.slots.write().await.entry(key.clone()).or_default())
    }

    /// Remove a slot whose load/build failed, unless it was already replaced
    /// or another caller has since filled it.
    async fn forget_failed(&self, key: &IndexKey, failed: &Slot) {
        let mut slots = self.slots.write().await;
        let stale = slots
            .get(key)
            .is_some_and(|slot| Arc::ptr_eq(slot, failed) && !slot.initialized());

        if stale {
            slots.remove(key);
        }
    }

    async fn load_or_build(&self, key: &IndexKey) -> Result<Arc<SearchIndex>> {
        if let Some(index) = self.store.load_index(key).await? {
            self.counters.storage_loads.fetch_add(1, Ordering::Relaxed);
            info!("📂 Loaded persisted index for {} ({} words)", key, index.len());
            return Ok(Arc::new(index));
        }

        let index = self.builder.build(key).await?;
        self.counters.builds.fetch_add(1, Ordering::Relaxed);
        Ok(Arc::new(index))
    }
}
