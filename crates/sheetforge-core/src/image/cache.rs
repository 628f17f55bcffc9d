//! Content-addressed image cache with TTL expiry, a size cap, and a JSON
//! index persisted next to the process.
//!
//! The entry map sits behind a `std::sync::Mutex` that is never held across
//! an `.await`; index writes are serialized by a separate `tokio::sync::Mutex`
//! so the file always reflects a complete snapshot.

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::hash::CacheMetadata;
use crate::schema::ImageResult;

/// File name of the persisted index inside `persist_path`.
pub const INDEX_FILE: &str = "cache-index.json";

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

/// Source of "now" for expiry decisions.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Errors reading or writing the persisted index.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("failed to access cache index {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid cache index {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageCacheConfig {
    pub ttl_days: u32,
    pub max_entries: usize,
    /// Directory holding `cache-index.json`; `None` keeps the cache in memory.
    pub persist_path: Option<PathBuf>,
    pub sweep_interval: Duration,
}

impl Default for ImageCacheConfig {
    fn default() -> Self {
        Self {
            ttl_days: 30,
            max_entries: 500,
            persist_path: None,
            sweep_interval: Duration::from_secs(60 * 60),
        }
    }
}

/// One cached image as stored in the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub hash: String,
    pub image: ImageResult,
    pub metadata: CacheMetadata,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

/// Result of [`ImageCache::get_or_generate`].
#[derive(Debug, Clone, PartialEq)]
pub struct CachedImage {
    pub image: ImageResult,
    /// `true` when served from the cache without calling the generator.
    pub cached: bool,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    hits: u64,
    misses: u64,
    evictions: u64,
}

// ---------------------------------------------------------------------------
// ImageCache
// ---------------------------------------------------------------------------

pub struct ImageCache {
    config: ImageCacheConfig,
    clock: Arc<dyn Clock>,
    state: Mutex<CacheState>,
    write_lock: tokio::sync::Mutex<()>,
}

impl std::fmt::Debug for ImageCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageCache")
            .field("config", &self.config)
            .field("entries", &self.len())
            .finish()
    }
}

impl ImageCache {
    /// Open a cache using the system clock.
    pub async fn open(config: ImageCacheConfig) -> Self {
        Self::open_with_clock(config, Arc::new(SystemClock)).await
    }

    /// Open a cache, loading unexpired entries from the persisted index.
    ///
    /// A missing or unreadable index is logged and the cache starts empty.
    pub async fn open_with_clock(config: ImageCacheConfig, clock: Arc<dyn Clock>) -> Self {
        let mut state = CacheState::default();

        if let Some(path) = index_path(&config) {
            match load_index(&path).await {
                Ok(entries) => {
                    let now = clock.now();
                    let total = entries.len();
                    let mut live: Vec<CacheEntry> =
                        entries.into_iter().filter(|e| !e.is_expired(now)).collect();
                    // Newest first so truncation keeps the freshest entries.
                    live.sort_by(|a, b| b.created_at.cmp(&a.created_at));
                    live.truncate(config.max_entries);
                    tracing::info!(
                        path = %path.display(),
                        loaded = live.len(),
                        skipped = total - live.len(),
                        "image cache index loaded"
                    );
                    state.entries = live.into_iter().map(|e| (e.hash.clone(), e)).collect();
                }
                Err(CacheError::Io { source, .. })
                    if source.kind() == std::io::ErrorKind::NotFound =>
                {
                    tracing::debug!(path = %path.display(), "no image cache index yet");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "ignoring unreadable image cache index");
                }
            }
        }

        Self {
            config,
            clock,
            state: Mutex::new(state),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn config(&self) -> &ImageCacheConfig {
        &self.config
    }

    fn state(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// `now + ttl_days`, saturating at the latest representable instant.
    fn expiry_from(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        chrono::Duration::try_days(i64::from(self.config.ttl_days))
            .and_then(|ttl| now.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Look up an image. Expired entries are removed and count as misses.
    pub async fn get(&self, hash: &str) -> Option<ImageResult> {
        let now = self.clock.now();
        let (found, purged) = {
            let mut state = self.state();
            let lookup = state
                .entries
                .get(hash)
                .map(|e| (e.is_expired(now), e.image.clone()));
            match lookup {
                Some((false, image)) => {
                    state.hits += 1;
                    (Some(image), false)
                }
                Some((true, _)) => {
                    state.entries.remove(hash);
                    state.misses += 1;
                    (None, true)
                }
                None => {
                    state.misses += 1;
                    (None, false)
                }
            }
        };

        if purged {
            tracing::debug!(hash = %hash, "image cache entry expired");
            self.persist().await;
        }
        found
    }

    /// Store an image. Placeholders are refused and `false` is returned.
    ///
    /// Inserting a new hash into a full cache evicts the single entry with
    /// the oldest `created_at`.
    pub async fn set(&self, hash: &str, image: ImageResult, metadata: CacheMetadata) -> bool {
        if image.is_placeholder() {
            tracing::debug!(hash = %hash, "refusing to cache placeholder image");
            return false;
        }
        if self.config.max_entries == 0 {
            return false;
        }

        let now = self.clock.now();
        let entry = CacheEntry {
            hash: hash.to_string(),
            image,
            metadata,
            created_at: now,
            expires_at: self.expiry_from(now),
        };

        {
            let mut state = self.state();
            if !state.entries.contains_key(hash) && state.entries.len() >= self.config.max_entries {
                let oldest = state
                    .entries
                    .values()
                    .min_by(|a, b| {
                        a.created_at
                            .cmp(&b.created_at)
                            .then_with(|| a.hash.cmp(&b.hash))
                    })
                    .map(|e| e.hash.clone());
                if let Some(oldest) = oldest {
                    state.entries.remove(&oldest);
                    state.evictions += 1;
                    tracing::debug!(evicted = %oldest, "image cache full, evicted oldest entry");
                }
            }
            state.entries.insert(hash.to_string(), entry);
        }

        self.persist().await;
        true
    }

    /// Return the cached image for `hash`, or run `generate` and cache its
    /// result. Concurrent misses for the same hash each run their generator.
    pub async fn get_or_generate<F, Fut>(
        &self,
        hash: &str,
        metadata: CacheMetadata,
        generate: F,
    ) -> Result<CachedImage>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<ImageResult>>,
    {
        if let Some(image) = self.get(hash).await {
            tracing::debug!(hash = %hash, "image cache hit");
            return Ok(CachedImage {
                image,
                cached: true,
            });
        }

        let image = generate().await?;
        self.set(hash, image.clone(), metadata).await;
        Ok(CachedImage {
            image,
            cached: false,
        })
    }

    /// Remove every expired entry. Returns the number removed.
    pub async fn sweep_expired(&self) -> usize {
        let now = self.clock.now();
        let removed = {
            let mut state = self.state();
            let before = state.entries.len();
            state.entries.retain(|_, e| !e.is_expired(now));
            before - state.entries.len()
        };

        if removed > 0 {
            tracing::info!(removed, "swept expired image cache entries");
            self.persist().await;
        }
        removed
    }

    /// Run [`sweep_expired`](Self::sweep_expired) every `sweep_interval`
    /// until the returned handle is stopped.
    pub fn spawn_sweeper(self: &Arc<Self>) -> SweeperHandle {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let cache = Arc::clone(self);
        let period = self.config.sweep_interval;

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        cache.sweep_expired().await;
                    }
                    _ = token.cancelled() => {
                        tracing::debug!("image cache sweeper stopped");
                        break;
                    }
                }
            }
        });

        SweeperHandle { cancel, task }
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.state();
        CacheStats {
            entries: state.entries.len(),
            hits: state.hits,
            misses: state.misses,
            evictions: state.evictions,
        }
    }

    pub fn len(&self) -> usize {
        self.state().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry and rewrite the index.
    pub async fn clear(&self) {
        self.state().entries.clear();
        self.persist().await;
    }

    /// Write the full entry set to the index. Failures are logged only.
    async fn persist(&self) {
        let Some(path) = index_path(&self.config) else {
            return;
        };

        let _guard = self.write_lock.lock().await;
        // Snapshot after taking the write lock so a later write never loses
        // to an earlier, slower one.
        let mut snapshot: Vec<CacheEntry> = self.state().entries.values().cloned().collect();
        snapshot.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.hash.cmp(&b.hash)));

        if let Err(e) = write_index(&path, &snapshot).await {
            tracing::warn!(error = %e, "failed to persist image cache index");
        }
    }
}

/// Stops a sweeper started by [`ImageCache::spawn_sweeper`].
#[derive(Debug)]
pub struct SweeperHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Signal the sweeper to stop without waiting for it.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Stop the sweeper and wait for its task to finish.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "image cache sweeper task failed");
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

// ---------------------------------------------------------------------------
// Index file
// ---------------------------------------------------------------------------

fn index_path(config: &ImageCacheConfig) -> Option<PathBuf> {
    config.persist_path.as_ref().map(|dir| dir.join(INDEX_FILE))
}

/// Read a persisted index.
pub async fn load_index(path: &Path) -> Result<Vec<CacheEntry>, CacheError> {
    let bytes = tokio::fs::read(path).await.map_err(|source| CacheError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_slice(&bytes).map_err(|source| CacheError::Json {
        path: path.to_path_buf(),
        source,
    })
}

async fn write_index(path: &Path, entries: &[CacheEntry]) -> Result<(), CacheError> {
    let io_err = |source| CacheError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(dir) = path.parent() {
        tokio::fs::create_dir_all(dir).await.map_err(io_err)?;
    }
    let json = serde_json::to_vec_pretty(entries).map_err(|source| CacheError::Json {
        path: path.to_path_buf(),
        source,
    })?;

    // Write-then-rename so readers never see a half-written file.
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, json).await.map_err(io_err)?;
    tokio::fs::rename(&tmp, path).await.map_err(io_err)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicI64, Ordering};

    use chrono::TimeZone;

    use super::*;

    struct TestClock(AtomicI64);

    impl TestClock {
        fn new() -> Arc<Self> {
            let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap().timestamp();
            Arc::new(Self(AtomicI64::new(start)))
        }

        fn advance_days(&self, days: i64) {
            self.0.fetch_add(days * 86_400, Ordering::SeqCst);
        }

        fn advance_secs(&self, secs: i64) {
            self.0.fetch_add(secs, Ordering::SeqCst);
        }
    }

    impl Clock for TestClock {
        fn now(&self) -> DateTime<Utc> {
            DateTime::from_timestamp(self.0.load(Ordering::SeqCst), 0).unwrap()
        }
    }

    fn meta(description: &str) -> CacheMetadata {
        CacheMetadata {
            description: description.into(),
            style: "cartoon".into(),
            grade: "1".into(),
            subject: "Math".into(),
            size: "small".into(),
            theme: None,
        }
    }

    fn png(data: &str) -> ImageResult {
        ImageResult {
            base64_data: data.into(),
            media_type: "image/png".into(),
            width: 256,
            height: 256,
            placement_id: None,
        }
    }

    async fn memory_cache(clock: Arc<TestClock>, max_entries: usize) -> ImageCache {
        let config = ImageCacheConfig {
            max_entries,
            ..ImageCacheConfig::default()
        };
        ImageCache::open_with_clock(config, clock).await
    }

    #[tokio::test]
    async fn get_after_set_within_ttl() {
        let clock = TestClock::new();
        let cache = memory_cache(clock.clone(), 10).await;
        assert!(cache.set("h1", png("AAAA"), meta("apples")).await);

        clock.advance_days(29);
        assert_eq!(cache.get("h1").await, Some(png("AAAA")));
        assert_eq!(cache.stats().hits, 1);
    }

    #[tokio::test]
    async fn expired_entry_is_a_miss_and_removed() {
        let clock = TestClock::new();
        let cache = memory_cache(clock.clone(), 10).await;
        cache.set("h1", png("AAAA"), meta("apples")).await;

        clock.advance_days(30);
        assert_eq!(cache.get("h1").await, None);
        assert!(cache.is_empty());
        assert_eq!(cache.stats().misses, 1);
    }

    #[tokio::test]
    async fn huge_ttl_saturates_instead_of_overflowing() {
        let clock = TestClock::new();
        let config = ImageCacheConfig {
            ttl_days: u32::MAX,
            ..ImageCacheConfig::default()
        };
        let cache = ImageCache::open_with_clock(config, clock.clone()).await;

        assert!(cache.set("h1", png("AAAA"), meta("apples")).await);
        clock.advance_days(365 * 100);
        assert_eq!(cache.get("h1").await, Some(png("AAAA")));
        assert_eq!(cache.sweep_expired().await, 0);
    }

    #[tokio::test]
    async fn placeholder_never_stored() {
        let cache = memory_cache(TestClock::new(), 10).await;
        let stored = cache
            .set("h1", ImageResult::placeholder("none", None), meta("apples"))
            .await;
        assert!(!stored);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn full_cache_evicts_exactly_the_oldest() {
        let clock = TestClock::new();
        let cache = memory_cache(clock.clone(), 3).await;
        for h in ["h1", "h2", "h3"] {
            cache.set(h, png(h), meta(h)).await;
            clock.advance_secs(1);
        }
        // A hit must not refresh h1's age.
        assert!(cache.get("h1").await.is_some());

        cache.set("h4", png("h4"), meta("h4")).await;
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.stats().evictions, 1);
        assert!(cache.get("h1").await.is_none());
        assert!(cache.get("h2").await.is_some());
        assert!(cache.get("h4").await.is_some());
    }

    #[tokio::test]
    async fn overwriting_existing_hash_does_not_evict() {
        let cache = memory_cache(TestClock::new(), 2).await;
        cache.set("h1", png("a"), meta("a")).await;
        cache.set("h2", png("b"), meta("b")).await;
        cache.set("h2", png("c"), meta("b")).await;
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.stats().evictions, 0);
        assert_eq!(cache.get("h2").await, Some(png("c")));
    }

    #[tokio::test]
    async fn get_or_generate_runs_generator_only_on_miss() {
        let cache = memory_cache(TestClock::new(), 10).await;
        let first = cache
            .get_or_generate("h1", meta("apples"), || async { Ok::<_, anyhow::Error>(png("AAAA")) })
            .await
            .unwrap();
        assert!(!first.cached);

        let second = cache
            .get_or_generate("h1", meta("apples"), || async {
                Err::<ImageResult, _>(anyhow::anyhow!("generator must not run on a hit"))
            })
            .await
            .unwrap();
        assert!(second.cached);
        assert_eq!(second.image, png("AAAA"));
    }

    #[tokio::test]
    async fn get_or_generate_propagates_generator_error() {
        let cache = memory_cache(TestClock::new(), 10).await;
        let err = cache
            .get_or_generate("h1", meta("apples"), || async {
                Err::<ImageResult, _>(anyhow::anyhow!("quota exceeded"))
            })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("quota exceeded"), "got: {err}");
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn sweep_removes_only_expired() {
        let clock = TestClock::new();
        let cache = memory_cache(clock.clone(), 10).await;
        cache.set("old", png("a"), meta("a")).await;
        clock.advance_days(20);
        cache.set("new", png("b"), meta("b")).await;
        clock.advance_days(15);

        assert_eq!(cache.sweep_expired().await, 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.get("new").await.is_some());
    }

    #[tokio::test]
    async fn clear_empties_cache() {
        let cache = memory_cache(TestClock::new(), 10).await;
        cache.set("h1", png("a"), meta("a")).await;
        cache.clear().await;
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn zero_capacity_stores_nothing() {
        let cache = memory_cache(TestClock::new(), 0).await;
        assert!(!cache.set("h1", png("a"), meta("a")).await);
        assert!(cache.is_empty());
    }
}
