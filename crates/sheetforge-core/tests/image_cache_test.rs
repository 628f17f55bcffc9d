//! Integration tests for the persisted image cache.
//!
//! Each test uses its own temporary directory for `cache-index.json` and a
//! [`ManualClock`] so expiry does not depend on wall time.

use std::sync::Arc;
use std::time::Duration;

use sheetforge_core::image::{
    CacheMetadata, INDEX_FILE, ImageCache, ImageCacheConfig, image_hash, load_index,
};
use sheetforge_core::schema::ImageResult;

use sheetforge_test_utils::{ManualClock, init_tracing, sample_image};

fn metadata(description: &str) -> CacheMetadata {
    CacheMetadata {
        description: description.to_string(),
        style: "cartoon".into(),
        grade: "2".into(),
        subject: "Math".into(),
        size: "small".into(),
        theme: None,
    }
}

fn persisted_config(dir: &tempfile::TempDir) -> ImageCacheConfig {
    ImageCacheConfig {
        persist_path: Some(dir.path().to_path_buf()),
        ..ImageCacheConfig::default()
    }
}

async fn open(config: ImageCacheConfig, clock: &Arc<ManualClock>) -> ImageCache {
    ImageCache::open_with_clock(config, clock.clone()).await
}

#[tokio::test]
async fn entries_survive_reopen() {
    init_tracing();
    let dir = tempfile::TempDir::new().unwrap();
    let clock = Arc::new(ManualClock::starting_now());
    let meta = metadata("three red apples");
    let hash = image_hash(&meta);

    {
        let cache = open(persisted_config(&dir), &clock).await;
        assert!(cache.set(&hash, sample_image("apples"), meta.clone()).await);
    }

    let index = load_index(&dir.path().join(INDEX_FILE)).await.unwrap();
    assert_eq!(index.len(), 1);
    assert_eq!(index[0].hash, hash);
    assert_eq!(index[0].metadata, meta);

    let reopened = open(persisted_config(&dir), &clock).await;
    assert_eq!(reopened.len(), 1);
    assert_eq!(reopened.get(&hash).await, Some(sample_image("apples")));
}

#[tokio::test]
async fn reopen_skips_entries_that_expired_while_closed() {
    init_tracing();
    let dir = tempfile::TempDir::new().unwrap();
    let clock = Arc::new(ManualClock::starting_now());

    {
        let cache = open(persisted_config(&dir), &clock).await;
        cache.set("old", sample_image("old"), metadata("old")).await;
        clock.advance_days(20);
        cache.set("new", sample_image("new"), metadata("new")).await;
    }

    // "old" is 31 days old, "new" 11.
    clock.advance_days(11);
    let reopened = open(persisted_config(&dir), &clock).await;
    assert_eq!(reopened.len(), 1);
    assert!(reopened.get("old").await.is_none());
    assert!(reopened.get("new").await.is_some());
}

#[tokio::test]
async fn expired_entry_is_a_miss_and_is_dropped_from_the_index() {
    init_tracing();
    let dir = tempfile::TempDir::new().unwrap();
    let clock = Arc::new(ManualClock::starting_now());
    let cache = open(persisted_config(&dir), &clock).await;

    cache.set("h1", sample_image("a"), metadata("a")).await;
    clock.advance_days(30);

    assert!(cache.get("h1").await.is_none());
    assert_eq!(cache.stats().misses, 1);
    assert!(cache.is_empty());

    let index = load_index(&dir.path().join(INDEX_FILE)).await.unwrap();
    assert!(index.is_empty());
}

#[tokio::test]
async fn corrupt_index_starts_empty_and_is_overwritten() {
    init_tracing();
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join(INDEX_FILE);
    std::fs::write(&path, "{ not json").unwrap();
    let clock = Arc::new(ManualClock::starting_now());

    let cache = open(persisted_config(&dir), &clock).await;
    assert!(cache.is_empty());

    cache.set("h1", sample_image("a"), metadata("a")).await;
    let index = load_index(&path).await.unwrap();
    assert_eq!(index.len(), 1);
}

#[tokio::test]
async fn reopen_keeps_only_the_newest_entries_under_a_smaller_cap() {
    init_tracing();
    let dir = tempfile::TempDir::new().unwrap();
    let clock = Arc::new(ManualClock::starting_now());

    {
        let cache = open(persisted_config(&dir), &clock).await;
        for i in 0..5 {
            cache
                .set(&format!("h{i}"), sample_image(&i.to_string()), metadata(&i.to_string()))
                .await;
            clock.advance(chrono::Duration::minutes(1));
        }
    }

    let config = ImageCacheConfig {
        max_entries: 2,
        ..persisted_config(&dir)
    };
    let reopened = open(config, &clock).await;
    assert_eq!(reopened.len(), 2);
    assert!(reopened.get("h4").await.is_some());
    assert!(reopened.get("h3").await.is_some());
    assert!(reopened.get("h0").await.is_none());
}

#[tokio::test]
async fn placeholders_are_never_cached() {
    init_tracing();
    let dir = tempfile::TempDir::new().unwrap();
    let clock = Arc::new(ManualClock::starting_now());
    let cache = open(persisted_config(&dir), &clock).await;

    let stored = cache
        .set("h1", ImageResult::placeholder("generation failed", None), metadata("a"))
        .await;
    assert!(!stored);
    assert!(cache.is_empty());
    assert!(!dir.path().join(INDEX_FILE).exists());
}

#[tokio::test]
async fn failed_generation_is_not_cached() {
    init_tracing();
    let clock = Arc::new(ManualClock::starting_now());
    let cache = open(ImageCacheConfig::default(), &clock).await;

    let result = cache
        .get_or_generate("h1", metadata("a"), || async {
            Err::<ImageResult, _>(anyhow::anyhow!("backend down"))
        })
        .await;
    assert!(result.is_err());
    assert!(cache.is_empty());

    let second = cache
        .get_or_generate("h1", metadata("a"), || async {
            Ok::<_, anyhow::Error>(sample_image("a"))
        })
        .await
        .unwrap();
    assert!(!second.cached);

    let third = cache
        .get_or_generate("h1", metadata("a"), || async {
            Err::<ImageResult, _>(anyhow::anyhow!("must not be called"))
        })
        .await
        .unwrap();
    assert!(third.cached);
    assert_eq!(third.image, sample_image("a"));
}

#[tokio::test(start_paused = true)]
async fn sweeper_removes_expired_entries_until_stopped() {
    init_tracing();
    let clock = Arc::new(ManualClock::starting_now());
    let config = ImageCacheConfig {
        sweep_interval: Duration::from_secs(60),
        ..ImageCacheConfig::default()
    };
    let cache = Arc::new(open(config, &clock).await);
    cache.set("h1", sample_image("a"), metadata("a")).await;

    let sweeper = cache.spawn_sweeper();
    clock.advance_days(31);
    tokio::time::sleep(Duration::from_secs(61)).await;
    assert!(cache.is_empty(), "sweeper did not run");

    sweeper.stop();
    assert!(sweeper.is_stopped());
    sweeper.shutdown().await;

    // Nothing sweeps after shutdown.
    cache.set("h2", sample_image("b"), metadata("b")).await;
    clock.advance_days(31);
    tokio::time::sleep(Duration::from_secs(180)).await;
    assert_eq!(cache.len(), 1);
}
