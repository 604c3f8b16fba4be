//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 逻辑过期异步重建集成测试

#[path = "../common/mod.rs"]
mod common;

use cacheguard::backend::KeyValueStore;
use cacheguard::{cache_key, CacheError, LogicalRead};
use common::{harness, harness_with_pool, setup_logging, shop, unique_prefix, CallCounter, Shop};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Barrier, Notify};

const LOGICAL_TTL: Duration = Duration::from_secs(20);

#[tokio::test]
async fn test_absent_key_is_not_populated() {
    setup_logging();
    let h = harness();
    let prefix = unique_prefix("swr");

    let read = h
        .client
        .get_stale_or_refresh(
            &prefix,
            1u64,
            |_id: u64| async {
                Err::<Option<Shop>, _>(CacheError::Store("loader must not run".to_string()))
            },
            LOGICAL_TTL,
        )
        .await
        .unwrap();
    assert!(matches!(read, LogicalRead::Absent));
    assert_eq!(h.store.get(&cache_key(&prefix, &1)).await.unwrap(), None);
    assert_eq!(h.pool.stats().submitted, 0);
}

#[tokio::test]
async fn test_fresh_value_returned_without_loader() {
    setup_logging();
    let h = harness();
    let prefix = unique_prefix("swr");
    let key = cache_key(&prefix, &1);
    h.client.write_logical(&key, &shop(1, "warm"), LOGICAL_TTL).await.unwrap();
    assert_eq!(h.store.ttl(&key), None, "logical envelopes carry no physical ttl");

    let read = h
        .client
        .get_stale_or_refresh(
            &prefix,
            1u64,
            |_id: u64| async {
                Err::<Option<Shop>, _>(CacheError::Store("loader must not run".to_string()))
            },
            LOGICAL_TTL,
        )
        .await
        .unwrap();
    assert!(matches!(read, LogicalRead::Fresh(ref s) if s.name == "warm"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_stale_while_revalidate() {
    setup_logging();
    let h = harness();
    let prefix = unique_prefix("swr");
    let key = cache_key(&prefix, &1);
    h.client
        .write_logical(&key, &shop(1, "old"), Duration::from_secs(1))
        .await
        .unwrap();
    h.clock.advance(chrono::Duration::seconds(2));

    let calls = CallCounter::new();
    let barrier = Arc::new(Barrier::new(20));
    let mut tasks = Vec::new();
    for _ in 0..20 {
        let client = h.client.clone();
        let prefix = prefix.clone();
        let calls = calls.clone();
        let barrier = barrier.clone();
        tasks.push(tokio::spawn(async move {
            barrier.wait().await;
            let started = Instant::now();
            let read = client
                .get_stale_or_refresh(
                    &prefix,
                    1u64,
                    move |id: u64| async move {
                        calls.hit();
                        tokio::time::sleep(Duration::from_millis(200)).await;
                        Ok::<_, CacheError>(Some(shop(id, "new")))
                    },
                    LOGICAL_TTL,
                )
                .await
                .unwrap();
            (read, started.elapsed())
        }));
    }

    let mut handles = Vec::new();
    for task in tasks {
        let (mut read, elapsed) = task.await.unwrap();
        assert!(elapsed < Duration::from_millis(150), "stale read blocked for {:?}", elapsed);
        assert!(read.is_stale());
        assert_eq!(read.value().map(|s| s.name.as_str()), Some("old"));
        if let Some(handle) = read.take_rebuild() {
            handles.push(handle);
        }
    }
    assert_eq!(handles.len(), 1, "exactly one rebuild may be submitted");

    let handle = handles.pop().unwrap();
    assert_eq!(handle.key(), key);
    handle.wait().await.unwrap();
    assert_eq!(calls.count(), 1);

    let read = h
        .client
        .get_stale_or_refresh(
            &prefix,
            1u64,
            |_id: u64| async {
                Err::<Option<Shop>, _>(CacheError::Store("loader must not run".to_string()))
            },
            LOGICAL_TTL,
        )
        .await
        .unwrap();
    assert!(matches!(read, LogicalRead::Fresh(ref s) if s.name == "new"));
    assert_eq!(h.store.get(&h.client.locks().lock_key(&key)).await.unwrap(), None);
}

#[tokio::test]
async fn test_failed_rebuild_keeps_stale_value_and_releases_lock() {
    setup_logging();
    let h = harness();
    let prefix = unique_prefix("swr");
    let key = cache_key(&prefix, &2);
    h.client.write_logical(&key, &shop(2, "old"), Duration::from_secs(1)).await.unwrap();
    h.clock.advance(chrono::Duration::seconds(5));

    let mut read = h
        .client
        .get_stale_or_refresh(
            &prefix,
            2u64,
            |_id: u64| async { Err::<Option<Shop>, _>(std::io::Error::other("db down")) },
            LOGICAL_TTL,
        )
        .await
        .unwrap();
    assert_eq!(read.value().map(|s| s.name.as_str()), Some("old"));

    let err = read.take_rebuild().unwrap().wait().await.unwrap_err();
    assert!(err.is_loader());
    assert_eq!(h.store.get(&h.client.locks().lock_key(&key)).await.unwrap(), None);

    let again = h
        .client
        .get_stale_or_refresh(
            &prefix,
            2u64,
            |id: u64| async move { Ok::<_, CacheError>(Some(shop(id, "new"))) },
            LOGICAL_TTL,
        )
        .await
        .unwrap();
    assert_eq!(again.value().map(|s| s.name.as_str()), Some("old"));
    assert!(again.is_stale());
}

#[tokio::test]
async fn test_panicking_rebuild_releases_lock() {
    setup_logging();
    let h = harness();
    let prefix = unique_prefix("swr");
    let key = cache_key(&prefix, &3);
    h.client.write_logical(&key, &shop(3, "old"), Duration::from_secs(1)).await.unwrap();
    h.clock.advance(chrono::Duration::seconds(5));

    let mut read = h
        .client
        .get_stale_or_refresh(
            &prefix,
            3u64,
            |_id: u64| async {
                if true {
                    panic!("loader exploded");
                }
                Ok::<Option<Shop>, CacheError>(None)
            },
            LOGICAL_TTL,
        )
        .await
        .unwrap();

    let err = read.take_rebuild().unwrap().wait().await.unwrap_err();
    assert!(matches!(err, CacheError::RebuildPanicked { ref message, .. } if message == "loader exploded"));
    assert_eq!(h.store.get(&h.client.locks().lock_key(&key)).await.unwrap(), None);
}

#[tokio::test]
async fn test_rebuild_of_deleted_entity_writes_tombstone() {
    setup_logging();
    let h = harness();
    let prefix = unique_prefix("swr");
    let key = cache_key(&prefix, &4);
    h.client.write_logical(&key, &shop(4, "old"), Duration::from_secs(1)).await.unwrap();
    h.clock.advance(chrono::Duration::seconds(5));

    let mut read = h
        .client
        .get_stale_or_refresh(
            &prefix,
            4u64,
            |_id: u64| async { Ok::<Option<Shop>, CacheError>(None) },
            LOGICAL_TTL,
        )
        .await
        .unwrap();
    read.take_rebuild().unwrap().wait().await.unwrap();

    assert_eq!(h.store.get(&key).await.unwrap().as_deref(), Some(""));
    let read = h
        .client
        .get_stale_or_refresh(
            &prefix,
            4u64,
            |_id: u64| async { Ok::<Option<Shop>, CacheError>(None) },
            LOGICAL_TTL,
        )
        .await
        .unwrap();
    assert!(matches!(read, LogicalRead::Absent));
}

#[tokio::test]
async fn test_rejected_rebuild_releases_lock() {
    setup_logging();
    let h = harness_with_pool(1, 1);
    let prefix = unique_prefix("swr");
    let key = cache_key(&prefix, &5);
    h.client.write_logical(&key, &shop(5, "old"), Duration::from_secs(1)).await.unwrap();
    h.clock.advance(chrono::Duration::seconds(5));

    // 占满工作任务和队列
    let gate = Arc::new(Notify::new());
    let blocker = {
        let gate = gate.clone();
        let task = async move {
            gate.notified().await;
            Ok(())
        };
        h.pool.submit("blocker", task, async {}).await.unwrap()
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    let queued = h.pool.submit("queued", async { Ok(()) }, async {}).await.unwrap();

    let read = h
        .client
        .get_stale_or_refresh(
            &prefix,
            5u64,
            |id: u64| async move { Ok::<_, CacheError>(Some(shop(id, "new"))) },
            LOGICAL_TTL,
        )
        .await
        .unwrap();
    match read {
        LogicalRead::Stale { value, rebuild } => {
            assert_eq!(value.name, "old");
            assert!(rebuild.is_none());
        }
        other => panic!("expected a stale read, got {:?}", other),
    }
    assert_eq!(h.store.get(&h.client.locks().lock_key(&key)).await.unwrap(), None);
    assert_eq!(h.pool.stats().rejected, 1);

    gate.notify_one();
    blocker.wait().await.unwrap();
    queued.wait().await.unwrap();
}

#[tokio::test]
async fn test_plain_value_is_served_stale_and_rewritten_as_logical() {
    setup_logging();
    let h = harness();
    let prefix = unique_prefix("swr");
    let key = cache_key(&prefix, &1);

    let warmed = h
        .client
        .get_or_load(
            &prefix,
            1u64,
            |id: u64| async move { Ok::<_, CacheError>(Some(shop(id, "warm"))) },
            Duration::from_secs(30 * 60),
        )
        .await
        .unwrap();
    assert_eq!(warmed, Some(shop(1, "warm")));

    let mut read = h
        .client
        .get_stale_or_refresh(
            &prefix,
            1u64,
            |id: u64| async move { Ok::<_, CacheError>(Some(shop(id, "refreshed"))) },
            LOGICAL_TTL,
        )
        .await
        .unwrap();
    assert!(read.is_stale());
    assert_eq!(read.value(), Some(&shop(1, "warm")));
    read.take_rebuild().expect("rebuild submitted").wait().await.unwrap();

    assert_eq!(h.store.ttl(&key), None);
    let read = h
        .client
        .get_stale_or_refresh(
            &prefix,
            1u64,
            |_id: u64| async {
                Err::<Option<Shop>, _>(CacheError::Store("loader must not run".to_string()))
            },
            LOGICAL_TTL,
        )
        .await
        .unwrap();
    assert!(matches!(read, LogicalRead::Fresh(ref s) if s.name == "refreshed"));
}
