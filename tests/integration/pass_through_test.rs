//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 穿透保护集成测试

#[path = "../common/mod.rs"]
mod common;

use cacheguard::backend::KeyValueStore;
use cacheguard::{cache_key, CacheError};
use common::{harness, setup_logging, shop, unique_prefix, CallCounter, Shop};
use std::time::Duration;

const TTL: Duration = Duration::from_secs(30 * 60);

#[tokio::test]
async fn test_hit_miss_and_populate() {
    setup_logging();
    let h = harness();
    let prefix = unique_prefix("shop");
    let calls = CallCounter::new();

    let loader = |id: u64| {
        let calls = calls.clone();
        async move {
            calls.hit();
            Ok::<_, CacheError>(Some(shop(id, "101 Tea House")))
        }
    };

    let first = h.client.get_or_load(&prefix, 1u64, loader, TTL).await.unwrap();
    assert_eq!(first, Some(shop(1, "101 Tea House")));
    assert_eq!(calls.count(), 1);
    assert_eq!(h.store.ttl(&cache_key(&prefix, &1)), Some(TTL));

    let second = h.client.get_or_load(&prefix, 1u64, loader, TTL).await.unwrap();
    assert_eq!(second, first);
    assert_eq!(calls.count(), 1, "a cached value must not reach the loader");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_tombstone_blocks_penetration() {
    setup_logging();
    let h = harness();
    let prefix = unique_prefix("shop");
    let calls = CallCounter::new();

    let loader = |_id: u64| {
        let calls = calls.clone();
        async move {
            calls.hit();
            Ok::<Option<Shop>, CacheError>(None)
        }
    };

    assert_eq!(h.client.get_or_load(&prefix, 999u64, loader, TTL).await.unwrap(), None);
    assert_eq!(calls.count(), 1);
    let key = cache_key(&prefix, &999);
    assert_eq!(h.store.get(&key).await.unwrap().as_deref(), Some(""));
    assert_eq!(h.store.ttl(&key), Some(h.client.null_ttl()));

    let mut tasks = Vec::new();
    for _ in 0..20 {
        let client = h.client.clone();
        let prefix = prefix.clone();
        let calls = calls.clone();
        tasks.push(tokio::spawn(async move {
            client
                .get_or_load(
                    &prefix,
                    999u64,
                    move |_id: u64| async move {
                        calls.hit();
                        Ok::<Option<Shop>, CacheError>(None)
                    },
                    TTL,
                )
                .await
        }));
    }
    for task in tasks {
        assert_eq!(task.await.unwrap().unwrap(), None);
    }
    assert_eq!(calls.count(), 1, "tombstone hits must not reach the loader");
}

#[tokio::test]
async fn test_tombstone_expires() {
    setup_logging();
    let h = harness();
    let prefix = unique_prefix("shop");
    let calls = CallCounter::new();

    let loader = |_id: u64| {
        let calls = calls.clone();
        async move {
            calls.hit();
            Ok::<Option<Shop>, CacheError>(None)
        }
    };

    h.client.get_or_load(&prefix, 7u64, loader, TTL).await.unwrap();
    h.clock.advance(chrono::Duration::seconds(121));
    h.client.get_or_load(&prefix, 7u64, loader, TTL).await.unwrap();
    assert_eq!(calls.count(), 2);
}

#[tokio::test]
async fn test_loader_error_propagates_and_caches_nothing() {
    setup_logging();
    let h = harness();
    let prefix = unique_prefix("shop");

    let err = h
        .client
        .get_or_load(
            &prefix,
            3u64,
            |_id: u64| async { Err::<Option<Shop>, _>(std::io::Error::other("db down")) },
            TTL,
        )
        .await
        .unwrap_err();

    assert!(err.is_loader());
    let CacheError::Loader(source) = err else {
        unreachable!();
    };
    let io = source.downcast_ref::<std::io::Error>().expect("original error kept");
    assert_eq!(io.to_string(), "db down");
    assert_eq!(h.store.get(&cache_key(&prefix, &3)).await.unwrap(), None);
}

#[tokio::test]
async fn test_write_plain_round_trip() {
    setup_logging();
    let h = harness();
    let prefix = unique_prefix("shop");
    let original = Shop {
        id: 42,
        name: "Café \"Ünïcode\" 🍵".to_string(),
        score: u32::MAX,
    };

    h.client
        .write_plain(&cache_key(&prefix, &42), &original, TTL)
        .await
        .unwrap();
    let read = h
        .client
        .get_or_load(
            &prefix,
            42u64,
            |_id: u64| async {
                Err::<Option<Shop>, _>(CacheError::Store("loader must not run".to_string()))
            },
            TTL,
        )
        .await
        .unwrap();
    assert_eq!(read, Some(original));
}

#[tokio::test]
async fn test_invalidate_forces_reload() {
    setup_logging();
    let h = harness();
    let prefix = unique_prefix("shop");
    let calls = CallCounter::new();

    let loader = |id: u64| {
        let calls = calls.clone();
        async move {
            let n = calls.hit();
            Ok::<_, CacheError>(Some(shop(id, &format!("v{}", n))))
        }
    };

    h.client.get_or_load(&prefix, 5u64, loader, TTL).await.unwrap();
    h.client.invalidate(&prefix, &5u64).await.unwrap();
    let reloaded = h.client.get_or_load(&prefix, 5u64, loader, TTL).await.unwrap();
    assert_eq!(reloaded.map(|s| s.name), Some("v2".to_string()));
}

#[tokio::test]
async fn test_ttl_must_exceed_tombstone_ttl() {
    let h = harness();
    let err = h
        .client
        .get_or_load(
            "cache:shop:",
            1u64,
            |id: u64| async move { Ok::<_, CacheError>(Some(shop(id, "x"))) },
            Duration::from_secs(60),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CacheError::Configuration(_)));
}
