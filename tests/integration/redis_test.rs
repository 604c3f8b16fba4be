//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! Redis集成测试，Redis不可用时跳过

#[path = "../common/mod.rs"]
mod common;

use cacheguard::backend::KeyValueStore;
use cacheguard::config::Config;
use cacheguard::{cache_key, CacheError, CacheManager, LogicalRead, SystemClock};
use common::{connect_redis, redis_config, setup_logging, shop, unique_prefix, Shop};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_redis_store_commands() {
    setup_logging();
    let Some(store) = connect_redis().await else {
        println!("跳过测试: Redis不可用");
        return;
    };
    let key = format!("{}k", unique_prefix("redis"));

    assert_eq!(store.get(&key).await.unwrap(), None);
    store.set(&key, "v", Some(Duration::from_secs(30))).await.unwrap();
    assert_eq!(store.get(&key).await.unwrap().as_deref(), Some("v"));
    let ttl = store.ttl(&key).await.unwrap().unwrap();
    assert!(ttl <= Duration::from_secs(30) && ttl > Duration::from_secs(25));

    assert!(!store.set_if_absent(&key, "w", Duration::from_secs(5)).await.unwrap());
    store.delete(&key).await.unwrap();
    assert!(store.set_if_absent(&key, "w", Duration::from_secs(5)).await.unwrap());
    store.delete(&key).await.unwrap();

    let counter = format!("{}n", unique_prefix("redis"));
    assert_eq!(store.incr(&counter).await.unwrap(), 1);
    assert_eq!(store.incr(&counter).await.unwrap(), 2);
    store.delete(&counter).await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_manager_against_redis() {
    setup_logging();
    let Some(store) = connect_redis().await else {
        println!("跳过测试: Redis不可用");
        return;
    };
    let config = Config {
        redis: redis_config(),
        ..Default::default()
    };
    let manager = CacheManager::with_store(config, Arc::new(store), Arc::new(SystemClock)).unwrap();
    let client = manager.client();
    let prefix = unique_prefix("redis");
    let ttl = Duration::from_secs(600);

    let value = client
        .get_or_load(
            &prefix,
            1u64,
            |id: u64| async move { Ok::<_, CacheError>(Some(shop(id, "redis shop"))) },
            ttl,
        )
        .await
        .unwrap();
    assert_eq!(value, Some(shop(1, "redis shop")));

    let missing = client
        .get_or_load_serialized(
            &prefix,
            2u64,
            |_id: u64| async { Ok::<Option<Shop>, CacheError>(None) },
            ttl,
            client.retry_policy(),
        )
        .await
        .unwrap();
    assert_eq!(missing, None);

    let logical_key = cache_key(&prefix, &3);
    client
        .write_logical(&logical_key, &shop(3, "logical"), Duration::from_secs(60))
        .await
        .unwrap();
    let read = client
        .get_stale_or_refresh(
            &prefix,
            3u64,
            |_id: u64| async { Ok::<Option<Shop>, CacheError>(None) },
            Duration::from_secs(60),
        )
        .await
        .unwrap();
    assert!(matches!(read, LogicalRead::Fresh(_)));

    let id = manager.id_generator().next_id(&prefix).await.unwrap();
    assert_eq!(manager.id_generator().decode(id).1, 1);

    for id in 1..=3u64 {
        client.invalidate(&prefix, &id).await.unwrap();
    }
    manager.shutdown().await;
}

#[tokio::test]
async fn test_connect_failure_is_reported() {
    setup_logging();
    let mut config = Config::default();
    config.redis.connection_string = "redis://127.0.0.1:1".to_string().into();
    config.redis.connection_timeout_ms = 200;
    assert!(CacheManager::connect(config).await.is_err());
}
