//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 分布式ID生成器集成测试

#[path = "../common/mod.rs"]
mod common;

use cacheguard::backend::{KeyValueStore, MemoryStore};
use cacheguard::clock::{Clock, ManualClock, SystemClock};
use cacheguard::{CacheError, DistributedIdGenerator};
use chrono::TimeZone;
use common::{setup_logging, FailingStore};
use std::collections::HashSet;
use std::sync::Arc;

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_ids_are_unique() {
    setup_logging();
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let ids = DistributedIdGenerator::new(store, Arc::new(SystemClock));

    let mut tasks = Vec::new();
    for _ in 0..100 {
        let ids = ids.clone();
        tasks.push(tokio::spawn(async move {
            let mut out = Vec::with_capacity(100);
            for _ in 0..100 {
                out.push(ids.next_id("order").await.unwrap());
            }
            out
        }));
    }

    let mut seen = HashSet::new();
    for task in tasks {
        for id in task.await.unwrap() {
            assert!(seen.insert(id), "duplicate id {}", id);
        }
    }
    assert_eq!(seen.len(), 10_000);
}

#[tokio::test]
async fn test_next_day_ids_are_greater() {
    setup_logging();
    let clock = Arc::new(ManualClock::new(
        chrono::Utc.with_ymd_and_hms(2024, 2, 28, 23, 59, 58).unwrap(),
    ));
    let store = Arc::new(MemoryStore::with_clock(clock.clone()));
    let ids = DistributedIdGenerator::new(store.clone(), clock.clone());

    let mut day_one = Vec::new();
    for _ in 0..500 {
        day_one.push(ids.next_id("order").await.unwrap());
    }
    clock.advance(chrono::Duration::seconds(3));
    let mut day_two = Vec::new();
    for _ in 0..5 {
        day_two.push(ids.next_id("order").await.unwrap());
    }

    let max_one = day_one.iter().max().copied().unwrap();
    let min_two = day_two.iter().min().copied().unwrap();
    assert!(min_two > max_one);

    // 新的一天序列号从1重新开始
    assert_eq!(ids.decode(min_two).1, 1);
    assert_eq!(
        store.get("seq:order:20240228").await.unwrap().as_deref(),
        Some("500")
    );
    assert_eq!(
        store.get("seq:order:20240229").await.unwrap().as_deref(),
        Some("5")
    );
}

#[tokio::test]
async fn test_prefixes_have_independent_sequences() {
    let clock = Arc::new(ManualClock::new(
        chrono::Utc.with_ymd_and_hms(2024, 7, 1, 12, 0, 0).unwrap(),
    ));
    let store = Arc::new(MemoryStore::with_clock(clock.clone()));
    let ids = DistributedIdGenerator::new(store, clock.clone());

    let order = ids.next_id("order").await.unwrap();
    let voucher = ids.next_id("voucher").await.unwrap();
    assert_eq!(order, voucher, "same second, both first in their sequence");

    let (at, sequence) = ids.decode(order);
    assert_eq!(at, clock.now());
    assert_eq!(sequence, 1);
}

#[tokio::test]
async fn test_increment_failure_is_generation_error() {
    setup_logging();
    let ids = DistributedIdGenerator::new(Arc::new(FailingStore), Arc::new(SystemClock));

    let err = ids.next_id("order").await.unwrap_err();
    match err {
        CacheError::Generation { key, source } => {
            assert!(key.starts_with("seq:order:"));
            assert!(matches!(*source, CacheError::Store(_)));
        }
        other => panic!("expected Generation, got {:?}", other),
    }
}

#[tokio::test]
async fn test_sequence_overflow_is_generation_error() {
    let clock = Arc::new(ManualClock::new(
        chrono::Utc.with_ymd_and_hms(2024, 7, 1, 12, 0, 0).unwrap(),
    ));
    let store = Arc::new(MemoryStore::with_clock(clock.clone()));
    store
        .set("seq:order:20240701", &u32::MAX.to_string(), None)
        .await
        .unwrap();
    let ids = DistributedIdGenerator::new(store, clock);

    let err = ids.next_id("order").await.unwrap_err();
    assert!(matches!(err, CacheError::Generation { .. }));
}
