//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 互斥锁协调器集成测试

#[path = "../common/mod.rs"]
mod common;

use cacheguard::backend::{KeyValueStore, MemoryStore};
use cacheguard::clock::ManualClock;
use cacheguard::lock::DEFAULT_LOCK_TTL;
use cacheguard::LockCoordinator;
use common::{setup_logging, start_time, FailingStore};
use std::sync::Arc;
use std::time::Duration;

fn coordinator() -> (LockCoordinator, Arc<MemoryStore>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(start_time()));
    let store = Arc::new(MemoryStore::with_clock(clock.clone()));
    let locks = LockCoordinator::new(store.clone(), "lock:", DEFAULT_LOCK_TTL);
    (locks, store, clock)
}

#[tokio::test]
async fn test_expired_lock_can_be_taken_over() {
    setup_logging();
    let (locks, _store, clock) = coordinator();
    let key = locks.lock_key("cache:shop:1");

    assert!(locks.try_lock(&key).await.unwrap());
    clock.advance(chrono::Duration::seconds(9));
    assert!(!locks.try_lock(&key).await.unwrap());
    clock.advance(chrono::Duration::seconds(1));
    assert!(locks.try_lock(&key).await.unwrap(), "holder crashed, ttl elapsed");
}

#[tokio::test]
async fn test_unlock_does_not_check_holder() {
    setup_logging();
    let (locks, store, clock) = coordinator();
    let key = locks.lock_key("cache:shop:2");

    assert!(locks.try_lock(&key).await.unwrap());
    clock.advance(chrono::Duration::seconds(11));
    assert!(locks.try_lock(&key).await.unwrap());

    // 第一个持有者迟到的释放会删除第二个持有者的锁
    locks.unlock(&key).await.unwrap();
    assert_eq!(store.get(&key).await.unwrap(), None);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_single_winner_under_contention() {
    setup_logging();
    let (locks, _store, _clock) = coordinator();
    let key = locks.lock_key("cache:shop:3");

    let mut tasks = Vec::new();
    for _ in 0..32 {
        let locks = locks.clone();
        let key = key.clone();
        tasks.push(tokio::spawn(async move { locks.try_lock(&key).await.unwrap() }));
    }
    let mut winners = 0;
    for task in tasks {
        if task.await.unwrap() {
            winners += 1;
        }
    }
    assert_eq!(winners, 1);
}

#[tokio::test]
async fn test_release_quietly_swallows_store_errors() {
    setup_logging();
    let locks = LockCoordinator::new(Arc::new(FailingStore), "lock:", Duration::from_secs(1));
    let key = locks.lock_key("cache:shop:4");

    assert!(locks.try_lock(&key).await.is_err());
    assert!(locks.unlock(&key).await.is_err());
    locks.release_quietly(&key).await;
}
