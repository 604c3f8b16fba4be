//! cacheguard - 缓存穿透、击穿防护与分布式ID生成
//!
//! 在任意键值存储之上提供三种读取策略：带墓碑的穿透保护、
//! 互斥锁同步重建、逻辑过期异步重建；以及基于原子自增的
//! 分布式顺序ID生成器。

#![doc(html_root_url = "https://docs.rs/cacheguard/0.1.0")]

pub use serde;
pub use serde::{Deserialize, Serialize};
pub use serde_json;
pub use tokio;

pub mod backend;
pub mod cli;
pub mod client;
pub mod clock;
pub mod config;
pub mod error;
pub mod id_generator;
pub mod lock;
pub mod manager;
pub mod metrics;
pub mod serialization;
pub mod sync;
pub mod telemetry;

// Re-export commonly used items
pub use backend::{KeyValueStore, MemoryStore, RedisStore};
pub use client::{cache_key, Backoff, CacheClient, LogicalRead, RetryPolicy};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use error::{BoxError, CacheError, Result};
pub use id_generator::DistributedIdGenerator;
pub use lock::{LockCoordinator, LockGuard};
pub use manager::CacheManager;
pub use sync::rebuild_pool::{RebuildHandle, RebuildPool};
pub use sync::warmup::{WarmupManager, WarmupResult, WarmupStatus};

/// cacheguard 版本号
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
