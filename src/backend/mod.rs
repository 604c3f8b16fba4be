//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了键值存储接口及其内存、Redis两种实现。

pub mod memory;
pub mod redis_provider;
pub mod redis_store;

use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;

pub use memory::MemoryStore;
pub use redis_store::RedisStore;

/// 键值存储特征
///
/// 缓存层只依赖这组原子操作；存储、淘汰与TTL执行均由实现方负责。
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// 读取键值，不存在时返回None
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// 写入键值，`ttl` 为None表示永不过期
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()>;

    /// 仅当键不存在时写入，返回是否写入成功
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool>;

    /// 原子自增，返回自增后的值；键不存在时从0开始
    async fn incr(&self, key: &str) -> Result<i64>;

    /// 删除键
    async fn delete(&self, key: &str) -> Result<()>;
}
