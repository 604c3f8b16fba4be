//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了缓存客户端及其三种读取策略。
//!
//! * [`CacheClient::get_or_load`]：穿透保护，缺失值写入墓碑
//! * [`CacheClient::get_or_load_serialized`]：互斥锁同步重建，防止击穿
//! * [`CacheClient::get_stale_or_refresh`]：逻辑过期，返回旧值并异步重建

pub mod envelope;
pub mod logical;
pub mod mutex;
pub mod pass_through;

use crate::backend::KeyValueStore;
use crate::clock::{Clock, SystemClock};
use crate::config::CacheConfig;
use crate::error::{BoxError, CacheError, Result};
use crate::lock::{LockCoordinator, DEFAULT_LOCK_TTL};
use crate::metrics::GLOBAL_METRICS;
use crate::serialization::SerializerEnum;
use crate::sync::rebuild_pool::RebuildPool;
use envelope::{logical_deadline, Envelope};
use serde::{de::DeserializeOwned, Serialize};
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, instrument};

pub use envelope::EnvelopeKind;
pub use logical::LogicalRead;
pub use mutex::{Backoff, RetryPolicy};

/// 墓碑默认过期时间
pub const DEFAULT_NULL_TTL: Duration = Duration::from_secs(2 * 60);

/// 默认锁键前缀
pub const DEFAULT_LOCK_PREFIX: &str = "lock:";

/// 缓存键：`prefix` 与 `id` 直接拼接，例如 `cache:shop:` + `1`
pub fn cache_key<ID: Display + ?Sized>(prefix: &str, id: &ID) -> String {
    format!("{}{}", prefix, id)
}

/// 读取普通封装的结果
pub(crate) enum Cached<T> {
    Miss,
    Tombstone,
    Value(T),
}

/// 缓存客户端
///
/// 克隆开销很小，所有克隆共享同一个存储、锁协调器和重建线程池。
#[derive(Clone)]
pub struct CacheClient {
    store: Arc<dyn KeyValueStore>,
    locks: LockCoordinator,
    pool: Arc<RebuildPool>,
    clock: Arc<dyn Clock>,
    serializer: SerializerEnum,
    null_ttl: Duration,
    retry: RetryPolicy,
}

impl std::fmt::Debug for CacheClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheClient")
            .field("locks", &self.locks)
            .field("pool", &self.pool)
            .field("null_ttl", &self.null_ttl)
            .field("retry", &self.retry)
            .finish()
    }
}

/// 缓存客户端构建器
pub struct CacheClientBuilder {
    store: Arc<dyn KeyValueStore>,
    pool: Arc<RebuildPool>,
    clock: Arc<dyn Clock>,
    serializer: SerializerEnum,
    null_ttl: Duration,
    lock_prefix: String,
    lock_ttl: Duration,
    retry: RetryPolicy,
}

impl CacheClientBuilder {
    /// 注入时钟
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn serializer(mut self, serializer: SerializerEnum) -> Self {
        self.serializer = serializer;
        self
    }

    /// 墓碑过期时间
    pub fn null_ttl(mut self, ttl: Duration) -> Self {
        self.null_ttl = ttl;
        self
    }

    pub fn lock_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.lock_prefix = prefix.into();
        self
    }

    pub fn lock_ttl(mut self, ttl: Duration) -> Self {
        self.lock_ttl = ttl;
        self
    }

    /// 互斥重建默认使用的重试策略
    pub fn retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// 应用 `[cache]` 配置段
    pub fn config(self, config: &CacheConfig) -> Self {
        self.null_ttl(config.null_ttl())
            .lock_prefix(config.lock_prefix.clone())
            .lock_ttl(config.lock_ttl())
            .retry_policy(RetryPolicy::from_config(config))
    }

    pub fn build(self) -> CacheClient {
        CacheClient {
            locks: LockCoordinator::new(self.store.clone(), self.lock_prefix, self.lock_ttl),
            store: self.store,
            pool: self.pool,
            clock: self.clock,
            serializer: self.serializer,
            null_ttl: self.null_ttl,
            retry: self.retry,
        }
    }
}

impl CacheClient {
    /// 创建构建器
    ///
    /// # 参数
    ///
    /// * `store` - 键值存储
    /// * `pool` - 逻辑过期策略使用的重建线程池，由调用方持有其生命周期
    pub fn builder(store: Arc<dyn KeyValueStore>, pool: Arc<RebuildPool>) -> CacheClientBuilder {
        CacheClientBuilder {
            store,
            pool,
            clock: Arc::new(SystemClock),
            serializer: SerializerEnum::default(),
            null_ttl: DEFAULT_NULL_TTL,
            lock_prefix: DEFAULT_LOCK_PREFIX.to_string(),
            lock_ttl: DEFAULT_LOCK_TTL,
            retry: RetryPolicy::default(),
        }
    }

    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    pub fn locks(&self) -> &LockCoordinator {
        &self.locks
    }

    pub fn pool(&self) -> &Arc<RebuildPool> {
        &self.pool
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn null_ttl(&self) -> Duration {
        self.null_ttl
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// 写入普通封装
    ///
    /// 无条件覆盖已有值
    ///
    /// # 参数
    ///
    /// * `key` - 缓存键
    /// * `value` - 缓存值
    /// * `ttl` - 物理过期时间
    #[instrument(skip(self, value), level = "debug")]
    pub async fn write_plain<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> Result<()> {
        let raw = Envelope::Plain(value).encode(&self.serializer)?;
        self.store.set(key, &raw, Some(ttl)).await
    }

    /// 写入逻辑过期封装
    ///
    /// 逻辑过期时间为 `now + logical_ttl`，存储中不设置物理TTL
    #[instrument(skip(self, value), level = "debug")]
    pub async fn write_logical<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        logical_ttl: Duration,
    ) -> Result<()> {
        let expire_at = logical_deadline(self.clock.now(), logical_ttl)?;
        let raw = Envelope::Logical {
            data: value,
            expire_at,
        }
        .encode(&self.serializer)?;
        self.store.set(key, &raw, None).await
    }

    /// 写入墓碑，过期时间为客户端的墓碑TTL
    #[instrument(skip(self), level = "debug")]
    pub async fn write_tombstone(&self, key: &str) -> Result<()> {
        let raw = Envelope::<()>::Tombstone.encode(&self.serializer)?;
        self.store.set(key, &raw, Some(self.null_ttl)).await
    }

    /// 删除缓存，通常在更新数据源之后调用
    #[instrument(skip_all, level = "debug", fields(prefix = %prefix, id = %id))]
    pub async fn invalidate<ID: Display + ?Sized>(&self, prefix: &str, id: &ID) -> Result<()> {
        let key = cache_key(prefix, id);
        self.store.delete(&key).await?;
        debug!("Cache invalidated: key={}", key);
        Ok(())
    }

    fn check_ttl(&self, ttl: Duration) -> Result<()> {
        if ttl <= self.null_ttl {
            return Err(CacheError::Configuration(format!(
                "ttl {:?} must exceed tombstone ttl {:?}",
                ttl, self.null_ttl
            )));
        }
        Ok(())
    }

    pub(crate) async fn read_plain<T: DeserializeOwned>(&self, key: &str) -> Result<Cached<T>> {
        let Some(raw) = self.store.get(key).await? else {
            return Ok(Cached::Miss);
        };
        Ok(match Envelope::<T>::decode_plain(&raw, &self.serializer)? {
            Envelope::Tombstone => Cached::Tombstone,
            Envelope::Plain(value) | Envelope::Logical { data: value, .. } => Cached::Value(value),
        })
    }

    /// 调用回源加载器并记录耗时
    pub(crate) async fn load<T, ID, F, Fut, E>(
        &self,
        prefix: &str,
        strategy: &str,
        loader: F,
        id: ID,
    ) -> Result<Option<T>>
    where
        F: FnOnce(ID) -> Fut,
        Fut: Future<Output = std::result::Result<Option<T>, E>>,
        E: Into<BoxError>,
    {
        let started = Instant::now();
        let loaded = loader(id).await.map_err(CacheError::loader);
        GLOBAL_METRICS.record_load(prefix, strategy, started.elapsed().as_secs_f64());
        GLOBAL_METRICS.record_request(prefix, strategy, "load");
        loaded
    }

    /// 写入加载结果：存在写普通封装，不存在写墓碑
    pub(crate) async fn store_loaded<T: Serialize>(
        &self,
        key: &str,
        loaded: Option<&T>,
        ttl: Duration,
    ) -> Result<()> {
        match loaded {
            Some(value) => self.write_plain(key, value, ttl).await,
            None => self.write_tombstone(key).await,
        }
    }
}
