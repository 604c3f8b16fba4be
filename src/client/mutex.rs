//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 互斥锁同步重建读取策略，以及它使用的重试策略。

use super::{cache_key, CacheClient, Cached};
use crate::config::{BackoffKind, CacheConfig};
use crate::error::{BoxError, CacheError, Result};
use crate::metrics::GLOBAL_METRICS;
use futures::FutureExt;
use serde::{de::DeserializeOwned, Serialize};
use std::fmt::Display;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tracing::{debug, instrument, warn};

pub(crate) const STRATEGY: &str = "mutex";

/// 未获得锁时的等待方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// 每次等待固定时间
    Fixed(Duration),
    /// 从 `base` 开始每次翻倍，不超过 `max`
    Exponential { base: Duration, max: Duration },
}

impl Backoff {
    /// 第 `attempt` 次（从0开始）失败后的等待时间
    pub fn delay(&self, attempt: u32) -> Duration {
        match *self {
            Backoff::Fixed(delay) => delay,
            Backoff::Exponential { base, max } => {
                let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
                base.checked_mul(factor).unwrap_or(max).min(max)
            }
        }
    }
}

/// 互斥重建的重试策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// 最大尝试次数（包含第一次）
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 100,
            backoff: Backoff::Fixed(Duration::from_millis(50)),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Backoff) -> Self {
        Self {
            max_attempts,
            backoff,
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        let base = Duration::from_millis(config.backoff_ms);
        let backoff = match config.backoff {
            BackoffKind::Fixed => Backoff::Fixed(base),
            BackoffKind::Exponential => Backoff::Exponential {
                base,
                max: Duration::from_millis(config.max_backoff_ms),
            },
        };
        Self::new(config.max_attempts, backoff)
    }
}

impl CacheClient {
    /// 读取缓存，未命中时只允许一个调用方回源
    ///
    /// 获得锁的调用方再次检查缓存后回源、写回并释放锁（加载失败、panic
    /// 或调用方的future被取消时同样释放）；其余调用方按 `retry` 退避后从读取开始重试。
    ///
    /// # 参数
    ///
    /// * `prefix` - 缓存键前缀
    /// * `id` - 业务ID
    /// * `loader` - 回源加载器
    /// * `ttl` - 普通值的物理过期时间，必须大于墓碑过期时间
    /// * `retry` - 最大尝试次数与退避方式
    ///
    /// # 返回值
    ///
    /// 与 [`CacheClient::get_or_load`] 相同；尝试次数耗尽时返回
    /// `CacheError::LockTimeout`
    #[instrument(skip_all, level = "debug", fields(prefix = %prefix, id = %id))]
    pub async fn get_or_load_serialized<T, ID, F, Fut, E>(
        &self,
        prefix: &str,
        id: ID,
        loader: F,
        ttl: Duration,
        retry: &RetryPolicy,
    ) -> Result<Option<T>>
    where
        T: Serialize + DeserializeOwned,
        ID: Display,
        F: FnOnce(ID) -> Fut,
        Fut: Future<Output = std::result::Result<Option<T>, E>>,
        E: Into<BoxError>,
    {
        self.check_ttl(ttl)?;
        let key = cache_key(prefix, &id);
        let lock_key = self.locks.lock_key(&key);
        let max_attempts = retry.max_attempts.max(1);

        for attempt in 0..max_attempts {
            match self.read_plain::<T>(&key).await? {
                Cached::Value(value) => {
                    GLOBAL_METRICS.record_request(prefix, STRATEGY, "hit");
                    return Ok(Some(value));
                }
                Cached::Tombstone => {
                    GLOBAL_METRICS.record_request(prefix, STRATEGY, "tombstone");
                    return Ok(None);
                }
                Cached::Miss => {}
            }

            if let Some(guard) = self.locks.acquire(&lock_key).await? {
                GLOBAL_METRICS.record_request(prefix, STRATEGY, "miss");
                let outcome = AssertUnwindSafe(self.rebuild_plain(prefix, &key, id, loader, ttl))
                    .catch_unwind()
                    .await;
                guard.release().await;
                return match outcome {
                    Ok(result) => result,
                    Err(panic) => std::panic::resume_unwind(panic),
                };
            }

            GLOBAL_METRICS.record_request(prefix, STRATEGY, "lock_busy");
            if attempt + 1 < max_attempts {
                let delay = retry.backoff.delay(attempt);
                debug!(
                    "Lock busy, retrying: key={}, attempt={}, delay={:?}",
                    key,
                    attempt + 1,
                    delay
                );
                tokio::time::sleep(delay).await;
            }
        }

        GLOBAL_METRICS.record_request(prefix, STRATEGY, "timeout");
        warn!(
            "Gave up waiting for rebuild lock: key={}, attempts={}",
            key, max_attempts
        );
        Err(CacheError::LockTimeout {
            key,
            attempts: max_attempts,
        })
    }

    /// 持有锁时的重建：再次检查缓存，仍未命中才回源
    async fn rebuild_plain<T, ID, F, Fut, E>(
        &self,
        prefix: &str,
        key: &str,
        id: ID,
        loader: F,
        ttl: Duration,
    ) -> Result<Option<T>>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(ID) -> Fut,
        Fut: Future<Output = std::result::Result<Option<T>, E>>,
        E: Into<BoxError>,
    {
        match self.read_plain::<T>(key).await? {
            Cached::Value(value) => return Ok(Some(value)),
            Cached::Tombstone => return Ok(None),
            Cached::Miss => {}
        }
        let loaded = self.load(prefix, STRATEGY, loader, id).await?;
        self.store_loaded(key, loaded.as_ref(), ttl).await?;
        debug!("Rebuilt under lock: key={}, present={}", key, loaded.is_some());
        Ok(loaded)
    }
}
