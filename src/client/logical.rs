//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 逻辑过期读取策略：过期后立即返回旧值，由重建线程池在后台刷新。

use super::envelope::Envelope;
use super::{cache_key, CacheClient};
use crate::error::{BoxError, Result};
use crate::metrics::GLOBAL_METRICS;
use crate::sync::rebuild_pool::RebuildHandle;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

pub(crate) const STRATEGY: &str = "logical";

/// 逻辑过期读取结果
#[derive(Debug)]
pub enum LogicalRead<T> {
    /// 未过期
    Fresh(T),
    /// 已过期的旧值
    ///
    /// `rebuild` 仅在本次调用提交了重建任务时存在
    Stale {
        value: T,
        rebuild: Option<RebuildHandle>,
    },
    /// 键不存在或为墓碑
    Absent,
}

impl<T> LogicalRead<T> {
    pub fn value(&self) -> Option<&T> {
        match self {
            LogicalRead::Fresh(value) | LogicalRead::Stale { value, .. } => Some(value),
            LogicalRead::Absent => None,
        }
    }

    pub fn into_value(self) -> Option<T> {
        match self {
            LogicalRead::Fresh(value) | LogicalRead::Stale { value, .. } => Some(value),
            LogicalRead::Absent => None,
        }
    }

    pub fn is_stale(&self) -> bool {
        matches!(self, LogicalRead::Stale { .. })
    }

    /// 取出本次调用提交的重建任务句柄
    pub fn take_rebuild(&mut self) -> Option<RebuildHandle> {
        match self {
            LogicalRead::Stale { rebuild, .. } => rebuild.take(),
            _ => None,
        }
    }
}

impl CacheClient {
    /// 读取逻辑过期缓存
    ///
    /// 该策略不会填充冷键，键需要事先通过 [`CacheClient::write_logical`]、
    /// 预热或普通读取策略写入（普通值按已过期处理）。未过期直接返回；已过期时尝试获取锁，获得锁则向重建
    /// 线程池提交刷新任务（任务结束后总会释放锁），无论是否获得锁本次
    /// 调用都立即返回旧值。
    ///
    /// 加载器返回空时写入墓碑，此后读取为 `Absent`。
    ///
    /// # 参数
    ///
    /// * `prefix` - 缓存键前缀
    /// * `id` - 业务ID
    /// * `loader` - 回源加载器，在线程池中执行
    /// * `logical_ttl` - 刷新后的逻辑过期时长
    #[instrument(skip_all, level = "debug", fields(prefix = %prefix, id = %id))]
    pub async fn get_stale_or_refresh<T, ID, F, Fut, E>(
        &self,
        prefix: &str,
        id: ID,
        loader: F,
        logical_ttl: Duration,
    ) -> Result<LogicalRead<T>>
    where
        T: Serialize + DeserializeOwned + Send + Sync + 'static,
        ID: Display + Send + 'static,
        F: FnOnce(ID) -> Fut + Send + 'static,
        Fut: Future<Output = std::result::Result<Option<T>, E>> + Send + 'static,
        E: Into<BoxError> + Send + 'static,
    {
        let key = cache_key(prefix, &id);

        let Some((value, expire_at)) = self.read_logical::<T>(&key).await? else {
            GLOBAL_METRICS.record_request(prefix, STRATEGY, "absent");
            return Ok(LogicalRead::Absent);
        };
        if expire_at > self.clock.now() {
            GLOBAL_METRICS.record_request(prefix, STRATEGY, "hit");
            return Ok(LogicalRead::Fresh(value));
        }

        let lock_key = self.locks.lock_key(&key);
        if !self.locks.try_lock(&lock_key).await? {
            GLOBAL_METRICS.record_request(prefix, STRATEGY, "lock_busy");
            return Ok(LogicalRead::Stale {
                value,
                rebuild: None,
            });
        }

        match self.read_logical::<T>(&key).await {
            Ok(Some((current, expire_at))) if expire_at > self.clock.now() => {
                self.locks.release_quietly(&lock_key).await;
                GLOBAL_METRICS.record_request(prefix, STRATEGY, "hit");
                return Ok(LogicalRead::Fresh(current));
            }
            Ok(Some(_)) => {}
            Ok(None) => {
                // 持锁期间键被删除，不替调用方填充冷键
                self.locks.release_quietly(&lock_key).await;
                return Ok(LogicalRead::Stale {
                    value,
                    rebuild: None,
                });
            }
            Err(e) => {
                self.locks.release_quietly(&lock_key).await;
                return Err(e);
            }
        }

        GLOBAL_METRICS.record_request(prefix, STRATEGY, "stale");
        let client = self.clone();
        let task_key = key.clone();
        let task_prefix = prefix.to_string();
        let task = async move {
            let loaded = client.load(&task_prefix, STRATEGY, loader, id).await;
            let written = match loaded {
                Ok(Some(fresh)) => client.write_logical(&task_key, &fresh, logical_ttl).await,
                Ok(None) => client.write_tombstone(&task_key).await,
                Err(e) => Err(e),
            };
            if written.is_err() {
                GLOBAL_METRICS.record_request(&task_prefix, STRATEGY, "rebuild_failed");
            }
            written
        };
        let locks = self.locks.clone();
        let cleanup = async move { locks.release_quietly(&lock_key).await };

        match self.pool.submit(&key, task, cleanup).await {
            Ok(handle) => {
                GLOBAL_METRICS.record_request(prefix, STRATEGY, "rebuild_submitted");
                info!("Logical rebuild submitted: key={}", key);
                Ok(LogicalRead::Stale {
                    value,
                    rebuild: Some(handle),
                })
            }
            Err(e) => {
                GLOBAL_METRICS.record_request(prefix, STRATEGY, "rebuild_rejected");
                warn!("Logical rebuild not scheduled: key={}, error={}", key, e);
                Ok(LogicalRead::Stale {
                    value,
                    rebuild: None,
                })
            }
        }
    }

    /// 读取逻辑封装，键不存在或为墓碑时返回None
    async fn read_logical<T: DeserializeOwned>(
        &self,
        key: &str,
    ) -> Result<Option<(T, DateTime<Utc>)>> {
        let Some(raw) = self.store.get(key).await? else {
            return Ok(None);
        };
        match Envelope::<T>::decode_logical(&raw, &self.serializer)? {
            Envelope::Logical { data, expire_at } => Ok(Some((data, expire_at))),
            // 普通读取策略写入的值视为已过期，刷新后改写为逻辑封装
            Envelope::Plain(data) => Ok(Some((data, self.clock.now()))),
            Envelope::Tombstone => {
                debug!("Tombstone read as absent: key={}", key);
                Ok(None)
            }
        }
    }
}
