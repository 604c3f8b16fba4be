//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了逻辑过期缓存的批量预热。

use crate::client::{cache_key, CacheClient};
use crate::config::WarmupConfig;
use crate::error::{BoxError, CacheError, Result};
use futures::future::join_all;
use serde::Serialize;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

/// 预热状态
#[derive(Debug, Clone, PartialEq)]
pub enum WarmupStatus {
    Pending,
    InProgress { progress: usize, total: usize },
    Completed(WarmupResult),
    Failed { error: String },
}

/// 预热结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WarmupResult {
    /// 写入逻辑封装的数量
    pub loaded: usize,
    /// 数据源中不存在、写入墓碑的数量
    pub missing: usize,
    /// 加载或写入失败的数量
    pub failed: usize,
}

impl WarmupResult {
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

/// 预热管理器
///
/// 逻辑过期策略不会填充冷键，热点键需要在使用前由它写入。
pub struct WarmupManager {
    client: CacheClient,
    config: WarmupConfig,
    status: Arc<RwLock<WarmupStatus>>,
}

impl WarmupManager {
    pub fn new(client: CacheClient, config: WarmupConfig) -> Self {
        Self {
            client,
            config,
            status: Arc::new(RwLock::new(WarmupStatus::Pending)),
        }
    }

    /// 按批加载并写入逻辑封装
    ///
    /// 同一批内的ID并发加载，批与批之间按配置间隔等待。
    ///
    /// # 参数
    ///
    /// * `prefix` - 缓存键前缀
    /// * `ids` - 需要预热的业务ID
    /// * `loader` - 回源加载器
    /// * `logical_ttl` - 逻辑过期时长
    ///
    /// # 返回值
    ///
    /// 整体超时返回 `CacheError::Timeout`，已写入的键保留
    #[instrument(skip(self, ids, loader), level = "info", fields(count = ids.len()))]
    pub async fn run_warmup<T, ID, F, Fut, E>(
        &self,
        prefix: &str,
        ids: Vec<ID>,
        loader: F,
        logical_ttl: Duration,
    ) -> Result<WarmupResult>
    where
        T: Serialize,
        ID: Display + Clone,
        F: Fn(ID) -> Fut,
        Fut: Future<Output = std::result::Result<Option<T>, E>>,
        E: Into<BoxError>,
    {
        info!(
            "Starting cache warmup: prefix={}, keys={}, batch_size={}",
            prefix,
            ids.len(),
            self.config.batch_size
        );
        let timeout = Duration::from_secs(self.config.timeout_secs);
        let outcome = tokio::time::timeout(
            timeout,
            self.warmup_inner(prefix, &ids, &loader, logical_ttl),
        )
        .await;

        match outcome {
            Ok(result) => {
                info!(
                    "Cache warmup completed: loaded={}, missing={}, failed={}",
                    result.loaded, result.missing, result.failed
                );
                *self.status.write().await = WarmupStatus::Completed(result);
                Ok(result)
            }
            Err(_) => {
                warn!(
                    "Cache warmup timed out after {} seconds",
                    self.config.timeout_secs
                );
                *self.status.write().await = WarmupStatus::Failed {
                    error: "timeout".to_string(),
                };
                Err(CacheError::Timeout(format!(
                    "warmup of {} exceeded {}s",
                    prefix, self.config.timeout_secs
                )))
            }
        }
    }

    async fn warmup_inner<T, ID, F, Fut, E>(
        &self,
        prefix: &str,
        ids: &[ID],
        loader: &F,
        logical_ttl: Duration,
    ) -> WarmupResult
    where
        T: Serialize,
        ID: Display + Clone,
        F: Fn(ID) -> Fut,
        Fut: Future<Output = std::result::Result<Option<T>, E>>,
        E: Into<BoxError>,
    {
        let mut result = WarmupResult::default();
        let total = ids.len();
        let batch_size = self.config.batch_size.max(1);
        let interval = Duration::from_millis(self.config.batch_interval_ms);

        for (index, chunk) in ids.chunks(batch_size).enumerate() {
            let batch = chunk
                .iter()
                .map(|id| self.warm_one(prefix, id.clone(), loader, logical_ttl));
            for outcome in join_all(batch).await {
                match outcome {
                    Ok(true) => result.loaded += 1,
                    Ok(false) => result.missing += 1,
                    Err(e) => {
                        warn!("Warmup entry failed: {}", e);
                        result.failed += 1;
                    }
                }
            }

            let progress = (index * batch_size + chunk.len()).min(total);
            *self.status.write().await = WarmupStatus::InProgress { progress, total };
            debug!("Warmup progress: {}/{}", progress, total);

            if !interval.is_zero() && progress < total {
                tokio::time::sleep(interval).await;
            }
        }
        result
    }

    async fn warm_one<T, ID, F, Fut, E>(
        &self,
        prefix: &str,
        id: ID,
        loader: &F,
        logical_ttl: Duration,
    ) -> Result<bool>
    where
        T: Serialize,
        ID: Display,
        F: Fn(ID) -> Fut,
        Fut: Future<Output = std::result::Result<Option<T>, E>>,
        E: Into<BoxError>,
    {
        let key = cache_key(prefix, &id);
        match loader(id).await.map_err(CacheError::loader)? {
            Some(value) => {
                self.client.write_logical(&key, &value, logical_ttl).await?;
                Ok(true)
            }
            None => {
                self.client.write_tombstone(&key).await?;
                Ok(false)
            }
        }
    }

    pub async fn get_status(&self) -> WarmupStatus {
        self.status.read().await.clone()
    }
}
