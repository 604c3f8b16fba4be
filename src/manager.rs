//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了缓存管理器，负责按配置组装存储、客户端、线程池和ID生成器。

use crate::backend::{KeyValueStore, RedisStore};
use crate::client::CacheClient;
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::id_generator::DistributedIdGenerator;
use crate::sync::{RebuildPool, WarmupManager};
use std::sync::Arc;
use tracing::{info, instrument};

/// 缓存管理器
///
/// 由调用方创建并持有，不使用全局状态；退出前调用 [`CacheManager::shutdown`]。
pub struct CacheManager {
    config: Config,
    store: Arc<dyn KeyValueStore>,
    pool: Arc<RebuildPool>,
    client: CacheClient,
    ids: DistributedIdGenerator,
}

impl CacheManager {
    /// 按配置连接Redis并初始化
    ///
    /// # 参数
    ///
    /// * `config` - 缓存系统配置
    ///
    /// # 返回值
    ///
    /// 配置无效返回 `CacheError::Configuration`，连接失败返回对应的存储错误
    #[instrument(skip(config), level = "info", fields(mode = ?config.redis.mode))]
    pub async fn connect(config: Config) -> Result<Self> {
        config.validate().map_err(CacheError::Configuration)?;
        let store = RedisStore::connect(&config.redis).await?;
        Self::with_store(config, Arc::new(store), Arc::new(SystemClock))
    }

    /// 使用给定的存储和时钟初始化，例如 `MemoryStore`
    ///
    /// 必须在 tokio 运行时内调用
    pub fn with_store(
        config: Config,
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate().map_err(CacheError::Configuration)?;

        let pool = Arc::new(RebuildPool::new(
            config.pool.workers,
            config.pool.queue_capacity,
        ));
        let client = CacheClient::builder(store.clone(), pool.clone())
            .clock(clock.clone())
            .config(&config.cache)
            .build();
        let ids = DistributedIdGenerator::with_config(store.clone(), clock, &config.id);

        info!(
            "CacheManager initialized: workers={}, queue_capacity={}",
            config.pool.workers, config.pool.queue_capacity
        );
        Ok(Self {
            config,
            store,
            pool,
            client,
            ids,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    pub fn client(&self) -> &CacheClient {
        &self.client
    }

    pub fn id_generator(&self) -> &DistributedIdGenerator {
        &self.ids
    }

    pub fn pool(&self) -> &Arc<RebuildPool> {
        &self.pool
    }

    /// 创建使用 `[warmup]` 配置的预热管理器
    pub fn warmup_manager(&self) -> WarmupManager {
        WarmupManager::new(self.client.clone(), self.config.warmup.clone())
    }

    /// 关闭重建线程池并等待工作任务退出
    #[instrument(skip(self), level = "info")]
    pub async fn shutdown(&self) {
        self.pool.shutdown().await;
        info!("CacheManager shut down");
    }
}
