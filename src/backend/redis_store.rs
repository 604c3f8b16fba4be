//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了基于Redis的键值存储实现。

use super::redis_provider::{DefaultRedisProvider, RedisProvider};
use super::KeyValueStore;
use crate::config::{RedisConfig, RedisMode};
use crate::error::{CacheError, Result};
use async_trait::async_trait;
use redis::{aio::ConnectionManager, FromRedisValue};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

/// Redis键值存储
///
/// 单机模式复用 ConnectionManager，集群模式按命令获取连接
#[derive(Clone)]
pub enum RedisStore {
    Standalone {
        manager: ConnectionManager,
        command_timeout_ms: u64,
    },
    Cluster {
        client: redis::cluster::ClusterClient,
        command_timeout_ms: u64,
    },
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Standalone { .. } => write!(f, "RedisStore::Standalone"),
            Self::Cluster { .. } => write!(f, "RedisStore::Cluster"),
        }
    }
}

/// 毫秒精度的过期参数，Redis 不接受 0
fn ttl_millis(ttl: Duration) -> u64 {
    (ttl.as_millis() as u64).max(1)
}

impl RedisStore {
    /// 根据配置连接Redis
    #[instrument(skip(config), level = "info", name = "init_redis_store", fields(mode = ?config.mode))]
    pub async fn connect(config: &RedisConfig) -> Result<Self> {
        Self::connect_with_provider(config, Arc::new(DefaultRedisProvider)).await
    }

    /// 使用指定的Redis提供者连接
    pub async fn connect_with_provider(
        config: &RedisConfig,
        provider: Arc<dyn RedisProvider>,
    ) -> Result<Self> {
        debug!("Initializing RedisStore with mode: {:?}", config.mode);
        match config.mode {
            RedisMode::Standalone => Ok(RedisStore::Standalone {
                manager: provider.get_standalone_manager(config).await?,
                command_timeout_ms: config.command_timeout_ms,
            }),
            RedisMode::Cluster => Ok(RedisStore::Cluster {
                client: provider.get_cluster_client(config).await?,
                command_timeout_ms: config.command_timeout_ms,
            }),
        }
    }

    /// 获取命令超时时间（毫秒）
    pub fn command_timeout_ms(&self) -> u64 {
        match self {
            RedisStore::Standalone {
                command_timeout_ms, ..
            } => *command_timeout_ms,
            RedisStore::Cluster {
                command_timeout_ms, ..
            } => *command_timeout_ms,
        }
    }

    async fn query<T: FromRedisValue>(&self, cmd: &redis::Cmd) -> Result<T> {
        let fut = async {
            match self {
                RedisStore::Standalone { manager, .. } => {
                    let mut conn = manager.clone();
                    cmd.query_async::<T>(&mut conn).await
                }
                RedisStore::Cluster { client, .. } => {
                    let mut conn = client.get_async_connection().await?;
                    cmd.query_async::<T>(&mut conn).await
                }
            }
        };

        let timeout_ms = self.command_timeout_ms();
        match tokio::time::timeout(Duration::from_millis(timeout_ms), fut).await {
            Ok(res) => Ok(res?),
            Err(_) => Err(CacheError::Timeout(format!(
                "Redis command timed out after {}ms",
                timeout_ms
            ))),
        }
    }

    /// 检查连接是否正常
    #[instrument(skip(self), level = "debug")]
    pub async fn ping(&self) -> Result<()> {
        let response: String = self.query(&redis::cmd("PING")).await?;
        debug!("RedisStore ping: {}", response);
        Ok(())
    }

    /// 获取键的剩余生存时间
    ///
    /// 键不存在或没有过期时间时返回None
    #[instrument(skip(self), level = "debug")]
    pub async fn ttl(&self, key: &str) -> Result<Option<Duration>> {
        let ttl_ms: i64 = self.query(redis::cmd("PTTL").arg(key)).await?;
        if ttl_ms > 0 {
            Ok(Some(Duration::from_millis(ttl_ms as u64)))
        } else {
            Ok(None)
        }
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    #[instrument(skip(self), level = "debug")]
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.query(redis::cmd("GET").arg(key)).await
    }

    #[instrument(skip(self, value), level = "debug", fields(value_len = value.len()))]
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        if let Some(ttl) = ttl {
            cmd.arg("PX").arg(ttl_millis(ttl));
        }
        let _: () = self.query(&cmd).await?;
        Ok(())
    }

    #[instrument(skip(self, value), level = "debug")]
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool> {
        let result: Option<String> = self
            .query(
                redis::cmd("SET")
                    .arg(key)
                    .arg(value)
                    .arg("NX")
                    .arg("PX")
                    .arg(ttl_millis(ttl)),
            )
            .await?;
        debug!(
            "set_if_absent result: key={}, success={}",
            key,
            result.is_some()
        );
        Ok(result.is_some())
    }

    #[instrument(skip(self), level = "debug")]
    async fn incr(&self, key: &str) -> Result<i64> {
        self.query(redis::cmd("INCR").arg(key)).await
    }

    #[instrument(skip(self), level = "debug")]
    async fn delete(&self, key: &str) -> Result<()> {
        let _: i64 = self.query(redis::cmd("DEL").arg(key)).await?;
        Ok(())
    }
}
