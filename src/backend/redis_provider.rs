//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了Redis连接提供者接口和默认实现。

use crate::{
    config::RedisConfig,
    error::{CacheError, Result},
};
use async_trait::async_trait;
use redis::{aio::ConnectionManager, Client};
use secrecy::ExposeSecret;
use tokio::time::{timeout, Duration};
use tracing::info;

#[async_trait]
pub trait RedisProvider: Send + Sync {
    async fn get_standalone_manager(&self, config: &RedisConfig) -> Result<ConnectionManager>;
    async fn get_cluster_client(&self, config: &RedisConfig)
        -> Result<redis::cluster::ClusterClient>;
}

pub struct DefaultRedisProvider;

impl DefaultRedisProvider {
    fn connection_string(config: &RedisConfig) -> String {
        let raw = config.connection_string.expose_secret();
        if config.enable_tls && !raw.starts_with("rediss://") {
            raw.replace("redis://", "rediss://")
        } else {
            raw.to_string()
        }
    }
}

#[async_trait]
impl RedisProvider for DefaultRedisProvider {
    async fn get_standalone_manager(&self, config: &RedisConfig) -> Result<ConnectionManager> {
        let client = Client::open(Self::connection_string(config).as_str())?;
        match timeout(
            Duration::from_millis(config.connection_timeout_ms),
            client.get_connection_manager(),
        )
        .await
        {
            Ok(res) => Ok(res?),
            Err(_) => Err(CacheError::Timeout(format!(
                "Connection timed out after {}ms",
                config.connection_timeout_ms
            ))),
        }
    }

    async fn get_cluster_client(
        &self,
        config: &RedisConfig,
    ) -> Result<redis::cluster::ClusterClient> {
        let cluster_config = config.cluster.as_ref().ok_or_else(|| {
            CacheError::Configuration("Cluster configuration is missing".to_string())
        })?;

        info!(
            "Initializing Redis cluster client with {} seed nodes",
            cluster_config.nodes.len()
        );

        let mut builder = redis::cluster::ClusterClient::builder(cluster_config.nodes.clone());
        if let Some(password) = &config.password {
            builder = builder.password(password.expose_secret().to_string());
        }
        let client = builder.build()?;

        timeout(
            Duration::from_millis(config.connection_timeout_ms),
            client.get_async_connection(),
        )
        .await
        .map_err(|_| {
            CacheError::Timeout(format!(
                "Cluster connection timed out after {}ms",
                config.connection_timeout_ms
            ))
        })??;
        Ok(client)
    }
}
