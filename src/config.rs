//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了缓存系统的配置结构和解析逻辑。

use crate::error::{CacheError, Result};
use secrecy::SecretString;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

pub const CONFIG_VERSION: u32 = 1;

/// 2022-01-01T00:00:00Z，ID时间戳部分的起点
pub const DEFAULT_ID_EPOCH_SECS: i64 = 1_640_995_200;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub config_version: Option<u32>,
    pub redis: RedisConfig,
    pub cache: CacheConfig,
    pub pool: PoolConfig,
    pub id: IdConfig,
    pub warmup: WarmupConfig,
}

/// Redis模式枚举
///
/// 定义支持的Redis部署模式
#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RedisMode {
    /// 单机模式
    #[default]
    Standalone,
    /// 集群模式
    Cluster,
}

/// Redis连接配置
#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct RedisConfig {
    /// Redis模式
    pub mode: RedisMode,
    /// 连接字符串
    pub connection_string: SecretString,
    /// Redis 密码（可选，使用 SecretString 保护）
    pub password: Option<SecretString>,
    /// 是否启用 TLS
    pub enable_tls: bool,
    /// 连接超时时间（毫秒）
    pub connection_timeout_ms: u64,
    /// 命令执行超时时间（毫秒）
    pub command_timeout_ms: u64,
    /// 集群配置
    pub cluster: Option<ClusterConfig>,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            mode: RedisMode::Standalone,
            connection_string: SecretString::from("redis://127.0.0.1:6379".to_string()),
            password: None,
            enable_tls: false,
            connection_timeout_ms: 5000,
            command_timeout_ms: 3000,
            cluster: None,
        }
    }
}

/// 集群配置
#[derive(Deserialize, Clone, Debug)]
pub struct ClusterConfig {
    /// 初始节点列表
    pub nodes: Vec<String>,
}

/// 退避方式
#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    #[default]
    Fixed,
    Exponential,
}

/// 缓存策略配置
#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct CacheConfig {
    /// 普通缓存值的默认过期时间（秒）
    pub default_ttl_secs: u64,
    /// 空值（墓碑）的过期时间（秒），必须小于 `default_ttl_secs`
    pub null_ttl_secs: u64,
    /// 互斥锁的过期时间（秒）
    pub lock_ttl_secs: u64,
    /// 互斥锁键前缀
    pub lock_prefix: String,
    /// 互斥重建的最大尝试次数
    pub max_attempts: u32,
    /// 退避方式
    pub backoff: BackoffKind,
    /// 基础退避时间（毫秒）
    pub backoff_ms: u64,
    /// 指数退避上限（毫秒）
    pub max_backoff_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl_secs: 30 * 60,
            null_ttl_secs: 2 * 60,
            lock_ttl_secs: 10,
            lock_prefix: "lock:".to_string(),
            max_attempts: 100,
            backoff: BackoffKind::Fixed,
            backoff_ms: 50,
            max_backoff_ms: 1000,
        }
    }
}

impl CacheConfig {
    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_secs)
    }

    pub fn null_ttl(&self) -> Duration {
        Duration::from_secs(self.null_ttl_secs)
    }

    pub fn lock_ttl(&self) -> Duration {
        Duration::from_secs(self.lock_ttl_secs)
    }
}

/// 重建线程池配置
#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct PoolConfig {
    /// 工作任务数量
    pub workers: usize,
    /// 队列容量，满时拒绝提交
    pub queue_capacity: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: 10,
            queue_capacity: 1024,
        }
    }
}

/// ID生成器配置
#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct IdConfig {
    /// 时间戳起点（Unix秒）
    pub epoch_secs: i64,
    /// 序列号键前缀
    pub key_prefix: String,
}

impl Default for IdConfig {
    fn default() -> Self {
        Self {
            epoch_secs: DEFAULT_ID_EPOCH_SECS,
            key_prefix: "seq:".to_string(),
        }
    }
}

/// 缓存预热配置
#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct WarmupConfig {
    /// 每批并发加载的数量
    pub batch_size: usize,
    /// 批间隔（毫秒）
    pub batch_interval_ms: u64,
    /// 整体超时（秒）
    pub timeout_secs: u64,
}

impl Default for WarmupConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            batch_interval_ms: 0,
            timeout_secs: 300,
        }
    }
}

impl Config {
    /// 从TOML字符串解析配置并校验
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(text).map_err(|e| CacheError::Configuration(e.to_string()))?;
        config.validate().map_err(CacheError::Configuration)?;
        Ok(config)
    }

    /// 从TOML文件加载配置并校验
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&text)
    }

    /// 验证配置
    ///
    /// 检查配置的有效性，确保所有必需的字段都已设置，并且值在合理范围内
    pub fn validate(&self) -> std::result::Result<(), String> {
        if let Some(version) = self.config_version {
            if version > CONFIG_VERSION {
                return Err(format!(
                    "Configuration version {} is not supported. Current version is {}.",
                    version, CONFIG_VERSION
                ));
            }
        }

        let cache = &self.cache;
        if cache.default_ttl_secs == 0 {
            return Err("cache.default_ttl_secs cannot be zero".to_string());
        }
        if cache.default_ttl_secs > 86400 * 30 {
            return Err("cache.default_ttl_secs cannot exceed 30 days (2592000 seconds)".to_string());
        }
        if cache.null_ttl_secs == 0 {
            return Err("cache.null_ttl_secs cannot be zero".to_string());
        }
        if cache.null_ttl_secs >= cache.default_ttl_secs {
            return Err(format!(
                "cache.null_ttl_secs ({}) must be < cache.default_ttl_secs ({})",
                cache.null_ttl_secs, cache.default_ttl_secs
            ));
        }
        if cache.lock_ttl_secs == 0 {
            return Err("cache.lock_ttl_secs cannot be zero".to_string());
        }
        if cache.lock_prefix.is_empty() {
            return Err("cache.lock_prefix cannot be empty".to_string());
        }
        if cache.max_attempts == 0 {
            return Err("cache.max_attempts must be at least 1".to_string());
        }
        if cache.backoff == BackoffKind::Exponential && cache.max_backoff_ms < cache.backoff_ms {
            return Err(format!(
                "cache.max_backoff_ms ({}) must be >= cache.backoff_ms ({})",
                cache.max_backoff_ms, cache.backoff_ms
            ));
        }

        if self.pool.workers == 0 {
            return Err("pool.workers must be at least 1".to_string());
        }
        if self.pool.queue_capacity == 0 {
            return Err("pool.queue_capacity must be at least 1".to_string());
        }

        if self.warmup.batch_size == 0 {
            return Err("warmup.batch_size must be at least 1".to_string());
        }
        if self.warmup.timeout_secs == 0 {
            return Err("warmup.timeout_secs cannot be zero".to_string());
        }

        if self.id.key_prefix.is_empty() {
            return Err("id.key_prefix cannot be empty".to_string());
        }
        if self.id.epoch_secs < 0 {
            return Err("id.epoch_secs cannot be negative".to_string());
        }

        let redis = &self.redis;
        if !(100..=30000).contains(&redis.connection_timeout_ms) {
            return Err("redis.connection_timeout_ms must be between 100 and 30000 ms".to_string());
        }
        if !(100..=60000).contains(&redis.command_timeout_ms) {
            return Err("redis.command_timeout_ms must be between 100 and 60000 ms".to_string());
        }
        if redis.mode == RedisMode::Cluster
            && redis.cluster.as_ref().map_or(true, |c| c.nodes.is_empty())
        {
            return Err("redis.cluster.nodes is required in cluster mode".to_string());
        }

        Ok(())
    }
}
