//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了缓存系统的错误类型和处理机制。

use thiserror::Error;

/// 回源加载器可能返回的任意错误
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// 缓存系统错误类型枚举
///
/// "未找到"不是错误：读策略通过 `Ok(None)` 或 `LogicalRead::Absent` 表达。
#[derive(Error, Debug)]
pub enum CacheError {
    /// 序列化错误
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// 键值存储操作失败
    #[error("Store operation failed: {0}")]
    Store(String),

    /// Redis错误
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// 回源加载器失败，原始错误保留在 `source()` 中
    #[error("Backing store error: {0}")]
    Loader(#[source] BoxError),

    /// 互斥重建在重试次数耗尽后仍未获得锁
    #[error("Lock on '{key}' not acquired after {attempts} attempts")]
    LockTimeout { key: String, attempts: u32 },

    /// ID生成失败
    #[error("Id generation failed for '{key}': {source}")]
    Generation {
        key: String,
        #[source]
        source: Box<CacheError>,
    },

    /// 重建线程池队列已满
    #[error("Rebuild pool saturated (queue capacity {capacity})")]
    PoolSaturated { capacity: usize },

    /// 重建线程池已关闭
    #[error("Rebuild pool is shut down")]
    PoolClosed,

    /// 重建任务被取消
    #[error("Rebuild task for '{0}' was cancelled")]
    RebuildCancelled(String),

    /// 重建任务发生panic
    #[error("Rebuild task for '{key}' panicked: {message}")]
    RebuildPanicked { key: String, message: String },

    /// 配置错误
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// 超时错误
    #[error("Timeout error: {0}")]
    Timeout(String),

    /// IO错误
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CacheError {
    /// 包装回源加载器返回的错误
    pub fn loader<E: Into<BoxError>>(err: E) -> Self {
        CacheError::Loader(err.into())
    }

    /// 是否为回源加载器错误
    pub fn is_loader(&self) -> bool {
        matches!(self, CacheError::Loader(_))
    }
}

/// 缓存操作结果类型别名
///
/// 简化错误处理，所有缓存操作都返回此类型
pub type Result<T> = std::result::Result<T, CacheError>;
