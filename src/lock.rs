//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了缓存重建使用的互斥锁协调器。
//!
//! 锁是存储中的一个短TTL键：存在即被持有。获取只尝试一次，不可重入，
//! 也没有防护令牌（fencing token）。释放是无条件删除，因此如果持有者
//! 运行时间超过锁TTL，锁可能已被他人重新获取，此时迟到的重建结果
//! 仍可能覆盖较新的结果。
//!
//! 锁键为锁前缀加完整缓存键：缓存键 `<prefix><id>`（如 `cache:shop:1`）
//! 对应锁键 `lock:cache:shop:1`，即数据模型中的 `lock:<prefix>:<id>`。

use crate::backend::KeyValueStore;
use crate::error::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// 默认锁过期时间
pub const DEFAULT_LOCK_TTL: Duration = Duration::from_secs(10);

/// 互斥锁协调器
#[derive(Clone)]
pub struct LockCoordinator {
    store: Arc<dyn KeyValueStore>,
    prefix: String,
    ttl: Duration,
}

impl std::fmt::Debug for LockCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockCoordinator")
            .field("prefix", &self.prefix)
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl LockCoordinator {
    /// 创建锁协调器
    ///
    /// # 参数
    ///
    /// * `store` - 键值存储
    /// * `prefix` - 锁键前缀，例如 `lock:`
    /// * `ttl` - 锁的过期时间，应大于一次回源加载的预期耗时
    pub fn new(store: Arc<dyn KeyValueStore>, prefix: impl Into<String>, ttl: Duration) -> Self {
        Self {
            store,
            prefix: prefix.into(),
            ttl,
        }
    }

    /// 缓存键对应的锁键
    pub fn lock_key(&self, cache_key: &str) -> String {
        format!("{}{}", self.prefix, cache_key)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// 尝试获取锁（单次尝试）
    ///
    /// 锁值记录持有者标识，仅用于排查问题，释放时不做比对
    #[instrument(skip(self), level = "debug")]
    pub async fn try_lock(&self, lock_key: &str) -> Result<bool> {
        let holder = uuid::Uuid::new_v4().simple().to_string();
        let acquired = self
            .store
            .set_if_absent(lock_key, &holder, self.ttl)
            .await?;
        debug!(
            "Lock acquisition: key={}, acquired={}, holder={}",
            lock_key, acquired, holder
        );
        Ok(acquired)
    }

    /// 尝试获取锁，成功时返回持有锁的守卫
    pub async fn acquire(&self, lock_key: &str) -> Result<Option<LockGuard>> {
        if !self.try_lock(lock_key).await? {
            return Ok(None);
        }
        Ok(Some(LockGuard {
            locks: self.clone(),
            key: lock_key.to_string(),
            armed: true,
        }))
    }

    /// 释放锁
    #[instrument(skip(self), level = "debug")]
    pub async fn unlock(&self, lock_key: &str) -> Result<()> {
        self.store.delete(lock_key).await
    }

    /// 释放锁，失败时仅记录日志
    ///
    /// 锁TTL兜底，释放失败不影响调用方的结果
    pub async fn release_quietly(&self, lock_key: &str) {
        if let Err(e) = self.unlock(lock_key).await {
            warn!(
                "Failed to release lock {}: {} (expires within {:?})",
                lock_key, e, self.ttl
            );
        }
    }
}

/// 已获取的锁
///
/// 正常路径通过 [`LockGuard::release`] 释放。守卫在释放前被丢弃时（调用方的
/// future 被取消），锁在后台任务中释放，而不是等到TTL过期。
#[must_use = "the lock is released when the guard is dropped"]
pub struct LockGuard {
    locks: LockCoordinator,
    key: String,
    armed: bool,
}

impl LockGuard {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// 释放锁，失败时仅记录日志
    pub async fn release(mut self) {
        self.locks.release_quietly(&self.key).await;
        self.armed = false;
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let locks = self.locks.clone();
        let key = std::mem::take(&mut self.key);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                debug!("Lock guard dropped while held, releasing: key={}", key);
                handle.spawn(async move { locks.release_quietly(&key).await });
            }
            Err(_) => warn!(
                "Lock guard dropped outside a runtime, {} expires within {:?}",
                key, locks.ttl
            ),
        }
    }
}
