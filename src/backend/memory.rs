//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了进程内键值存储，基于DashMap并按注入的时钟执行TTL。

use super::KeyValueStore;
use crate::clock::{Clock, SystemClock};
use crate::error::{CacheError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

#[derive(Debug, Clone)]
struct Slot {
    value: String,
    expire_at: Option<DateTime<Utc>>,
}

impl Slot {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expire_at, Some(at) if at <= now)
    }
}

/// 内存键值存储
///
/// 过期采用惰性删除：访问时发现过期即视为不存在。
/// `set_if_absent` 与 `incr` 在分片锁内完成，满足原子性要求。
#[derive(Clone)]
pub struct MemoryStore {
    entries: Arc<DashMap<String, Slot>>,
    clock: Arc<dyn Clock>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("entries", &self.entries.len())
            .finish()
    }
}

impl MemoryStore {
    /// 使用系统时钟创建内存存储
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// 使用指定时钟创建内存存储
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            clock,
        }
    }

    /// 获取键的剩余生存时间
    ///
    /// 键不存在或没有过期时间时返回None
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let now = self.clock.now();
        let slot = self.entries.get(key)?;
        if slot.is_expired(now) {
            return None;
        }
        slot.expire_at
            .and_then(|at| (at - now).to_std().ok())
    }

    /// 未过期的键数量
    pub fn len(&self) -> usize {
        let now = self.clock.now();
        self.entries.iter().filter(|e| !e.is_expired(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn expire_at(&self, ttl: Option<Duration>) -> Result<Option<DateTime<Utc>>> {
        match ttl {
            None => Ok(None),
            Some(ttl) => {
                let ttl = chrono::Duration::from_std(ttl)
                    .map_err(|e| CacheError::Store(format!("invalid ttl {:?}: {}", ttl, e)))?;
                Ok(Some(self.clock.now() + ttl))
            }
        }
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    #[instrument(skip(self), level = "debug")]
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let now = self.clock.now();
        match self.entries.get(key) {
            Some(slot) if !slot.is_expired(now) => return Ok(Some(slot.value.clone())),
            Some(_) => {}
            None => return Ok(None),
        }
        self.entries.remove_if(key, |_, slot| slot.is_expired(now));
        debug!("Memory get: key={}, expired=true, removed", key);
        Ok(None)
    }

    #[instrument(skip(self, value), level = "debug", fields(value_len = value.len()))]
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        let slot = Slot {
            value: value.to_string(),
            expire_at: self.expire_at(ttl)?,
        };
        self.entries.insert(key.to_string(), slot);
        Ok(())
    }

    #[instrument(skip(self, value), level = "debug")]
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool> {
        let now = self.clock.now();
        let slot = Slot {
            value: value.to_string(),
            expire_at: self.expire_at(Some(ttl))?,
        };
        let acquired = match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_expired(now) {
                    occupied.insert(slot);
                    true
                } else {
                    false
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(slot);
                true
            }
        };
        debug!("Memory set_if_absent: key={}, acquired={}", key, acquired);
        Ok(acquired)
    }

    #[instrument(skip(self), level = "debug")]
    async fn incr(&self, key: &str) -> Result<i64> {
        let now = self.clock.now();
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) if !occupied.get().is_expired(now) => {
                let slot = occupied.get_mut();
                let current: i64 = slot.value.parse().map_err(|_| {
                    CacheError::Store(format!("value at '{}' is not an integer", key))
                })?;
                let next = current.checked_add(1).ok_or_else(|| {
                    CacheError::Store(format!("increment of '{}' would overflow", key))
                })?;
                slot.value = next.to_string();
                Ok(next)
            }
            Entry::Occupied(mut occupied) => {
                occupied.insert(Slot {
                    value: "1".to_string(),
                    expire_at: None,
                });
                Ok(1)
            }
            Entry::Vacant(vacant) => {
                vacant.insert(Slot {
                    value: "1".to_string(),
                    expire_at: None,
                });
                Ok(1)
            }
        }
    }

    #[instrument(skip(self), level = "debug")]
    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}
