//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了可注入的时钟，用于逻辑过期判断和ID生成。

use chrono::{DateTime, Duration, Utc};
use std::sync::Mutex;

/// 时钟特征
pub trait Clock: Send + Sync {
    /// 当前时间（UTC）
    fn now(&self) -> DateTime<Utc>;
}

/// 系统时钟
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// 手动推进的时钟
///
/// 主要用于测试逻辑过期、墓碑TTL以及跨日的序列号切换。
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// 将时钟设置到指定时间
    pub fn set(&self, at: DateTime<Utc>) {
        *self.lock() = at;
    }

    /// 推进时钟
    pub fn advance(&self, by: Duration) {
        let mut now = self.lock();
        *now += by;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, DateTime<Utc>> {
        self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.lock()
    }
}
