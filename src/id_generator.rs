//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了基于存储原子自增的分布式ID生成器。
//!
//! ID布局：高32位为相对起点的秒数，低32位为当天的序列号。序列号键按
//! `<key_prefix><业务前缀>:<yyyyMMdd>` 命名，日期变化时自然切换到新键。

use crate::backend::KeyValueStore;
use crate::clock::Clock;
use crate::config::IdConfig;
use crate::error::{CacheError, Result};
use crate::metrics::GLOBAL_METRICS;
use chrono::{DateTime, NaiveDate, Utc};
use std::sync::Arc;
use tracing::{instrument, trace};

const SEQUENCE_BITS: u32 = 32;
const SEQUENCE_MASK: i64 = 0xFFFF_FFFF;

/// 分布式ID生成器
#[derive(Clone)]
pub struct DistributedIdGenerator {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    epoch_secs: i64,
    key_prefix: String,
}

impl std::fmt::Debug for DistributedIdGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DistributedIdGenerator")
            .field("epoch_secs", &self.epoch_secs)
            .field("key_prefix", &self.key_prefix)
            .finish()
    }
}

impl DistributedIdGenerator {
    /// 使用默认起点（2022-01-01T00:00:00Z）和 `seq:` 键前缀创建
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self::with_config(store, clock, &IdConfig::default())
    }

    pub fn with_config(
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        config: &IdConfig,
    ) -> Self {
        Self {
            store,
            clock,
            epoch_secs: config.epoch_secs,
            key_prefix: config.key_prefix.clone(),
        }
    }

    /// 序列号键
    ///
    /// # 参数
    ///
    /// * `prefix` - 业务前缀，例如 `order`
    /// * `date` - 日期（UTC）
    pub fn sequence_key(&self, prefix: &str, date: NaiveDate) -> String {
        format!("{}{}:{}", self.key_prefix, prefix, date.format("%Y%m%d"))
    }

    /// 生成下一个ID
    ///
    /// 自增失败、序列号超出32位或时钟早于起点时返回
    /// `CacheError::Generation`，不会退回任何默认值
    #[instrument(skip(self), level = "debug")]
    pub async fn next_id(&self, prefix: &str) -> Result<i64> {
        let now = self.clock.now();
        let key = self.sequence_key(prefix, now.date_naive());
        let fail = |source: CacheError| CacheError::Generation {
            key: key.clone(),
            source: Box::new(source),
        };

        let relative = now.timestamp() - self.epoch_secs;
        if !(0..=i64::from(i32::MAX)).contains(&relative) {
            return Err(fail(CacheError::Configuration(format!(
                "timestamp {} outside the representable range from epoch {}",
                now.timestamp(),
                self.epoch_secs
            ))));
        }

        let sequence = self.store.incr(&key).await.map_err(&fail)?;
        if !(1..=SEQUENCE_MASK).contains(&sequence) {
            return Err(fail(CacheError::Store(format!(
                "daily sequence {} exhausted",
                sequence
            ))));
        }

        GLOBAL_METRICS.record_id(prefix);
        let id = (relative << SEQUENCE_BITS) | sequence;
        trace!("Generated id {} from key {}", id, key);
        Ok(id)
    }

    /// 拆分ID为生成时间（秒精度）和序列号
    pub fn decode(&self, id: i64) -> (DateTime<Utc>, u32) {
        let relative = id >> SEQUENCE_BITS;
        let sequence = (id & SEQUENCE_MASK) as u32;
        let at = DateTime::<Utc>::from_timestamp(self.epoch_secs + relative, 0)
            .unwrap_or_default();
        (at, sequence)
    }

    /// 起点（Unix秒）
    pub fn epoch_secs(&self) -> i64 {
        self.epoch_secs
    }
}
