//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 穿透保护读取策略。

use super::{cache_key, CacheClient, Cached};
use crate::error::{BoxError, Result};
use crate::metrics::GLOBAL_METRICS;
use serde::{de::DeserializeOwned, Serialize};
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, instrument};

pub(crate) const STRATEGY: &str = "pass_through";

impl CacheClient {
    /// 读取缓存，未命中时回源并写回
    ///
    /// 回源结果为空时写入墓碑，墓碑有效期内的后续读取不再调用加载器。
    /// 同一个冷键上的并发首次未命中不做同步，每个调用方可能各自回源一次。
    ///
    /// # 参数
    ///
    /// * `prefix` - 缓存键前缀
    /// * `id` - 业务ID，同时作为加载器参数
    /// * `loader` - 回源加载器
    /// * `ttl` - 普通值的物理过期时间，必须大于墓碑过期时间
    ///
    /// # 返回值
    ///
    /// 值存在返回 `Some`，墓碑命中或数据源中不存在返回 `None`；
    /// 加载器的错误以 `CacheError::Loader` 原样返回
    #[instrument(skip_all, level = "debug", fields(prefix = %prefix, id = %id))]
    pub async fn get_or_load<T, ID, F, Fut, E>(
        &self,
        prefix: &str,
        id: ID,
        loader: F,
        ttl: Duration,
    ) -> Result<Option<T>>
    where
        T: Serialize + DeserializeOwned,
        ID: Display,
        F: FnOnce(ID) -> Fut,
        Fut: Future<Output = std::result::Result<Option<T>, E>>,
        E: Into<BoxError>,
    {
        self.check_ttl(ttl)?;
        let key = cache_key(prefix, &id);

        match self.read_plain::<T>(&key).await? {
            Cached::Value(value) => {
                GLOBAL_METRICS.record_request(prefix, STRATEGY, "hit");
                return Ok(Some(value));
            }
            Cached::Tombstone => {
                GLOBAL_METRICS.record_request(prefix, STRATEGY, "tombstone");
                debug!("Tombstone hit: key={}", key);
                return Ok(None);
            }
            Cached::Miss => {
                GLOBAL_METRICS.record_request(prefix, STRATEGY, "miss");
            }
        }

        let loaded = self.load(prefix, STRATEGY, loader, id).await?;
        self.store_loaded(&key, loaded.as_ref(), ttl).await?;
        debug!(
            "Cache populated: key={}, present={}",
            key,
            loaded.is_some()
        );
        Ok(loaded)
    }
}
