//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了缓存系统的指标收集功能。

use lazy_static::lazy_static;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// 指标收集器
///
/// 用于收集和存储缓存系统的各种运行时指标
#[derive(Clone, Debug, Default)]
pub struct Metrics {
    /// 请求总数统计
    /// key: "prefix:strategy:result"
    pub requests_total: Arc<Mutex<HashMap<String, u64>>>,
    /// 回源加载耗时
    /// key: "prefix:strategy" -> (total_duration_secs, count)
    pub load_duration: Arc<Mutex<HashMap<String, (f64, u64)>>>,
    /// 已生成的ID数量
    /// key: 业务前缀
    pub ids_generated: Arc<Mutex<HashMap<String, u64>>>,
}

lazy_static! {
    /// 全局指标实例
    pub static ref GLOBAL_METRICS: Metrics = Metrics::default();
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

impl Metrics {
    /// 记录请求指标
    ///
    /// # 参数
    ///
    /// * `prefix` - 缓存键前缀
    /// * `strategy` - 读取策略（pass_through/mutex/logical）
    /// * `result` - 结果（hit/tombstone/miss/load/lock_busy/...）
    pub fn record_request(&self, prefix: &str, strategy: &str, result: &str) {
        let key = format!("{}:{}:{}", prefix, strategy, result);
        *lock(&self.requests_total).entry(key).or_insert(0) += 1;
    }

    /// 记录回源加载耗时
    pub fn record_load(&self, prefix: &str, strategy: &str, duration_secs: f64) {
        let key = format!("{}:{}", prefix, strategy);
        let mut map = lock(&self.load_duration);
        let entry = map.entry(key).or_insert((0.0, 0));
        entry.0 += duration_secs;
        entry.1 += 1;
    }

    /// 记录一次ID生成
    pub fn record_id(&self, business_prefix: &str) {
        *lock(&self.ids_generated)
            .entry(business_prefix.to_string())
            .or_insert(0) += 1;
    }

    /// 读取请求计数
    pub fn request_count(&self, prefix: &str, strategy: &str, result: &str) -> u64 {
        let key = format!("{}:{}:{}", prefix, strategy, result);
        lock(&self.requests_total).get(&key).copied().unwrap_or(0)
    }

    /// 清空所有指标
    pub fn reset(&self) {
        lock(&self.requests_total).clear();
        lock(&self.load_duration).clear();
        lock(&self.ids_generated).clear();
    }
}

/// 获取指标字符串
///
/// 将所有指标格式化为字符串返回，用于监控系统采集
pub fn get_metrics_string() -> String {
    let metrics = &GLOBAL_METRICS;
    let reqs = lock(&metrics.requests_total);
    let loads = lock(&metrics.load_duration);
    let ids = lock(&metrics.ids_generated);

    let mut output = String::new();
    for (k, v) in reqs.iter() {
        // 前缀本身可能包含冒号，策略与结果总在最后两段
        let mut parts = k.rsplitn(3, ':');
        let (Some(result), Some(strategy), Some(prefix)) = (parts.next(), parts.next(), parts.next())
        else {
            continue;
        };
        output.push_str(&format!(
            "cache_requests_total{{prefix=\"{}\", strategy=\"{}\", result=\"{}\"}} {}\n",
            prefix, strategy, result, v
        ));
    }
    for (k, (total, count)) in loads.iter() {
        let Some((prefix, strategy)) = k.rsplit_once(':') else {
            continue;
        };
        output.push_str(&format!(
            "cache_load_duration_seconds_sum{{prefix=\"{}\", strategy=\"{}\"}} {}\n",
            prefix, strategy, total
        ));
        output.push_str(&format!(
            "cache_load_duration_seconds_count{{prefix=\"{}\", strategy=\"{}\"}} {}\n",
            prefix, strategy, count
        ));
    }
    for (k, v) in ids.iter() {
        output.push_str(&format!("id_generated_total{{prefix=\"{}\"}} {}\n", k, v));
    }
    output
}
