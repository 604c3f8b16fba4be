//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了缓存值在存储中的三种封装形式。
//!
//! * 墓碑：空字符串，表示已确认不存在，带较短的TTL
//! * 普通：序列化后的原始值，带物理TTL
//! * 逻辑：`{"data": <值>, "expireTime": <Unix毫秒>}`，不带物理TTL

use crate::error::{CacheError, Result};
use crate::serialization::{Serializer, SerializerEnum};
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// 墓碑值
pub const TOMBSTONE: &str = "";

#[derive(Serialize, Deserialize)]
struct LogicalWire<T> {
    data: T,
    #[serde(rename = "expireTime", with = "chrono::serde::ts_milliseconds")]
    expire_at: DateTime<Utc>,
}

/// 缓存封装
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope<T> {
    /// 已确认不存在
    Tombstone,
    /// 普通值
    Plain(T),
    /// 带逻辑过期时间的值
    Logical { data: T, expire_at: DateTime<Utc> },
}

impl<T: Serialize> Envelope<T> {
    /// 编码为存储中的字符串
    pub fn encode(&self, serializer: &SerializerEnum) -> Result<String> {
        match self {
            Envelope::Tombstone => Ok(TOMBSTONE.to_string()),
            Envelope::Plain(value) => serializer.serialize(value),
            Envelope::Logical { data, expire_at } => serializer.serialize(&LogicalWire {
                data,
                expire_at: *expire_at,
            }),
        }
    }
}

impl<T: DeserializeOwned> Envelope<T> {
    /// 以普通形式解码
    pub fn decode_plain(raw: &str, serializer: &SerializerEnum) -> Result<Self> {
        if raw == TOMBSTONE {
            return Ok(Envelope::Tombstone);
        }
        Ok(Envelope::Plain(serializer.deserialize(raw)?))
    }

    /// 以逻辑过期形式解码
    ///
    /// 由普通读取策略写入的值没有逻辑封装，此时按普通值解码
    pub fn decode_logical(raw: &str, serializer: &SerializerEnum) -> Result<Self> {
        if raw == TOMBSTONE {
            return Ok(Envelope::Tombstone);
        }
        match serializer.deserialize::<LogicalWire<T>>(raw) {
            Ok(wire) => Ok(Envelope::Logical {
                data: wire.data,
                expire_at: wire.expire_at,
            }),
            Err(_) => Self::decode_plain(raw, serializer),
        }
    }
}

/// 无类型信息时对原始值的分类，用于排查问题
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvelopeKind {
    Tombstone,
    Plain,
    Logical { expire_at: DateTime<Utc> },
}

impl EnvelopeKind {
    /// 判断原始值的封装形式
    ///
    /// 恰好包含 `data` 与 `expireTime` 两个字段的JSON对象视为逻辑封装
    pub fn classify(raw: &str) -> Self {
        if raw == TOMBSTONE {
            return EnvelopeKind::Tombstone;
        }
        match serde_json::from_str::<serde_json::Value>(raw) {
            Ok(serde_json::Value::Object(map))
                if map.len() == 2 && map.contains_key("data") =>
            {
                map.get("expireTime")
                    .and_then(|v| v.as_i64())
                    .and_then(DateTime::<Utc>::from_timestamp_millis)
                    .map(|expire_at| EnvelopeKind::Logical { expire_at })
                    .unwrap_or(EnvelopeKind::Plain)
            }
            _ => EnvelopeKind::Plain,
        }
    }
}

pub(crate) fn logical_deadline(
    now: DateTime<Utc>,
    ttl: std::time::Duration,
) -> Result<DateTime<Utc>> {
    chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|ttl| now.checked_add_signed(ttl))
        .ok_or_else(|| CacheError::Configuration(format!("logical ttl {:?} out of range", ttl)))
}
