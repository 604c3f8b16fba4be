//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了缓存键查看命令的实现。

use crate::backend::{KeyValueStore, RedisStore};
use crate::cli::InspectArgs;
use crate::client::EnvelopeKind;
use anyhow::{Context, Result};
use chrono::Utc;

pub async fn execute(store: &RedisStore, args: &InspectArgs) -> Result<()> {
    let raw = store
        .get(&args.key)
        .await
        .with_context(|| format!("Failed to read '{}'", args.key))?;
    let Some(raw) = raw else {
        println!("{}: (absent)", args.key);
        return Ok(());
    };
    let ttl = store.ttl(&args.key).await?;

    println!("=== {} ===\n", args.key);
    match EnvelopeKind::classify(&raw) {
        EnvelopeKind::Tombstone => println!("Kind:     tombstone"),
        EnvelopeKind::Plain => println!("Kind:     plain"),
        EnvelopeKind::Logical { expire_at } => {
            let state = if expire_at > Utc::now() {
                "fresh"
            } else {
                "expired"
            };
            println!("Kind:     logical ({})", state);
            println!("Expires:  {}", expire_at.to_rfc3339());
        }
    }
    match ttl {
        Some(ttl) => println!("TTL:      {:?}", ttl),
        None => println!("TTL:      none"),
    }
    println!("Value:    {}", raw);
    Ok(())
}
