//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了缓存失效命令的实现。

use crate::cli::InvalidateArgs;
use crate::client::cache_key;
use crate::manager::CacheManager;
use anyhow::{Context, Result};

pub async fn execute(manager: &CacheManager, args: &InvalidateArgs) -> Result<()> {
    manager
        .client()
        .invalidate(&args.prefix, args.id.as_str())
        .await
        .with_context(|| format!("Failed to invalidate {}{}", args.prefix, args.id))?;
    println!("Invalidated {}", cache_key(&args.prefix, args.id.as_str()));
    Ok(())
}
