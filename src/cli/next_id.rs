//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了ID生成命令的实现。

use crate::cli::NextIdArgs;
use crate::manager::CacheManager;
use anyhow::{Context, Result};

pub async fn execute(manager: &CacheManager, args: &NextIdArgs) -> Result<()> {
    let ids = manager.id_generator();
    for _ in 0..args.count {
        let id = ids
            .next_id(&args.prefix)
            .await
            .with_context(|| format!("Failed to generate id for '{}'", args.prefix))?;
        let (at, sequence) = ids.decode(id);
        println!("{}\t{}\tseq={}", id, at.to_rfc3339(), sequence);
    }
    Ok(())
}
