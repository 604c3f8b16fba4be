//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了强制释放重建锁命令的实现。

use crate::cli::UnlockArgs;
use crate::manager::CacheManager;
use anyhow::{Context, Result};

pub async fn execute(manager: &CacheManager, args: &UnlockArgs) -> Result<()> {
    let locks = manager.client().locks();
    let lock_key = locks.lock_key(&args.key);
    let held = manager
        .store()
        .get(&lock_key)
        .await
        .with_context(|| format!("Failed to read '{}'", lock_key))?;

    match held {
        Some(holder) => {
            locks.unlock(&lock_key).await?;
            println!("Released {} (holder {})", lock_key, holder);
        }
        None => println!("{} is not held", lock_key),
    }
    Ok(())
}
