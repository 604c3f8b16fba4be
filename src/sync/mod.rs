//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了缓存的后台机制，包括异步重建线程池和批量预热。

pub mod rebuild_pool;
pub mod warmup;

pub use rebuild_pool::{PoolStats, RebuildHandle, RebuildPool};
pub use warmup::{WarmupManager, WarmupResult, WarmupStatus};
