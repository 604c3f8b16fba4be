//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块是缓存管理工具的入口点。

use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    cacheguard::telemetry::init_tracing("cacheguard", "cacheguard=warn");
    let outcome = cacheguard::cli::run().await;
    cacheguard::telemetry::shutdown_tracing();
    outcome
}
