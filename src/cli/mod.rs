//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了CLI命令行接口。

use crate::backend::RedisStore;
use crate::clock::SystemClock;
use crate::config::Config;
use crate::manager::CacheManager;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "cacheguard")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[arg(
        short,
        long,
        global = true,
        default_value = "cacheguard.toml",
        help = "Path to the configuration file"
    )]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(name = "next-id", about = "Generate sequential ids for a business prefix")]
    NextId(NextIdArgs),

    #[command(name = "inspect", about = "Show the raw cached envelope of a key")]
    Inspect(InspectArgs),

    #[command(name = "invalidate", about = "Delete the cached entry of an id")]
    Invalidate(InvalidateArgs),

    #[command(name = "unlock", about = "Force-release a rebuild lock")]
    Unlock(UnlockArgs),
}

#[derive(Parser, Debug)]
pub struct NextIdArgs {
    #[arg(short, long, help = "Business prefix, e.g. order")]
    pub prefix: String,

    #[arg(short = 'n', long, default_value_t = 1, help = "Number of ids to generate")]
    pub count: u32,
}

#[derive(Parser, Debug)]
pub struct InspectArgs {
    #[arg(short, long, help = "Full cache key, e.g. cache:shop:1")]
    pub key: String,
}

#[derive(Parser, Debug)]
pub struct InvalidateArgs {
    #[arg(short, long, help = "Cache key prefix, e.g. cache:shop:")]
    pub prefix: String,

    #[arg(short, long, help = "Entity id")]
    pub id: String,
}

#[derive(Parser, Debug)]
pub struct UnlockArgs {
    #[arg(short, long, help = "Cache key whose rebuild lock should be released")]
    pub key: String,
}

mod inspect;
mod invalidate;
mod next_id;
mod unlock;

pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::from_file(&cli.config)
        .with_context(|| format!("Failed to load config from {}", cli.config.display()))?;
    let store = RedisStore::connect(&config.redis)
        .await
        .context("Failed to connect to Redis")?;
    store.ping().await.context("Redis is not responding")?;
    let manager = CacheManager::with_store(config, Arc::new(store.clone()), Arc::new(SystemClock))?;

    let outcome = match &cli.command {
        Commands::NextId(args) => next_id::execute(&manager, args).await,
        Commands::Inspect(args) => inspect::execute(&store, args).await,
        Commands::Invalidate(args) => invalidate::execute(&manager, args).await,
        Commands::Unlock(args) => unlock::execute(&manager, args).await,
    };
    manager.shutdown().await;
    outcome
}
