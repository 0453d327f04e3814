//! bcache - inspect and edit a BoundCache disk cache from the shell

mod handler;

use anyhow::{Context, Result};
use boundcache::{DiskCache, DiskCacheConfig, JsonCodec};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use crate::handler::{Command, CommandHandler};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Cache directory (defaults to <temp dir>/boundcache)
    #[arg(short, long)]
    dir: Option<PathBuf>,

    /// Maximum number of entries, 0 for unbounded
    #[arg(short, long, default_value_t = 0)]
    limit: usize,

    #[command(subcommand)]
    command: Command,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = match &args.dir {
        Some(dir) => DiskCacheConfig::new(dir),
        None => DiskCacheConfig::default(),
    }
    .count_limit(args.limit);
    let directory = config.directory().to_path_buf();

    let cache: DiskCache<String> = DiskCache::with_config(config, JsonCodec::new())
        .with_context(|| format!("Failed to open cache at {}", directory.display()))?;
    info!(directory = %directory.display(), entries = cache.count(), "cache opened");

    let handler = CommandHandler::new(&cache);
    let output = handler.handle(&args.command)?;
    if !output.is_empty() {
        println!("{}", output);
    }

    Ok(())
}
