//! Wick storefront server.
//!
//! ```text
//! wick --config config/wick.toml --port 9000
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;

use wick_storefront::config::{ConfigOverrides, StorefrontConfig};
use wick_storefront::{api, telemetry, AppContext};

/// Wick - customizable candle storefront
#[derive(Parser)]
#[command(name = "wick")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config file path (TOML or JSON)
    #[arg(short, long, env = "WICK_CONFIG")]
    config: Option<PathBuf>,

    #[command(flatten)]
    overrides: ConfigOverrides,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => StorefrontConfig::load(path)?,
        None => StorefrontConfig::default(),
    }
    .with_overrides(&cli.overrides)?;

    telemetry::init(&config.logging);
    if cli.config.is_none() {
        tracing::info!("no config file given; using defaults");
    }

    let addr = config.bind_addr()?;
    let ctx = AppContext::from_config(config);
    let seeded = ctx.seed_catalog().await?;
    tracing::info!(products = seeded, "catalog loaded");
    let _sweeper = ctx.spawn_sweeper();

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, "storefront listening");

    axum::serve(listener, api::router(ctx))
        .await
        .context("server error")?;
    Ok(())
}
