//! Chart-of-Accounts API Server
//!
//! Binds the axum router with the HTTP upstream source and the filesystem
//! durable cache, configured from the environment.
//!
//! # Usage
//!
//! ```bash
//! COA_ORG=my-org COA_USERNAME=api-user COA_PASSWORD=... cargo run
//! cargo run -- --bind 127.0.0.1:8080 --log debug
//! ```
//!
//! # Exit Codes
//!
//! - 0: Clean shutdown
//! - 1: Startup error (missing configuration, bind failure, etc.)

use std::process;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use coa_api::{cli, router, AppConfig, AppState, ChartService, FsCache, HttpAccountSource};

#[tokio::main]
async fn main() {
    let args = cli::parse_args();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log)),
        )
        .init();

    if let Err(e) = run(args).await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

async fn run(args: cli::CliArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::from_env()?;
    if let Some(bind) = args.bind {
        config.bind = bind;
    }
    if let Some(cache_dir) = args.cache_dir {
        config.cache_dir = cache_dir;
    }

    let source = HttpAccountSource::new(config.upstream.clone())?;
    let cache = FsCache::new(&config.cache_dir);
    let service = ChartService::new(
        source,
        cache,
        config.cache_key.clone(),
        Duration::from_secs(config.fetch_timeout_secs),
        config.transform.clone(),
    );

    let state = AppState {
        service: Arc::new(service),
        ttl_secs: config.ttl_secs,
        stale_ttl_secs: config.stale_ttl_secs,
    };

    let listener = tokio::net::TcpListener::bind(&config.bind).await?;
    tracing::info!(bind = %config.bind, cache_dir = %config.cache_dir, "serving chart of accounts");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to install shutdown handler");
    }
}
