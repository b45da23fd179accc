//! Router Swap Service
//!
//! Verifies cross-chain swaps and drives them through the router pipeline.
//!
//! ## Overview
//!
//! The service:
//! 1. Loads chain, token and policy configuration
//! 2. Initialises one bridge per configured chain
//! 3. Starts the pipeline jobs for its role (`--server` runs the full pipeline)
//! 4. Serves the read API and swap registration
//! 5. Stops the jobs cleanly on Ctrl-C

use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use router_swap::api::ApiServer;
use router_swap::config::Config;
use router_swap::{
    start_router_swap_work, ConfigPolicy, JobSet, MemorySwapStore, RouterBridges, ShutdownSignal, WorkerContext,
};

#[derive(Parser, Debug)]
#[command(name = "router-swap", version, about = "Cross-chain router swap service")]
struct Cli {
    /// Config file path (ROUTER_CONFIG_PATH overrides it)
    #[arg(long)]
    config: Option<String>,

    /// Run as the server participant (full pipeline)
    #[arg(long)]
    server: bool,

    /// Use the testnet configuration
    #[arg(long, short = 't')]
    testnet: bool,
}

// ============================================================================
// MAIN APPLICATION ENTRY POINT
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    info!("Starting Router Swap Service");

    let config_path = Config::resolve_path(cli.config.as_deref(), cli.testnet);
    info!("Using config: {}", config_path);
    let config = Arc::new(Config::load_from(&config_path)?);
    info!("Configuration loaded successfully");

    let shutdown = ShutdownSignal::new();
    let ctx = WorkerContext {
        config: config.clone(),
        store: Arc::new(MemorySwapStore::new()),
        policy: Arc::new(ConfigPolicy::new(config.policy.clone())),
        bridges: Arc::new(RouterBridges::default()),
        shutdown: shutdown.clone(),
    };

    let jobs = start_router_swap_work(&ctx, cli.server, JobSet::default()).await?;
    info!("Started jobs: {:?}", jobs.names());

    let api_server = ApiServer::new(config, ctx.store.clone(), ctx.policy.clone(), ctx.bridges.clone(), cli.server);
    let api_task = tokio::spawn(async move {
        if let Err(e) = api_server.run().await {
            error!("API server error: {:#}", e);
        }
    });

    signal::ctrl_c().await?;
    info!("Received shutdown signal, stopping jobs...");
    shutdown.shutdown();
    jobs.wait().await;
    api_task.abort();

    info!("Router Swap Service stopped");
    Ok(())
}
