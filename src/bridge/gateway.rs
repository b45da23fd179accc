//! Gateway ordering job
//!
//! Periodically asks every connector to re-rank its RPC gateways so requests
//! go to the most up-to-date node first.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::RouterBridges;
use crate::shutdown::ShutdownSignal;

/// Runs until shutdown, re-ranking gateways every `interval`.
///
/// The registry is re-read on every pass, so a replaced registry is picked up
/// without restarting the job.
pub async fn start_adjust_gateway_order_job(
    bridges: Arc<RouterBridges>,
    interval: Duration,
    shutdown: ShutdownSignal,
) {
    info!("Starting gateway ordering job");

    loop {
        let registry = bridges.snapshot().await;
        for connector in registry.connectors() {
            if shutdown.is_shutting_down() {
                info!("Gateway ordering job stopped");
                return;
            }
            connector.adjust_gateway_order().await;
            debug!("Adjusted gateways of chain {}", connector.chain_id());
        }

        if shutdown.sleep(interval).await {
            info!("Gateway ordering job stopped");
            return;
        }
    }
}
