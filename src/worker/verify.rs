//! Verification job
//!
//! Moves `NotStable` swaps into a verified or rejected status. Transient
//! connector failures leave the swap untouched so a later pass retries it.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::job::{JobSettings, StageHandler};
use super::now_unix;
use crate::bridge::{ChainConnector, RouterBridges, SwapTxInfo, SwapType, VerifyArgs};
use crate::error::SwapError;
use crate::policy::PolicyEngine;
use crate::storage::{MatchStatus, SwapKey, SwapRecord, SwapStatus, SwapStore};

/// Minimum time between two missing-bridge warnings for the same chain.
pub const MISSING_BRIDGE_WARN_INTERVAL: Duration = Duration::from_secs(600);

pub const VERIFY_JOB_NAME: &str = "verify";

pub struct VerifyHandler {
    store: Arc<dyn SwapStore>,
    policy: Arc<dyn PolicyEngine>,
    bridges: Arc<RouterBridges>,
    settings: JobSettings,
    /// chain ID -> last missing-bridge warning
    missing_bridge_warned: Mutex<HashMap<u64, Instant>>,
}

impl VerifyHandler {
    pub fn new(
        store: Arc<dyn SwapStore>,
        policy: Arc<dyn PolicyEngine>,
        bridges: Arc<RouterBridges>,
        settings: JobSettings,
    ) -> Self {
        Self {
            store,
            policy,
            bridges,
            settings,
            missing_bridge_warned: Mutex::new(HashMap::new()),
        }
    }

    /// Verifies one `NotStable` swap and persists the resulting status.
    ///
    /// Returns the verification outcome. Store failures are logged and never
    /// returned in its place.
    pub async fn process_router_swap_verify(&self, swap: &SwapRecord) -> Result<(), SwapError> {
        let key = &swap.key;

        if let Some(reason) = self
            .policy
            .check_blacklist(key.from_chain_id, swap.to_chain_id, &swap.token_id)
        {
            let err = SwapError::SwapInBlacklist(reason);
            self.persist_status(key, SwapStatus::InBlacklist, &err.to_string()).await;
            return Err(err);
        }

        let bridge = match self.bridges.get_bridge_by_chain_id(key.from_chain_id).await {
            Some(bridge) => bridge,
            None => {
                self.warn_missing_bridge(key.from_chain_id).await;
                return Err(SwapError::NoBridgeForChainId(key.from_chain_id));
            }
        };

        let args = VerifyArgs {
            swap_type: swap.swap_type,
            log_index: key.log_index,
            allow_unstable: false,
        };

        match bridge.verify_transaction(&key.txid, &args).await {
            Ok(info) => self.update_verified_swap(key, bridge.as_ref(), &info).await,
            Err(e) => {
                if let Some(status) = e.verify_failure_status() {
                    self.persist_status(key, status, &e.to_string()).await;
                }
                Err(e)
            }
        }
    }

    async fn update_verified_swap(
        &self,
        key: &SwapKey,
        bridge: &dyn ChainConnector,
        info: &SwapTxInfo,
    ) -> Result<(), SwapError> {
        let status = match self.classify_verified(bridge, info) {
            Ok(status) => status,
            Err(e) => {
                self.persist_status(key, SwapStatus::MissingTokenConfig, &e.to_string()).await;
                return Err(e);
            }
        };

        if self.persist_status(key, status, "").await && status == SwapStatus::NotSwapped {
            if let Err(e) = self
                .store
                .add_initial_swap_result(info, MatchStatus::MatchTxEmpty, now_unix())
                .await
            {
                error!(
                    chainid = key.from_chain_id,
                    txid = %key.txid,
                    logindex = key.log_index,
                    "add initial swap result failed: {}",
                    e
                );
            }
        }
        Ok(())
    }

    /// `NotSwapped`, or `WithBigValue` when an ERC20 swap exceeds the
    /// threshold and its target is not whitelisted.
    fn classify_verified(&self, bridge: &dyn ChainConnector, info: &SwapTxInfo) -> Result<SwapStatus, SwapError> {
        if info.swap_type != SwapType::Erc20Swap {
            return Ok(SwapStatus::NotSwapped);
        }

        let token = bridge.token_config(&info.token).ok_or_else(|| {
            SwapError::MissTokenConfig(format!("token {} on chain {}", info.token, info.from_chain_id))
        })?;
        let threshold = self
            .policy
            .big_value_threshold(&info.token_id, info.to_chain_id, token.decimals);

        if info.value > threshold && !self.policy.is_in_big_value_whitelist(&info.token_id, &info.tx_to) {
            Ok(SwapStatus::WithBigValue)
        } else {
            Ok(SwapStatus::NotSwapped)
        }
    }

    /// Returns true if the status was written.
    async fn persist_status(&self, key: &SwapKey, status: SwapStatus, memo: &str) -> bool {
        match self.store.update_swap_status(key, status, now_unix(), memo).await {
            Ok(()) => {
                debug!("Swap {} moved to {}", key, status);
                true
            }
            Err(e) => {
                error!(
                    chainid = key.from_chain_id,
                    txid = %key.txid,
                    logindex = key.log_index,
                    "update swap status to {} failed: {}",
                    status,
                    e
                );
                false
            }
        }
    }

    async fn warn_missing_bridge(&self, chain_id: u64) {
        let mut warned = self.missing_bridge_warned.lock().await;
        let due = warned
            .get(&chain_id)
            .map_or(true, |last| last.elapsed() >= MISSING_BRIDGE_WARN_INTERVAL);
        if due {
            warn!("No bridge for chain {}, swaps from it stay unverified", chain_id);
            warned.insert(chain_id, Instant::now());
        }
    }
}

#[async_trait]
impl StageHandler for VerifyHandler {
    fn job_name(&self) -> &str {
        VERIFY_JOB_NAME
    }

    fn input_status(&self) -> SwapStatus {
        SwapStatus::NotStable
    }

    fn settings(&self) -> JobSettings {
        self.settings
    }

    async fn process(&self, swap: &SwapRecord) -> Result<(), SwapError> {
        self.process_router_swap_verify(swap).await
    }

    fn report(&self, swap: &SwapRecord, err: &SwapError) {
        let key = &swap.key;
        match err {
            e if e.is_transient() => debug!("Swap {} not ready: {}", key, e),
            SwapError::NoBridgeForChainId(_) => debug!("Swap {} skipped: {}", key, err),
            SwapError::SwapInBlacklist(_) => info!("Swap {} rejected: {}", key, err),
            e if e.is_content_rejection() => warn!("Swap {} rejected: {}", key, e),
            _ => error!(
                chainid = key.from_chain_id,
                txid = %key.txid,
                logindex = key.log_index,
                "verify router swap failed: {}",
                err
            ),
        }
    }
}
