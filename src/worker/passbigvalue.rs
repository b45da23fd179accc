//! Big-value pass-through job
//!
//! Releases `WithBigValue` swaps into `NotSwapped` once they have been held for
//! the configured time and still verify.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::job::{JobSettings, StageHandler};
use super::now_unix;
use crate::bridge::{RouterBridges, VerifyArgs};
use crate::error::SwapError;
use crate::storage::{MatchStatus, SwapRecord, SwapStatus, SwapStore};

pub const PASS_BIG_VALUE_JOB_NAME: &str = "passbigvalue";

pub struct PassBigValueHandler {
    store: Arc<dyn SwapStore>,
    bridges: Arc<RouterBridges>,
    settings: JobSettings,
    /// Hold time in seconds; zero disables the job
    time_required: u64,
}

impl PassBigValueHandler {
    pub fn new(
        store: Arc<dyn SwapStore>,
        bridges: Arc<RouterBridges>,
        settings: JobSettings,
        time_required: u64,
    ) -> Self {
        Self {
            store,
            bridges,
            settings,
            time_required,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.time_required > 0
    }

    async fn pass_big_value_swap(&self, swap: &SwapRecord) -> Result<(), SwapError> {
        let key = &swap.key;
        let bridge = self
            .bridges
            .get_bridge_by_chain_id(key.from_chain_id)
            .await
            .ok_or(SwapError::NoBridgeForChainId(key.from_chain_id))?;

        let args = VerifyArgs {
            swap_type: swap.swap_type,
            log_index: key.log_index,
            allow_unstable: false,
        };
        let info = bridge.verify_transaction(&key.txid, &args).await?;

        let now = now_unix();
        if let Err(e) = self
            .store
            .update_swap_status(key, SwapStatus::NotSwapped, now, "")
            .await
        {
            error!("{}: update swap {} failed: {}", PASS_BIG_VALUE_JOB_NAME, key, e);
            return Ok(());
        }
        info!("Passed big value swap {}", key);

        if let Err(e) = self
            .store
            .add_initial_swap_result(&info, MatchStatus::MatchTxEmpty, now)
            .await
        {
            error!("{}: add initial swap result {} failed: {}", PASS_BIG_VALUE_JOB_NAME, key, e);
        }
        Ok(())
    }
}

#[async_trait]
impl StageHandler for PassBigValueHandler {
    fn job_name(&self) -> &str {
        PASS_BIG_VALUE_JOB_NAME
    }

    fn input_status(&self) -> SwapStatus {
        SwapStatus::WithBigValue
    }

    fn settings(&self) -> JobSettings {
        self.settings
    }

    async fn process(&self, swap: &SwapRecord) -> Result<(), SwapError> {
        if !self.is_enabled() {
            return Ok(());
        }
        if now_unix().saturating_sub(swap.init_time) < self.time_required {
            return Ok(());
        }
        self.pass_big_value_swap(swap).await
    }

    fn report(&self, swap: &SwapRecord, err: &SwapError) {
        if err.is_transient() {
            debug!("Big value swap {} not passed: {}", swap.key, err);
        } else {
            warn!("Big value swap {} not passed: {}", swap.key, err);
        }
    }
}
