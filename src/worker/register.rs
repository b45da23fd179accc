//! Swap registration
//!
//! Entry point for new swaps: the transaction is checked (finality not
//! required) and recorded as `NotStable` for the verification job.

use tracing::info;

use super::now_unix;
use crate::bridge::{RouterBridges, SwapType, VerifyArgs};
use crate::error::{RegisterError, SwapError, StoreError};
use crate::storage::{SwapKey, SwapRecord, SwapStore};

/// Outcome of a registration request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registration {
    /// A new `NotStable` record was created
    Registered(SwapRecord),
    /// The swap was already known; returned unchanged
    Existing(SwapRecord),
}

impl Registration {
    pub fn record(&self) -> &SwapRecord {
        match self {
            Registration::Registered(record) | Registration::Existing(record) => record,
        }
    }
}

/// Registers the swap at (`chain_id`, `txid`, `log_index`).
///
/// Blacklisted swaps are registered as well; the verification job rejects them.
pub async fn register_swap(
    store: &dyn SwapStore,
    bridges: &RouterBridges,
    chain_id: u64,
    txid: &str,
    log_index: u32,
    swap_type: SwapType,
) -> Result<Registration, RegisterError> {
    if let Some(existing) = store.get_swap(&SwapKey::new(chain_id, txid, log_index)).await? {
        return Ok(Registration::Existing(existing));
    }

    let bridge = bridges
        .get_bridge_by_chain_id(chain_id)
        .await
        .ok_or(SwapError::NoBridgeForChainId(chain_id))?;

    let args = VerifyArgs {
        swap_type,
        log_index,
        allow_unstable: true,
    };
    let info = bridge.verify_transaction(txid, &args).await?;

    let record = SwapRecord::from_swap_info(&info, now_unix());
    match store.add_swap(record.clone()).await {
        Ok(()) => {
            info!("Registered swap {}", record.key);
            Ok(Registration::Registered(record))
        }
        Err(StoreError::AlreadyExists) => {
            let existing = store.get_swap(&record.key).await?.ok_or(StoreError::NotFound)?;
            Ok(Registration::Existing(existing))
        }
        Err(e) => Err(e.into()),
    }
}
