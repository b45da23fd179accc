//! Storage Module
//!
//! The `SwapStore` trait is the only synchronization point between pipeline
//! jobs: each job reads a batch for the status it owns and writes results back
//! keyed by the record identity.

use async_trait::async_trait;

use crate::bridge::SwapTxInfo;
use crate::error::StoreError;

pub mod swaps;

// Re-export for convenience
pub use swaps::{
    MatchStatus, MemorySwapStore, SwapKey, SwapRecord, SwapResult, SwapStatus,
    DEFAULT_HISTORY_LIMIT, MAX_HISTORY_LIMIT,
};

/// Durable repository of swap records.
#[async_trait]
pub trait SwapStore: Send + Sync {
    /// Records in `status` created at or after `since` (unix seconds).
    async fn find_swaps_with_status(
        &self,
        status: SwapStatus,
        since: u64,
    ) -> Result<Vec<SwapRecord>, StoreError>;

    /// Atomically sets status, timestamp and memo of one record.
    async fn update_swap_status(
        &self,
        key: &SwapKey,
        status: SwapStatus,
        timestamp: u64,
        memo: &str,
    ) -> Result<(), StoreError>;

    /// Inserts the initial swap result for a verified swap.
    async fn add_initial_swap_result(
        &self,
        info: &SwapTxInfo,
        status: MatchStatus,
        timestamp: u64,
    ) -> Result<(), StoreError>;

    /// Inserts a new swap record; fails if the key is taken.
    async fn add_swap(&self, record: SwapRecord) -> Result<(), StoreError>;

    async fn get_swap(&self, key: &SwapKey) -> Result<Option<SwapRecord>, StoreError>;

    async fn get_swap_result(&self, key: &SwapKey) -> Result<Option<SwapResult>, StoreError>;

    /// Swaps sent from `address` on `chain_id`, newest first.
    ///
    /// `address` of `"all"` matches every sender; an empty `statuses` slice
    /// matches every status.
    async fn get_swap_history(
        &self,
        chain_id: u64,
        address: &str,
        offset: usize,
        limit: usize,
        statuses: &[SwapStatus],
    ) -> Result<Vec<SwapRecord>, StoreError>;
}
