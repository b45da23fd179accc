//! Swap Record Storage
//!
//! Swap records, swap results and an in-memory `SwapStore` implementation.
//! Every write is a single read-modify-write under the map's write lock, which
//! gives the per-record atomicity the job pipeline relies on.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use tokio::sync::RwLock;

use super::SwapStore;
use crate::bridge::{SwapTxInfo, SwapType};
use crate::error::StoreError;

/// Default page size for history queries.
pub const DEFAULT_HISTORY_LIMIT: usize = 20;
/// Upper bound for history page size.
pub const MAX_HISTORY_LIMIT: usize = 100;

// ============================================================================
// DATA STRUCTURES
// ============================================================================

/// Unique identity of a swap: one log of one transaction on the source chain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SwapKey {
    /// Source chain ID
    pub from_chain_id: u64,
    /// Transaction hash on the source chain
    pub txid: String,
    /// Index of the swap log inside the transaction receipt
    pub log_index: u32,
}

impl SwapKey {
    pub fn new(from_chain_id: u64, txid: impl Into<String>, log_index: u32) -> Self {
        Self {
            from_chain_id,
            txid: txid.into(),
            log_index,
        }
    }
}

impl fmt::Display for SwapKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.from_chain_id, self.txid, self.log_index)
    }
}

/// Pipeline status of a swap record.
///
/// Each status is owned by exactly one job: only that job moves a record out
/// of it. Numeric codes are stable and exposed through the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SwapStatus {
    /// Registered, waiting for verification
    NotStable,
    /// Verification failed for an unclassified reason
    VerifyFailed,
    /// Value outside the configured swap range
    WithWrongValue,
    /// Verified, waiting for the swap job
    NotSwapped,
    /// Verified, held for big-value approval
    WithBigValue,
    /// Rejected by blacklist policy
    InBlacklist,
    /// Source/destination chain combination is invalid
    WithWrongPath,
    /// Token is not configured on one side of the swap
    MissingTokenConfig,
    /// Destination has no underlying token for this swap
    NoUnderlyingToken,
}

impl SwapStatus {
    pub const ALL: [SwapStatus; 9] = [
        SwapStatus::NotStable,
        SwapStatus::VerifyFailed,
        SwapStatus::WithWrongValue,
        SwapStatus::NotSwapped,
        SwapStatus::WithBigValue,
        SwapStatus::InBlacklist,
        SwapStatus::WithWrongPath,
        SwapStatus::MissingTokenConfig,
        SwapStatus::NoUnderlyingToken,
    ];

    pub fn code(&self) -> u8 {
        match self {
            SwapStatus::NotStable => 0,
            SwapStatus::VerifyFailed => 1,
            SwapStatus::WithWrongValue => 3,
            SwapStatus::NotSwapped => 5,
            SwapStatus::WithBigValue => 12,
            SwapStatus::InBlacklist => 15,
            SwapStatus::WithWrongPath => 19,
            SwapStatus::MissingTokenConfig => 20,
            SwapStatus::NoUnderlyingToken => 21,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|status| status.code() == code)
    }
}

impl fmt::Display for SwapStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl FromStr for SwapStatus {
    type Err = String;

    /// Accepts either the numeric code or the status name (case-insensitive).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(code) = s.parse::<u8>() {
            return Self::from_code(code).ok_or_else(|| format!("unknown swap status code {}", code));
        }
        Self::ALL
            .iter()
            .copied()
            .find(|status| status.to_string().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown swap status '{}'", s))
    }
}

/// Status of the destination-side match for a verified swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchStatus {
    /// No destination transaction yet
    MatchTxEmpty,
    /// Destination transaction sent, not yet stable
    MatchTxNotStable,
    /// Destination transaction stable
    MatchTxStable,
    /// Destination transaction failed
    MatchTxFailed,
}

impl MatchStatus {
    pub fn code(&self) -> u8 {
        match self {
            MatchStatus::MatchTxEmpty => 8,
            MatchStatus::MatchTxNotStable => 9,
            MatchStatus::MatchTxStable => 10,
            MatchStatus::MatchTxFailed => 14,
        }
    }
}

/// One swap attempt observed on a source chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapRecord {
    /// Record identity
    pub key: SwapKey,
    /// Destination chain ID
    pub to_chain_id: u64,
    /// Kind of swap
    pub swap_type: SwapType,
    /// Cross-chain token ID
    pub token_id: String,
    /// Source token contract address
    pub token: String,
    /// Sender on the source chain
    pub from: String,
    /// Recipient on the destination chain
    pub bind: String,
    /// Swapped value in source token units (decimal string)
    pub value: String,
    /// Current pipeline status
    pub status: SwapStatus,
    /// Unix timestamp when the record was created
    pub init_time: u64,
    /// Unix timestamp of the last status change
    pub timestamp: u64,
    /// Diagnostic text set on failure
    pub memo: String,
}

impl SwapRecord {
    /// Builds a fresh `NotStable` record from a verified descriptor.
    pub fn from_swap_info(info: &SwapTxInfo, now: u64) -> Self {
        Self {
            key: SwapKey::new(info.from_chain_id, info.hash.clone(), info.log_index),
            to_chain_id: info.to_chain_id,
            swap_type: info.swap_type,
            token_id: info.token_id.clone(),
            token: info.token.clone(),
            from: info.from.clone(),
            bind: info.bind.clone(),
            value: info.value.to_string(),
            status: SwapStatus::NotStable,
            init_time: now,
            timestamp: now,
            memo: String::new(),
        }
    }
}

/// Destination-side bookkeeping for a verified swap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapResult {
    pub key: SwapKey,
    pub to_chain_id: u64,
    pub swap_type: SwapType,
    pub token_id: String,
    pub token: String,
    pub from: String,
    pub tx_to: String,
    pub bind: String,
    pub value: String,
    /// Source transaction height
    pub tx_height: u64,
    /// When the source transaction was verified
    pub tx_time: u64,
    /// Destination transaction hash (empty until the swap job sends it)
    pub swap_tx: String,
    pub status: MatchStatus,
    pub init_time: u64,
    pub timestamp: u64,
    pub memo: String,
}

impl SwapResult {
    /// Initial result for a swap that has just been verified.
    pub fn initial(info: &SwapTxInfo, status: MatchStatus, now: u64) -> Self {
        Self {
            key: SwapKey::new(info.from_chain_id, info.hash.clone(), info.log_index),
            to_chain_id: info.to_chain_id,
            swap_type: info.swap_type,
            token_id: info.token_id.clone(),
            token: info.token.clone(),
            from: info.from.clone(),
            tx_to: info.tx_to.clone(),
            bind: info.bind.clone(),
            value: info.value.to_string(),
            tx_height: info.height,
            tx_time: info.timestamp,
            swap_tx: String::new(),
            status,
            init_time: now,
            timestamp: now,
            memo: String::new(),
        }
    }
}

// ============================================================================
// IN-MEMORY STORE
// ============================================================================

/// In-memory swap store.
///
/// Thread-safe via `RwLock`; suitable for a single relay process and for tests.
pub struct MemorySwapStore {
    /// Map of swap key -> swap record
    swaps: RwLock<HashMap<SwapKey, SwapRecord>>,
    /// Map of swap key -> swap result
    results: RwLock<HashMap<SwapKey, SwapResult>>,
}

impl MemorySwapStore {
    pub fn new() -> Self {
        Self {
            swaps: RwLock::new(HashMap::new()),
            results: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemorySwapStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SwapStore for MemorySwapStore {
    async fn find_swaps_with_status(
        &self,
        status: SwapStatus,
        since: u64,
    ) -> Result<Vec<SwapRecord>, StoreError> {
        let swaps = self.swaps.read().await;
        let mut found: Vec<SwapRecord> = swaps
            .values()
            .filter(|swap| swap.status == status && swap.init_time >= since)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.init_time.cmp(&b.init_time).then_with(|| a.key.cmp(&b.key)));
        Ok(found)
    }

    async fn update_swap_status(
        &self,
        key: &SwapKey,
        status: SwapStatus,
        timestamp: u64,
        memo: &str,
    ) -> Result<(), StoreError> {
        let mut swaps = self.swaps.write().await;
        let swap = swaps.get_mut(key).ok_or(StoreError::NotFound)?;
        swap.status = status;
        swap.timestamp = timestamp;
        swap.memo = memo.to_string();
        Ok(())
    }

    async fn add_initial_swap_result(
        &self,
        info: &SwapTxInfo,
        status: MatchStatus,
        timestamp: u64,
    ) -> Result<(), StoreError> {
        let result = SwapResult::initial(info, status, timestamp);
        let mut results = self.results.write().await;
        if results.contains_key(&result.key) {
            return Err(StoreError::AlreadyExists);
        }
        results.insert(result.key.clone(), result);
        Ok(())
    }

    async fn add_swap(&self, record: SwapRecord) -> Result<(), StoreError> {
        let mut swaps = self.swaps.write().await;
        if swaps.contains_key(&record.key) {
            return Err(StoreError::AlreadyExists);
        }
        swaps.insert(record.key.clone(), record);
        Ok(())
    }

    async fn get_swap(&self, key: &SwapKey) -> Result<Option<SwapRecord>, StoreError> {
        Ok(self.swaps.read().await.get(key).cloned())
    }

    async fn get_swap_result(&self, key: &SwapKey) -> Result<Option<SwapResult>, StoreError> {
        Ok(self.results.read().await.get(key).cloned())
    }

    async fn get_swap_history(
        &self,
        chain_id: u64,
        address: &str,
        offset: usize,
        limit: usize,
        statuses: &[SwapStatus],
    ) -> Result<Vec<SwapRecord>, StoreError> {
        let limit = limit.clamp(1, MAX_HISTORY_LIMIT);
        let match_all = address.eq_ignore_ascii_case("all");

        let swaps = self.swaps.read().await;
        let mut found: Vec<SwapRecord> = swaps
            .values()
            .filter(|swap| swap.key.from_chain_id == chain_id)
            .filter(|swap| match_all || swap.from.eq_ignore_ascii_case(address))
            .filter(|swap| statuses.is_empty() || statuses.contains(&swap.status))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.init_time.cmp(&a.init_time).then_with(|| a.key.cmp(&b.key)));

        Ok(found.into_iter().skip(offset).take(limit).collect())
    }
}
