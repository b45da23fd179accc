//! Error definitions for swap verification and storage.
//!
//! `SwapError` is the classified outcome of a connector or policy check. The
//! verification job maps each kind onto a persisted swap status, so adding a
//! variant means deciding which status (if any) it lands in.

use thiserror::Error;

use crate::storage::SwapStatus;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SwapError {
    #[error("tx not stable")]
    TxNotStable,

    #[error("tx not found")]
    TxNotFound,

    #[error("rpc query error: {0}")]
    RpcQueryError(String),

    #[error("no bridge for chain id {0}")]
    NoBridgeForChainId(u64),

    #[error("swap is in black list: {0}")]
    SwapInBlacklist(String),

    #[error("tx with wrong value: {0}")]
    TxWithWrongValue(String),

    #[error("tx with wrong path: {0}")]
    TxWithWrongPath(String),

    #[error("miss token config: {0}")]
    MissTokenConfig(String),

    #[error("no underlying token: {0}")]
    NoUnderlyingToken(String),

    #[error("swap type not supported: {0}")]
    SwapTypeNotSupported(String),

    #[error("tx with wrong receipt")]
    TxWithWrongReceipt,

    #[error("tx with wrong contract: {0}")]
    TxWithWrongContract(String),

    #[error("tx with removed log")]
    TxWithRemovedLog,

    #[error("swapout log not found")]
    SwapoutLogNotFound,

    #[error("log index {0} out of range")]
    LogIndexOutOfRange(u32),

    #[error("wrong log data: {0}")]
    WrongLogData(String),
}

impl SwapError {
    /// Errors that only mean "not yet": the swap stays `NotStable` and is
    /// picked up again on a later pass.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SwapError::TxNotStable | SwapError::TxNotFound | SwapError::RpcQueryError(_)
        )
    }

    /// Terminal status a failed verification moves the swap into.
    ///
    /// Returns `None` for transient errors and for conditions that are never
    /// persisted (a missing connector).
    pub fn verify_failure_status(&self) -> Option<SwapStatus> {
        match self {
            e if e.is_transient() => None,
            SwapError::NoBridgeForChainId(_) => None,
            SwapError::SwapInBlacklist(_) => Some(SwapStatus::InBlacklist),
            SwapError::TxWithWrongValue(_) => Some(SwapStatus::WithWrongValue),
            SwapError::TxWithWrongPath(_) => Some(SwapStatus::WithWrongPath),
            SwapError::MissTokenConfig(_) => Some(SwapStatus::MissingTokenConfig),
            SwapError::NoUnderlyingToken(_) => Some(SwapStatus::NoUnderlyingToken),
            _ => Some(SwapStatus::VerifyFailed),
        }
    }

    /// Content-validation failures: expected categories of malformed input.
    pub fn is_content_rejection(&self) -> bool {
        matches!(
            self,
            SwapError::TxWithWrongValue(_)
                | SwapError::TxWithWrongPath(_)
                | SwapError::MissTokenConfig(_)
                | SwapError::NoUnderlyingToken(_)
        )
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("item not found")]
    NotFound,

    #[error("item already exists")]
    AlreadyExists,

    #[error("store backend error: {0}")]
    Backend(String),
}

/// Failure to register a new swap.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegisterError {
    #[error(transparent)]
    Swap(#[from] SwapError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
