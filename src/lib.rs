//! Router Swap Service Library
//!
//! Verification core of a cross-chain swap relay: swaps registered on a
//! source chain are verified through a per-chain connector, checked against
//! policy and moved along a status pipeline that downstream jobs act on.

pub mod api;
pub mod bridge;
pub mod config;
pub mod error;
pub mod policy;
pub mod shutdown;
pub mod storage;
pub mod worker;

// Re-export commonly used types
pub use bridge::{ChainConnector, RouterBridges, SwapTxInfo, SwapType, VerifyArgs};
pub use config::{ChainConfig, Config, TokenConfig};
pub use error::{RegisterError, StoreError, SwapError};
pub use policy::{ConfigPolicy, PolicyEngine};
pub use shutdown::ShutdownSignal;
pub use storage::{MemorySwapStore, SwapKey, SwapRecord, SwapStatus, SwapStore};
pub use worker::{start_router_swap_work, JobSet, WorkerContext};
