//! REST API Server Module
//!
//! Exposes read-only views of swaps, chain and token configuration, and the
//! swap registration endpoint.

// Shared envelope, rejection handling and the server
mod generic;

// Swap registration, lookup and history
mod swap;

// Chain and token configuration
mod tokens;

pub use generic::{ApiResponse, ApiServer, ServerInfo, VersionInfo};
pub use swap::{RegisterSwapRequest, RegisterSwapResponse, SwapDetails, SwapView};
pub use tokens::SwapConfigResponse;
