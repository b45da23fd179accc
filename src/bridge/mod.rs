//! Chain Connector Module
//!
//! A chain connector (bridge) fetches and validates swap transactions on one
//! source chain. Connectors are built once at startup and published through
//! `RouterBridges`, an immutable-after-init registry that is only ever replaced
//! as a whole.

use async_trait::async_trait;
use ethereum_types::U256;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::config::{ChainConfig, Config, HttpConfig, TokenConfig};
use crate::error::SwapError;

pub mod evm;
pub mod gateway;

pub use evm::EvmConnector;

// ============================================================================
// SWAP DESCRIPTORS
// ============================================================================

/// Kind of swap a router log describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SwapType {
    /// Fungible token transfer
    Erc20Swap,
    /// Non-fungible token transfer
    NftSwap,
    /// Cross-chain contract call
    AnyCallSwap,
}

impl fmt::Display for SwapType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Parameters of one verification attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifyArgs {
    pub swap_type: SwapType,
    pub log_index: u32,
    /// Accept transactions that do not yet have the required confirmations
    pub allow_unstable: bool,
}

/// Fully verified swap, as read from the source chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapTxInfo {
    pub swap_type: SwapType,
    /// Source transaction hash
    pub hash: String,
    /// Source block height
    pub height: u64,
    /// Unix time the transaction was verified at
    pub timestamp: u64,
    pub from_chain_id: u64,
    pub to_chain_id: u64,
    pub log_index: u32,
    /// Sender of the swap
    pub from: String,
    /// Contract the transaction was sent to
    pub tx_to: String,
    /// Recipient on the destination chain
    pub bind: String,
    /// Swapped value in source token units
    pub value: U256,
    /// Source token contract address
    pub token: String,
    /// Cross-chain token ID
    pub token_id: String,
}

// ============================================================================
// CONNECTOR TRAIT
// ============================================================================

/// Per-chain capability that fetches and validates on-chain transactions.
#[async_trait]
pub trait ChainConnector: Send + Sync {
    /// Configuration of the chain this connector serves.
    fn chain_config(&self) -> &ChainConfig;

    fn chain_id(&self) -> u64 {
        self.chain_config().chain_id
    }

    /// Token configuration by contract address (case-insensitive).
    fn token_config(&self, address: &str) -> Option<&TokenConfig> {
        self.chain_config()
            .tokens
            .iter()
            .find(|token| token.address.eq_ignore_ascii_case(address))
    }

    /// Fetches `txid` and validates the swap log selected by `args`.
    async fn verify_transaction(&self, txid: &str, args: &VerifyArgs) -> Result<SwapTxInfo, SwapError>;

    /// Re-ranks RPC gateways; connectors with a single endpoint do nothing.
    async fn adjust_gateway_order(&self) {}
}

// ============================================================================
// TOKEN REGISTRY
// ============================================================================

/// Router-wide view of configured chains and multichain tokens.
#[derive(Debug, Clone, Default)]
pub struct TokenRegistry {
    chain_ids: BTreeSet<u64>,
    /// token ID (uppercase) -> chain ID -> token config
    tokens: BTreeMap<String, BTreeMap<u64, TokenConfig>>,
}

impl TokenRegistry {
    pub fn from_config(config: &Config) -> Self {
        let mut registry = Self::default();
        for chain in &config.chains {
            registry.chain_ids.insert(chain.chain_id);
            for token in &chain.tokens {
                registry
                    .tokens
                    .entry(token.token_id.to_uppercase())
                    .or_default()
                    .insert(chain.chain_id, token.clone());
            }
        }
        registry
    }

    pub fn all_chain_ids(&self) -> Vec<u64> {
        self.chain_ids.iter().copied().collect()
    }

    pub fn all_token_ids(&self) -> Vec<String> {
        self.tokens.keys().cloned().collect()
    }

    pub fn is_chain_supported(&self, chain_id: u64) -> bool {
        self.chain_ids.contains(&chain_id)
    }

    /// Token `token_id` as deployed on `chain_id`.
    pub fn token_on_chain(&self, token_id: &str, chain_id: u64) -> Option<&TokenConfig> {
        self.tokens.get(&token_id.to_uppercase())?.get(&chain_id)
    }

    /// Contract address of `token_id` on every chain it is deployed on.
    pub fn multichain_tokens(&self, token_id: &str) -> BTreeMap<u64, String> {
        self.tokens
            .get(&token_id.to_uppercase())
            .map(|chains| {
                chains
                    .iter()
                    .map(|(chain_id, token)| (*chain_id, token.address.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }
}

// ============================================================================
// CONNECTOR REGISTRY
// ============================================================================

/// Immutable mapping from chain ID to connector.
#[derive(Clone, Default)]
pub struct ConnectorRegistry {
    connectors: HashMap<u64, Arc<dyn ChainConnector>>,
}

impl ConnectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a connector, replacing any previous one for the same chain.
    pub fn with_connector(mut self, connector: Arc<dyn ChainConnector>) -> Self {
        self.connectors.insert(connector.chain_id(), connector);
        self
    }

    pub fn get(&self, chain_id: u64) -> Option<Arc<dyn ChainConnector>> {
        self.connectors.get(&chain_id).cloned()
    }

    pub fn chain_ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self.connectors.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn connectors(&self) -> impl Iterator<Item = &Arc<dyn ChainConnector>> {
        self.connectors.values()
    }

    pub fn len(&self) -> usize {
        self.connectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connectors.is_empty()
    }
}

/// Shared handle to the current connector registry.
///
/// Readers take a cheap snapshot; re-initialisation swaps the whole map.
#[derive(Default)]
pub struct RouterBridges {
    registry: RwLock<Arc<ConnectorRegistry>>,
}

impl RouterBridges {
    pub fn new(registry: ConnectorRegistry) -> Self {
        Self {
            registry: RwLock::new(Arc::new(registry)),
        }
    }

    pub async fn get_bridge_by_chain_id(&self, chain_id: u64) -> Option<Arc<dyn ChainConnector>> {
        self.registry.read().await.get(chain_id)
    }

    pub async fn snapshot(&self) -> Arc<ConnectorRegistry> {
        self.registry.read().await.clone()
    }

    pub async fn replace(&self, registry: ConnectorRegistry) {
        *self.registry.write().await = Arc::new(registry);
    }
}

// ============================================================================
// INITIALISATION
// ============================================================================

/// Builds the shared outbound HTTP client.
pub fn init_http_client(config: &HttpConfig) -> anyhow::Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_millis(config.timeout_ms))
        .no_proxy()
        .build()?;
    Ok(client)
}

/// Builds one connector per configured chain.
///
/// A server must serve every configured chain, so any failure is fatal. A
/// client participant skips chains it cannot initialise.
pub fn init_router_bridges(
    config: &Config,
    client: &reqwest::Client,
    is_server: bool,
) -> anyhow::Result<ConnectorRegistry> {
    let tokens = Arc::new(TokenRegistry::from_config(config));
    let mut registry = ConnectorRegistry::new();

    for chain in &config.chains {
        match EvmConnector::new(chain.clone(), client.clone(), tokens.clone()) {
            Ok(connector) => {
                info!("Initialized bridge for chain {} ({})", chain.chain_id, chain.name);
                registry = registry.with_connector(Arc::new(connector));
            }
            Err(e) if is_server => {
                return Err(e.context(format!("Failed to initialize bridge for chain {}", chain.chain_id)));
            }
            Err(e) => {
                warn!("Skipping chain {} ({}): {:#}", chain.chain_id, chain.name, e);
            }
        }
    }

    info!("Initialized {} router bridges", registry.len());
    Ok(registry)
}
