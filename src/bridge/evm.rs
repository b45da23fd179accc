//! EVM Connector Module
//!
//! Verifies router swaps on EVM-compatible chains through JSON-RPC. A swap is
//! one `LogAnySwapOut` log emitted by the configured router contract; the
//! connector checks finality, receipt status, log provenance and the swap path
//! and value against the token configuration.

use async_trait::async_trait;
use ethereum_types::U256;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::{ChainConnector, SwapTxInfo, SwapType, TokenRegistry, VerifyArgs};
use crate::config::ChainConfig;
use crate::error::SwapError;
use crate::worker::now_unix;

/// Router swap-out event signature.
///
/// Event: LogAnySwapOut(address indexed token, address indexed from, address indexed to,
///                      uint256 amount, uint256 fromChainID, uint256 toChainID)
pub const LOG_ANY_SWAP_OUT_SIGNATURE: &str =
    "LogAnySwapOut(address,address,address,uint256,uint256,uint256)";

/// Returns the `0x`-prefixed keccak256 topic of an event signature.
pub fn event_topic(signature: &str) -> String {
    let mut hasher = Keccak256::new();
    hasher.update(signature.as_bytes());
    format!("0x{}", hex::encode(hasher.finalize()))
}

// ============================================================================
// JSON-RPC STRUCTURES
// ============================================================================

/// EVM JSON-RPC request wrapper
#[derive(Debug, Serialize)]
struct JsonRpcRequest {
    jsonrpc: String,
    method: String,
    params: Vec<serde_json::Value>,
    id: u64,
}

/// EVM JSON-RPC response wrapper
#[derive(Debug, Deserialize)]
struct JsonRpcResponse<T> {
    result: Option<T>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i32,
    message: String,
}

/// Transaction receipt (only the fields the connector reads)
#[derive(Debug, Clone, Deserialize)]
pub struct TransactionReceipt {
    #[serde(rename = "blockNumber")]
    pub block_number: Option<String>,
    /// "0x1" = success, "0x0" = failure
    pub status: Option<String>,
    pub from: String,
    pub to: Option<String>,
    #[serde(default)]
    pub logs: Vec<EvmLog>,
}

/// EVM event log entry
#[derive(Debug, Clone, Deserialize)]
pub struct EvmLog {
    /// Address of the contract that emitted the event
    pub address: String,
    /// Array of topics (indexed event parameters)
    pub topics: Vec<String>,
    /// Event data (non-indexed parameters)
    pub data: String,
    /// Set when the log was removed by a chain reorganisation
    #[serde(default)]
    pub removed: bool,
}

/// Decoded `LogAnySwapOut` event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnySwapOutEvent {
    pub token: String,
    pub from: String,
    pub to: String,
    pub amount: U256,
    pub from_chain_id: U256,
    pub to_chain_id: U256,
}

// ============================================================================
// EVM CONNECTOR IMPLEMENTATION
// ============================================================================

/// Connector for one EVM chain.
pub struct EvmConnector {
    config: ChainConfig,
    client: reqwest::Client,
    /// RPC gateways, best first
    gateways: RwLock<Vec<String>>,
    tokens: Arc<TokenRegistry>,
    swap_out_topic: String,
}

impl EvmConnector {
    /// Creates a connector for `config`.
    ///
    /// Fails if the chain has no gateways or the router contract is not a
    /// 20-byte hex address.
    pub fn new(
        config: ChainConfig,
        client: reqwest::Client,
        tokens: Arc<TokenRegistry>,
    ) -> anyhow::Result<Self> {
        if config.gateways.is_empty() {
            anyhow::bail!("chain {} has no gateways", config.chain_id);
        }
        let router = config
            .router_contract
            .strip_prefix("0x")
            .ok_or_else(|| anyhow::anyhow!("router contract must be 0x-prefixed hex"))?;
        let router_bytes = hex::decode(router).map_err(|_| anyhow::anyhow!("router contract is not valid hex"))?;
        if router_bytes.len() != 20 {
            anyhow::bail!("router contract must be 20 bytes, got {}", router_bytes.len());
        }

        Ok(Self {
            gateways: RwLock::new(config.gateways.clone()),
            config,
            client,
            tokens,
            swap_out_topic: event_topic(LOG_ANY_SWAP_OUT_SIGNATURE),
        })
    }

    /// Current gateway order.
    pub async fn gateways(&self) -> Vec<String> {
        self.gateways.read().await.clone()
    }

    /// Sends one JSON-RPC request to one gateway.
    async fn call_gateway<T: DeserializeOwned>(
        &self,
        gateway: &str,
        method: &str,
        params: Vec<serde_json::Value>,
    ) -> Result<Option<T>, String> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            method: method.to_string(),
            params,
            id: 1,
        };

        let response: JsonRpcResponse<T> = self
            .client
            .post(gateway)
            .json(&request)
            .send()
            .await
            .map_err(|e| format!("Failed to send {} request to {}: {}", method, gateway, e))?
            .json()
            .await
            .map_err(|e| format!("Failed to parse {} response from {}: {}", method, gateway, e))?;

        if let Some(error) = response.error {
            return Err(format!(
                "JSON-RPC error from {}: {} (code: {})",
                gateway, error.message, error.code
            ));
        }

        Ok(response.result)
    }

    /// Sends a JSON-RPC request, trying gateways in order until one answers.
    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<serde_json::Value>,
    ) -> Result<Option<T>, SwapError> {
        let gateways = self.gateways().await;
        let mut last_error = String::from("no gateway");

        for gateway in &gateways {
            match self.call_gateway(gateway, method, params.clone()).await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    debug!("{}", e);
                    last_error = e;
                }
            }
        }

        Err(SwapError::RpcQueryError(last_error))
    }

    /// Gets the transaction receipt; `None` if the node does not know the tx.
    pub async fn get_transaction_receipt(&self, hash: &str) -> Result<Option<TransactionReceipt>, SwapError> {
        self.call("eth_getTransactionReceipt", vec![serde_json::json!(hash)])
            .await
    }

    /// Gets the current block number.
    pub async fn get_block_number(&self) -> Result<u64, SwapError> {
        let hex_number: String = self
            .call("eth_blockNumber", vec![])
            .await?
            .ok_or_else(|| SwapError::RpcQueryError("No result in eth_blockNumber response".to_string()))?;
        parse_hex_u64(&hex_number).map_err(SwapError::RpcQueryError)
    }

    /// Checks the decoded event against chain and token configuration.
    fn check_swap_out(&self, event: &AnySwapOutEvent) -> Result<(u64, String), SwapError> {
        let chain_id = self.config.chain_id;
        let token_cfg = self.token_config(&event.token).ok_or_else(|| {
            SwapError::MissTokenConfig(format!("token {} on chain {}", event.token, chain_id))
        })?;

        if event.from_chain_id != U256::from(chain_id) {
            return Err(SwapError::TxWithWrongPath(format!(
                "from chain id {} does not match chain {}",
                event.from_chain_id, chain_id
            )));
        }
        if event.to_chain_id > U256::from(u64::MAX) {
            return Err(SwapError::TxWithWrongPath(format!(
                "to chain id {} is not supported",
                event.to_chain_id
            )));
        }
        let to_chain_id = event.to_chain_id.low_u64();
        if to_chain_id == chain_id || !self.tokens.is_chain_supported(to_chain_id) {
            return Err(SwapError::TxWithWrongPath(format!(
                "cannot swap from chain {} to chain {}",
                chain_id, to_chain_id
            )));
        }

        let dest_token = self
            .tokens
            .token_on_chain(&token_cfg.token_id, to_chain_id)
            .ok_or_else(|| {
                SwapError::MissTokenConfig(format!("token {} on chain {}", token_cfg.token_id, to_chain_id))
            })?;
        if token_cfg.underlying.is_some() && dest_token.underlying.is_none() {
            return Err(SwapError::NoUnderlyingToken(format!(
                "token {} has no underlying on chain {}",
                token_cfg.token_id, to_chain_id
            )));
        }

        let minimum = token_cfg.minimum_swap_value().map_err(SwapError::MissTokenConfig)?;
        let maximum = token_cfg.maximum_swap_value().map_err(SwapError::MissTokenConfig)?;
        if event.amount < minimum || event.amount > maximum {
            return Err(SwapError::TxWithWrongValue(format!(
                "value {} not in range [{}, {}]",
                event.amount, minimum, maximum
            )));
        }

        Ok((to_chain_id, token_cfg.token_id.clone()))
    }
}

#[async_trait]
impl ChainConnector for EvmConnector {
    fn chain_config(&self) -> &ChainConfig {
        &self.config
    }

    async fn verify_transaction(&self, txid: &str, args: &VerifyArgs) -> Result<SwapTxInfo, SwapError> {
        if args.swap_type != SwapType::Erc20Swap {
            return Err(SwapError::SwapTypeNotSupported(args.swap_type.to_string()));
        }

        let hash = normalize_tx_hash(txid);
        let receipt = self
            .get_transaction_receipt(&hash)
            .await?
            .ok_or(SwapError::TxNotFound)?;

        let height = match receipt.block_number.as_deref() {
            Some(number) => parse_hex_u64(number).map_err(SwapError::RpcQueryError)?,
            None => return Err(SwapError::TxNotStable),
        };
        if !args.allow_unstable {
            let latest = self.get_block_number().await?;
            if latest < height.saturating_add(self.config.confirmations) {
                return Err(SwapError::TxNotStable);
            }
        }

        if receipt.status.as_deref() != Some("0x1") {
            return Err(SwapError::TxWithWrongReceipt);
        }

        let log = receipt
            .logs
            .get(args.log_index as usize)
            .ok_or(SwapError::LogIndexOutOfRange(args.log_index))?;
        if log.removed {
            return Err(SwapError::TxWithRemovedLog);
        }
        if !log.address.eq_ignore_ascii_case(&self.config.router_contract) {
            return Err(SwapError::TxWithWrongContract(log.address.clone()));
        }
        if !log
            .topics
            .first()
            .is_some_and(|topic| topic.eq_ignore_ascii_case(&self.swap_out_topic))
        {
            return Err(SwapError::SwapoutLogNotFound);
        }

        let event = parse_any_swap_out(log)?;
        let (to_chain_id, token_id) = self.check_swap_out(&event)?;

        Ok(SwapTxInfo {
            swap_type: args.swap_type,
            hash,
            height,
            timestamp: now_unix(),
            from_chain_id: self.config.chain_id,
            to_chain_id,
            log_index: args.log_index,
            from: event.from,
            tx_to: receipt.to.unwrap_or_default(),
            bind: event.to,
            value: event.amount,
            token: event.token,
            token_id,
        })
    }

    async fn adjust_gateway_order(&self) {
        let current = self.gateways().await;
        if current.len() < 2 {
            return;
        }

        let mut ranked = Vec::with_capacity(current.len());
        for gateway in &current {
            let height = match self.call_gateway::<String>(gateway, "eth_blockNumber", vec![]).await {
                Ok(Some(number)) => parse_hex_u64(&number).ok(),
                _ => None,
            };
            ranked.push((gateway.clone(), height));
        }
        // Highest block first; unreachable gateways last. Stable for ties.
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        let reordered: Vec<String> = ranked.into_iter().map(|(gateway, _)| gateway).collect();

        if reordered != current {
            info!(
                "Adjusted gateway order for chain {}: {:?}",
                self.config.chain_id, reordered
            );
            *self.gateways.write().await = reordered;
        }
    }
}

// ============================================================================
// HELPERS
// ============================================================================

/// Ensures a `0x` prefix on a transaction hash.
pub fn normalize_tx_hash(hash: &str) -> String {
    if hash.starts_with("0x") {
        hash.to_string()
    } else {
        format!("0x{}", hash)
    }
}

/// Parses a `0x`-prefixed hex quantity.
pub fn parse_hex_u64(value: &str) -> Result<u64, String> {
    u64::from_str_radix(value.strip_prefix("0x").unwrap_or(value), 16)
        .map_err(|e| format!("Failed to parse hex quantity '{}': {}", value, e))
}

/// Decodes a `LogAnySwapOut` log.
///
/// topics[1..4] = token, from, to (addresses padded to 32 bytes);
/// data = abi.encode(amount, fromChainID, toChainID).
pub fn parse_any_swap_out(log: &EvmLog) -> Result<AnySwapOutEvent, SwapError> {
    if log.topics.len() != 4 {
        return Err(SwapError::WrongLogData(format!(
            "expected 4 topics, got {}",
            log.topics.len()
        )));
    }
    let data = hex::decode(log.data.strip_prefix("0x").unwrap_or(&log.data))
        .map_err(|e| SwapError::WrongLogData(format!("invalid data hex: {}", e)))?;
    if data.len() != 96 {
        return Err(SwapError::WrongLogData(format!(
            "expected 96 data bytes, got {}",
            data.len()
        )));
    }

    Ok(AnySwapOutEvent {
        token: topic_to_address(&log.topics[1])?,
        from: topic_to_address(&log.topics[2])?,
        to: topic_to_address(&log.topics[3])?,
        amount: U256::from_big_endian(&data[0..32]),
        from_chain_id: U256::from_big_endian(&data[32..64]),
        to_chain_id: U256::from_big_endian(&data[64..96]),
    })
}

/// Extracts an address from a padded 32-byte topic.
fn topic_to_address(topic: &str) -> Result<String, SwapError> {
    let bytes = hex::decode(topic.strip_prefix("0x").unwrap_or(topic))
        .map_err(|e| SwapError::WrongLogData(format!("invalid topic {}: {}", topic, e)))?;
    if bytes.len() != 32 {
        return Err(SwapError::WrongLogData(format!("invalid topic {}", topic)));
    }
    Ok(format!("0x{}", hex::encode(&bytes[12..])))
}
