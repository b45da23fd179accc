//! Swap API handlers
//!
//! Registration, single-swap lookup and per-address history.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;
use warp::http::StatusCode;
use warp::Rejection;

use super::generic::{error_reply, ok_reply, parse_param, ApiReply, ApiState, InvalidRequest};
use crate::bridge::SwapType;
use crate::error::{RegisterError, SwapError};
use crate::storage::{SwapKey, SwapRecord, SwapResult, SwapStatus, DEFAULT_HISTORY_LIMIT};
use crate::worker::{register_swap, Registration};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterSwapRequest {
    #[serde(rename = "chainid")]
    pub chain_id: u64,
    pub txid: String,
    #[serde(rename = "logindex", default)]
    pub log_index: u32,
    #[serde(rename = "swaptype", default = "default_swap_type")]
    pub swap_type: SwapType,
}

fn default_swap_type() -> SwapType {
    SwapType::Erc20Swap
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterSwapResponse {
    /// False when the swap was already registered
    pub registered: bool,
    pub swap: SwapView,
}

/// Swap record with its numeric status code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapView {
    #[serde(flatten)]
    pub record: SwapRecord,
    pub status_code: u8,
}

impl From<SwapRecord> for SwapView {
    fn from(record: SwapRecord) -> Self {
        let status_code = record.status.code();
        Self { record, status_code }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapDetails {
    pub swap: SwapView,
    pub result: Option<SwapResult>,
}

pub async fn register_swap_handler(
    request: RegisterSwapRequest,
    state: Arc<ApiState>,
) -> Result<ApiReply, Rejection> {
    let outcome = register_swap(
        state.store.as_ref(),
        state.bridges.as_ref(),
        request.chain_id,
        &request.txid,
        request.log_index,
        request.swap_type,
    )
    .await;

    match outcome {
        Ok(registration) => {
            let registered = matches!(registration, Registration::Registered(_));
            Ok(ok_reply(RegisterSwapResponse {
                registered,
                swap: registration.record().clone().into(),
            }))
        }
        Err(RegisterError::Swap(e @ SwapError::NoBridgeForChainId(_))) => {
            Ok(error_reply(StatusCode::NOT_FOUND, e.to_string()))
        }
        Err(RegisterError::Swap(e)) => Ok(error_reply(StatusCode::BAD_REQUEST, e.to_string())),
        Err(RegisterError::Store(e)) => {
            warn!("Register swap {}:{}:{} failed: {}", request.chain_id, request.txid, request.log_index, e);
            Ok(error_reply(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}

pub async fn get_swap_handler(
    chain_id: String,
    txid: String,
    log_index: String,
    state: Arc<ApiState>,
) -> Result<ApiReply, Rejection> {
    let key = SwapKey::new(
        parse_param::<u64>(&chain_id, "chain id")?,
        txid,
        parse_param::<u32>(&log_index, "log index")?,
    );

    let swap = match state.store.get_swap(&key).await {
        Ok(Some(swap)) => swap,
        Ok(None) => return Ok(error_reply(StatusCode::NOT_FOUND, format!("Swap {} not found", key))),
        Err(e) => return Ok(error_reply(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())),
    };
    let result = match state.store.get_swap_result(&key).await {
        Ok(result) => result,
        Err(e) => return Ok(error_reply(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())),
    };

    Ok(ok_reply(SwapDetails {
        swap: swap.into(),
        result,
    }))
}

/// `GET /history/{chainid}/{address}?offset=&limit=&status=`
///
/// `status` is a comma-separated list of codes or names.
pub async fn get_swap_history_handler(
    chain_id: String,
    address: String,
    query: HashMap<String, String>,
    state: Arc<ApiState>,
) -> Result<ApiReply, Rejection> {
    let chain_id = parse_param::<u64>(&chain_id, "chain id")?;
    let offset = match query.get("offset") {
        Some(offset) => parse_param::<usize>(offset, "offset")?,
        None => 0,
    };
    let limit = match query.get("limit") {
        Some(limit) => parse_param::<usize>(limit, "limit")?,
        None => DEFAULT_HISTORY_LIMIT,
    };
    let statuses = match query.get("status") {
        Some(list) => parse_status_list(list)?,
        None => Vec::new(),
    };

    match state
        .store
        .get_swap_history(chain_id, &address, offset, limit, &statuses)
        .await
    {
        Ok(swaps) => Ok(ok_reply(swaps.into_iter().map(SwapView::from).collect::<Vec<_>>())),
        Err(e) => Ok(error_reply(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())),
    }
}

fn parse_status_list(list: &str) -> Result<Vec<SwapStatus>, Rejection> {
    list.split(',')
        .filter(|s| !s.trim().is_empty())
        .map(|s| {
            s.parse::<SwapStatus>()
                .map_err(|e| warp::reject::custom(InvalidRequest(e)))
        })
        .collect()
}
