//! Chain and token configuration API handlers

use ethereum_types::U256;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use warp::http::StatusCode;
use warp::Rejection;

use super::generic::{error_reply, ok_reply, parse_param, ApiReply, ApiState};

/// Swap limits of one token on one chain, in smallest units.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapConfigResponse {
    pub token_id: String,
    pub chain_id: u64,
    pub decimals: u8,
    pub minimum_swap: String,
    pub maximum_swap: String,
    /// Absent when no big-value threshold applies
    pub big_value_threshold: Option<String>,
}

pub async fn get_chain_ids_handler(state: Arc<ApiState>) -> Result<ApiReply, Rejection> {
    Ok(ok_reply(state.tokens.all_chain_ids()))
}

pub async fn get_token_ids_handler(state: Arc<ApiState>) -> Result<ApiReply, Rejection> {
    Ok(ok_reply(state.tokens.all_token_ids()))
}

pub async fn get_multichain_tokens_handler(token_id: String, state: Arc<ApiState>) -> Result<ApiReply, Rejection> {
    let tokens: BTreeMap<u64, String> = state.tokens.multichain_tokens(&token_id);
    if tokens.is_empty() {
        return Ok(error_reply(StatusCode::NOT_FOUND, format!("Token {} not found", token_id)));
    }
    Ok(ok_reply(tokens))
}

pub async fn get_chain_config_handler(chain_id: String, state: Arc<ApiState>) -> Result<ApiReply, Rejection> {
    let chain_id = parse_param::<u64>(&chain_id, "chain id")?;
    match state.config.chain(chain_id) {
        Some(chain) => Ok(ok_reply(chain)),
        None => Ok(error_reply(StatusCode::NOT_FOUND, format!("Chain {} not found", chain_id))),
    }
}

pub async fn get_token_config_handler(
    chain_id: String,
    address: String,
    state: Arc<ApiState>,
) -> Result<ApiReply, Rejection> {
    let chain_id = parse_param::<u64>(&chain_id, "chain id")?;
    let token = state
        .config
        .chain(chain_id)
        .and_then(|chain| chain.tokens.iter().find(|token| token.address.eq_ignore_ascii_case(&address)));
    match token {
        Some(token) => Ok(ok_reply(token)),
        None => Ok(error_reply(
            StatusCode::NOT_FOUND,
            format!("Token {} not found on chain {}", address, chain_id),
        )),
    }
}

/// Limits of `token_id` on `chain_id`; the threshold is the one applied to
/// swaps whose destination is `chain_id`.
pub async fn get_swap_config_handler(
    token_id: String,
    chain_id: String,
    state: Arc<ApiState>,
) -> Result<ApiReply, Rejection> {
    let chain_id = parse_param::<u64>(&chain_id, "chain id")?;
    let token = match state.tokens.token_on_chain(&token_id, chain_id) {
        Some(token) => token,
        None => {
            return Ok(error_reply(
                StatusCode::NOT_FOUND,
                format!("Token {} not found on chain {}", token_id, chain_id),
            ))
        }
    };

    let (minimum, maximum) = match (token.minimum_swap_value(), token.maximum_swap_value()) {
        (Ok(minimum), Ok(maximum)) => (minimum, maximum),
        (Err(e), _) | (_, Err(e)) => return Ok(error_reply(StatusCode::INTERNAL_SERVER_ERROR, e)),
    };
    let threshold = state.policy.big_value_threshold(&token.token_id, chain_id, token.decimals);

    Ok(ok_reply(SwapConfigResponse {
        token_id: token.token_id.clone(),
        chain_id,
        decimals: token.decimals,
        minimum_swap: minimum.to_string(),
        maximum_swap: maximum.to_string(),
        big_value_threshold: (threshold != U256::MAX).then(|| threshold.to_string()),
    }))
}
