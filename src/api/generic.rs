//! Generic API structures and handlers
//!
//! Shared response envelope, rejection handling, CORS and the server itself.
//! Swap and token-configuration handlers live in sibling modules.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info};
use warp::hyper::body::Bytes;
use warp::{
    http::{Method, StatusCode},
    Filter, Rejection, Reply,
};

use crate::bridge::{RouterBridges, TokenRegistry};
use crate::config::Config;
use crate::policy::PolicyEngine;
use crate::storage::SwapStore;

// ============================================================================
// SHARED REQUEST/RESPONSE STRUCTURES
// ============================================================================

/// Standardized response structure for all API endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// Whether the request was successful
    pub success: bool,
    /// Response data (if successful)
    pub data: Option<T>,
    /// Error message (if failed)
    pub error: Option<String>,
}

/// Reply type shared by every handler.
pub type ApiReply = warp::reply::WithStatus<warp::reply::Json>;

pub fn ok_reply<T: Serialize>(data: T) -> ApiReply {
    warp::reply::with_status(
        warp::reply::json(&ApiResponse {
            success: true,
            data: Some(data),
            error: None,
        }),
        StatusCode::OK,
    )
}

pub fn error_reply(status: StatusCode, message: impl Into<String>) -> ApiReply {
    warp::reply::with_status(
        warp::reply::json(&ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(message.into()),
        }),
        status,
    )
}

/// Everything the handlers read from.
pub struct ApiState {
    pub config: Arc<Config>,
    pub store: Arc<dyn SwapStore>,
    pub policy: Arc<dyn PolicyEngine>,
    pub bridges: Arc<RouterBridges>,
    pub tokens: Arc<TokenRegistry>,
    pub is_server: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VersionInfo {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ServerInfo {
    pub identifier: String,
    pub version: String,
    pub is_server: bool,
    /// Chains with an initialised bridge
    pub chain_ids: Vec<u64>,
}

// ============================================================================
// GENERIC API HANDLERS
// ============================================================================

pub async fn get_server_info_handler(state: Arc<ApiState>) -> Result<ApiReply, Rejection> {
    let registry = state.bridges.snapshot().await;
    Ok(ok_reply(ServerInfo {
        identifier: state.config.identifier.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        is_server: state.is_server,
        chain_ids: registry.chain_ids(),
    }))
}

// ============================================================================
// WARP FILTER HELPERS
// ============================================================================

/// Injects the shared API state into handlers.
pub fn with_state(
    state: Arc<ApiState>,
) -> impl Filter<Extract = (Arc<ApiState>,), Error = std::convert::Infallible> + Clone {
    warp::any().map(move || state.clone())
}

/// Parses a path segment, rejecting with 400 on failure.
pub fn parse_param<T: std::str::FromStr>(value: &str, name: &str) -> Result<T, Rejection> {
    value
        .parse::<T>()
        .map_err(|_| warp::reject::custom(InvalidRequest(format!("Invalid {}: {}", name, value))))
}

// ============================================================================
// CUSTOM REJECTION TYPES
// ============================================================================

/// Malformed request input (bad JSON, path segment or query parameter)
#[derive(Debug)]
pub struct InvalidRequest(pub String);

impl warp::reject::Reject for InvalidRequest {}

// ============================================================================
// CORS CONFIGURATION
// ============================================================================

/// Creates a CORS filter based on the configured allowed origins.
fn create_cors_filter(allowed_origins: &[String]) -> warp::cors::Builder {
    let methods = vec![Method::GET, Method::POST, Method::OPTIONS];

    if allowed_origins.iter().any(|origin| origin == "*") {
        warp::cors()
            .allow_any_origin()
            .allow_methods(methods)
            .allow_headers(vec!["content-type"])
    } else {
        let origins: Vec<&str> = allowed_origins.iter().map(|s| s.as_str()).collect();
        warp::cors()
            .allow_origins(origins)
            .allow_methods(methods)
            .allow_headers(vec!["content-type"])
    }
}

// ============================================================================
// REJECTION HANDLER
// ============================================================================

/// Global rejection handler for all API routes.
///
/// Converts warp rejections into `ApiResponse` errors with a matching status.
pub async fn handle_rejection(rej: Rejection) -> Result<impl Reply, std::convert::Infallible> {
    let (status, message) = if let Some(err) = rej.find::<InvalidRequest>() {
        (StatusCode::BAD_REQUEST, err.0.clone())
    } else if let Some(err) = rej.find::<warp::reject::InvalidQuery>() {
        (StatusCode::BAD_REQUEST, format!("Invalid query: {}", err))
    } else if rej.is_not_found() {
        (StatusCode::NOT_FOUND, "Endpoint not found".to_string())
    } else if rej.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed".to_string())
    } else {
        error!("Unhandled rejection: {:?}", rej);
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
    };

    Ok(error_reply(status, message))
}

// ============================================================================
// API SERVER IMPLEMENTATION
// ============================================================================

/// REST API server for the router swap service.
///
/// Read-only projections of swaps and configuration, plus swap registration.
pub struct ApiServer {
    state: Arc<ApiState>,
}

impl ApiServer {
    pub fn new(
        config: Arc<Config>,
        store: Arc<dyn SwapStore>,
        policy: Arc<dyn PolicyEngine>,
        bridges: Arc<RouterBridges>,
        is_server: bool,
    ) -> Self {
        let tokens = Arc::new(TokenRegistry::from_config(&config));
        Self {
            state: Arc::new(ApiState {
                config,
                store,
                policy,
                bridges,
                tokens,
                is_server,
            }),
        }
    }

    /// Starts the API server and serves until the process exits.
    pub async fn run(&self) -> Result<()> {
        let api = &self.state.config.api;
        info!("Starting API server on {}:{}", api.host, api.port);

        let routes = self.create_routes();

        let addr: std::net::SocketAddr = format!("{}:{}", api.host, api.port)
            .parse()
            .context("Failed to parse API server address")?;

        warp::serve(routes).run(addr).await;

        Ok(())
    }

    /// Creates all API routes for the server.
    pub(crate) fn create_routes(
        &self,
    ) -> impl Filter<Extract = impl warp::Reply, Error = std::convert::Infallible> + Clone {
        use super::swap;
        use super::tokens;

        let state = self.state.clone();

        // Health check endpoint - returns service status
        let health = warp::path("health").and(warp::path::end()).and(warp::get()).map(|| {
            ok_reply("Router Swap Service is running".to_string())
        });

        let version = warp::path("versioninfo")
            .and(warp::path::end())
            .and(warp::get())
            .map(|| {
                ok_reply(VersionInfo {
                    name: env!("CARGO_PKG_NAME").to_string(),
                    version: env!("CARGO_PKG_VERSION").to_string(),
                })
            });

        let server_info = warp::path("serverinfo")
            .and(warp::path::end())
            .and(warp::get())
            .and(with_state(state.clone()))
            .and_then(get_server_info_handler);

        // POST /swap/register - register a swap for verification
        let register = warp::path!("swap" / "register")
            .and(warp::post())
            .and(warp::body::bytes())
            .and(with_state(state.clone()))
            .and_then(|body: Bytes, state: Arc<ApiState>| async move {
                let body_str = String::from_utf8_lossy(&body);
                debug!("POST /swap/register - Received body: {}", body_str);

                match serde_json::from_slice::<swap::RegisterSwapRequest>(&body) {
                    Ok(request) => swap::register_swap_handler(request, state).await,
                    Err(e) => Err(warp::reject::custom(InvalidRequest(format!("Invalid JSON: {}", e)))),
                }
            });

        let get_swap = warp::path!("swap" / String / String / String)
            .and(warp::get())
            .and(with_state(state.clone()))
            .and_then(swap::get_swap_handler);

        let history = warp::path!("history" / String / String)
            .and(warp::get())
            .and(warp::query::<std::collections::HashMap<String, String>>())
            .and(with_state(state.clone()))
            .and_then(swap::get_swap_history_handler);

        let chain_ids = warp::path("chainids")
            .and(warp::path::end())
            .and(warp::get())
            .and(with_state(state.clone()))
            .and_then(tokens::get_chain_ids_handler);

        let token_ids = warp::path("tokenids")
            .and(warp::path::end())
            .and(warp::get())
            .and(with_state(state.clone()))
            .and_then(tokens::get_token_ids_handler);

        let multichain_tokens = warp::path!("multichaintokens" / String)
            .and(warp::get())
            .and(with_state(state.clone()))
            .and_then(tokens::get_multichain_tokens_handler);

        let chain_config = warp::path!("chainconfig" / String)
            .and(warp::get())
            .and(with_state(state.clone()))
            .and_then(tokens::get_chain_config_handler);

        let token_config = warp::path!("tokenconfig" / String / String)
            .and(warp::get())
            .and(with_state(state.clone()))
            .and_then(tokens::get_token_config_handler);

        let swap_config = warp::path!("swapconfig" / String / String)
            .and(warp::get())
            .and(with_state(state))
            .and_then(tokens::get_swap_config_handler);

        health
            .or(version)
            .or(server_info)
            .or(register)
            .or(get_swap)
            .or(history)
            .or(chain_ids)
            .or(token_ids)
            .or(multichain_tokens)
            .or(chain_config)
            .or(token_config)
            .or(swap_config)
            .with(create_cors_filter(&self.state.config.api.cors_origins))
            .recover(handle_rejection)
    }

    /// Exposes the routes to integration tests.
    pub fn test_routes(&self) -> impl Filter<Extract = impl warp::Reply, Error = std::convert::Infallible> + Clone {
        self.create_routes()
    }
}
