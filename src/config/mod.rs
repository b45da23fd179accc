//! Configuration Management Module
//!
//! This module handles loading and managing configuration for the router swap service.
//! Configuration includes chain gateways and token settings, job timing, swap policy
//! (blacklists and big-value thresholds) and API settings.

use anyhow::Context;
use ethereum_types::U256;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Environment variable that overrides every other config path source.
pub const CONFIG_PATH_ENV: &str = "ROUTER_CONFIG_PATH";
/// Config file used when nothing else is specified.
pub const DEFAULT_CONFIG_PATH: &str = "config/router.toml";
/// Config file used with `--testnet`.
pub const TESTNET_CONFIG_PATH: &str = "config/router_testnet.toml";

const SECONDS_PER_DAY: u64 = 24 * 3600;

// ============================================================================
// CONFIGURATION STRUCTURES
// ============================================================================

/// Main configuration structure containing all service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Identifier reported by the server info endpoint
    #[serde(default = "default_identifier")]
    pub identifier: String,
    /// Job timing settings
    #[serde(default)]
    pub jobs: JobsConfig,
    /// Outbound HTTP client settings
    #[serde(default)]
    pub http: HttpConfig,
    /// Swap policy (blacklists, big-value thresholds, whitelist)
    #[serde(default)]
    pub policy: PolicyConfig,
    /// Supported chains
    #[serde(default)]
    pub chains: Vec<ChainConfig>,
    /// API server configuration (host, port, CORS settings)
    pub api: ApiConfig,
}

/// Configuration for one supported chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Human-readable name for the chain
    pub name: String,
    /// Unique chain identifier
    pub chain_id: u64,
    /// RPC gateway URLs, tried in order
    pub gateways: Vec<String>,
    /// Address of the router contract emitting swap logs
    pub router_contract: String,
    /// Blocks required on top of the swap block before it is final
    #[serde(default)]
    pub confirmations: u64,
    /// Tokens routable from/to this chain
    #[serde(default)]
    pub tokens: Vec<TokenConfig>,
}

/// Configuration for one token on one chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenConfig {
    /// Cross-chain token ID (e.g. "USDC"); identical on every chain
    pub token_id: String,
    /// Token contract address on this chain
    pub address: String,
    /// Token decimals on this chain
    pub decimals: u8,
    /// Underlying token address, if this token wraps one
    #[serde(default)]
    pub underlying: Option<String>,
    /// Minimum swap amount in whole-token units (decimal string)
    #[serde(default = "default_minimum_swap")]
    pub minimum_swap: String,
    /// Maximum swap amount in whole-token units (decimal string)
    #[serde(default = "default_maximum_swap")]
    pub maximum_swap: String,
}

impl TokenConfig {
    /// Minimum swap value in the token's smallest unit.
    pub fn minimum_swap_value(&self) -> Result<U256, String> {
        parse_units(&self.minimum_swap, self.decimals)
    }

    /// Maximum swap value in the token's smallest unit.
    pub fn maximum_swap_value(&self) -> Result<U256, String> {
        parse_units(&self.maximum_swap, self.decimals)
    }
}

/// Job timing parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobsConfig {
    /// Rest between verify passes in milliseconds
    #[serde(default = "default_verify_interval_ms")]
    pub verify_interval_ms: u64,
    /// Swaps older than this are no longer verified
    #[serde(default = "default_max_lifetime_secs")]
    pub max_verify_lifetime_secs: u64,
    /// Rest between big-value pass-through passes in milliseconds
    #[serde(default = "default_pass_big_value_interval_ms")]
    pub pass_big_value_interval_ms: u64,
    /// Big-value swaps older than this are no longer considered
    #[serde(default = "default_max_lifetime_secs")]
    pub max_pass_big_value_lifetime_secs: u64,
    /// Age a big-value swap must reach before it is passed automatically (0 disables)
    #[serde(default)]
    pub pass_big_value_time_required_secs: u64,
    /// Rest between gateway re-ranking passes in milliseconds
    #[serde(default = "default_gateway_adjust_interval_ms")]
    pub gateway_adjust_interval_ms: u64,
    /// Pause between starting consecutive jobs in milliseconds
    #[serde(default = "default_start_interval_ms")]
    pub start_interval_ms: u64,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            verify_interval_ms: default_verify_interval_ms(),
            max_verify_lifetime_secs: default_max_lifetime_secs(),
            pass_big_value_interval_ms: default_pass_big_value_interval_ms(),
            max_pass_big_value_lifetime_secs: default_max_lifetime_secs(),
            pass_big_value_time_required_secs: 0,
            gateway_adjust_interval_ms: default_gateway_adjust_interval_ms(),
            start_interval_ms: default_start_interval_ms(),
        }
    }
}

/// Outbound HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Request timeout in milliseconds
    #[serde(default = "default_http_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_http_timeout_ms(),
        }
    }
}

/// Swap policy configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Chains that may neither send nor receive swaps
    #[serde(default)]
    pub blacklisted_chain_ids: Vec<u64>,
    /// Token IDs that may not be swapped
    #[serde(default)]
    pub blacklisted_token_ids: Vec<String>,
    /// Big-value thresholds keyed by token ID
    #[serde(default)]
    pub big_value_thresholds: HashMap<String, BigValueThresholdConfig>,
    /// Addresses exempt from the big-value hold, keyed by token ID
    #[serde(default)]
    pub big_value_whitelist: HashMap<String, Vec<String>>,
}

/// Big-value threshold of one token, in whole-token units.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BigValueThresholdConfig {
    /// Threshold for any destination chain without an override
    #[serde(default)]
    pub default: Option<String>,
    /// Per-destination overrides keyed by chain ID
    #[serde(default)]
    pub chains: HashMap<String, String>,
}

/// API server configuration for external communication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Host address to bind the API server to
    pub host: String,
    /// Port number to bind the API server to
    pub port: u16,
    /// Allowed CORS origins for cross-origin requests
    pub cors_origins: Vec<String>,
}

fn default_identifier() -> String {
    "router-swap".to_string()
}

fn default_minimum_swap() -> String {
    "0".to_string()
}

fn default_maximum_swap() -> String {
    "1000000000000".to_string()
}

fn default_verify_interval_ms() -> u64 {
    3000
}

fn default_max_lifetime_secs() -> u64 {
    7 * SECONDS_PER_DAY
}

fn default_pass_big_value_interval_ms() -> u64 {
    10_000
}

fn default_gateway_adjust_interval_ms() -> u64 {
    60_000
}

fn default_start_interval_ms() -> u64 {
    10
}

fn default_http_timeout_ms() -> u64 {
    30_000
}

// ============================================================================
// CONFIGURATION LOADING AND MANAGEMENT
// ============================================================================

impl Config {
    /// Resolves which config file to read.
    ///
    /// Precedence: `ROUTER_CONFIG_PATH` env var, then `--config`, then
    /// `--testnet`, then the default path.
    pub fn resolve_path(cli_path: Option<&str>, testnet: bool) -> String {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            return path;
        }
        match cli_path {
            Some(path) => path.to_string(),
            None if testnet => TESTNET_CONFIG_PATH.to_string(),
            None => DEFAULT_CONFIG_PATH.to_string(),
        }
    }

    /// Loads and validates configuration from a TOML file.
    pub fn load_from(config_path: &str) -> anyhow::Result<Self> {
        if !std::path::Path::new(config_path).exists() {
            return Err(anyhow::anyhow!(
                "Configuration file '{}' not found. Please copy the template:\n\
                cp config/router.template.toml config/router.toml\n\
                Then edit config/router.toml with your actual values.",
                config_path
            ));
        }

        let content = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file {}", config_path))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", config_path))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// This function ensures that:
    /// - chain IDs are unique and every chain has at least one valid gateway URL
    /// - token addresses are unique per chain and swap amounts parse with the token decimals
    /// - policy thresholds are valid decimal amounts
    pub fn validate(&self) -> anyhow::Result<()> {
        let mut chain_ids = HashSet::new();
        for chain in &self.chains {
            if !chain_ids.insert(chain.chain_id) {
                anyhow::bail!(
                    "Configuration error: chain ID {} is configured more than once. Each chain must have a unique chain ID.",
                    chain.chain_id
                );
            }
            if chain.gateways.is_empty() {
                anyhow::bail!("Configuration error: chain {} has no gateways", chain.chain_id);
            }
            for gateway in &chain.gateways {
                url::Url::parse(gateway).with_context(|| {
                    format!("Configuration error: invalid gateway '{}' for chain {}", gateway, chain.chain_id)
                })?;
            }

            let mut token_addrs = HashSet::new();
            for token in &chain.tokens {
                if !token_addrs.insert(token.address.to_lowercase()) {
                    anyhow::bail!(
                        "Configuration error: token {} configured twice on chain {}",
                        token.address,
                        chain.chain_id
                    );
                }
                let minimum = token.minimum_swap_value().map_err(|e| {
                    anyhow::anyhow!("Invalid minimum_swap for {} on chain {}: {}", token.token_id, chain.chain_id, e)
                })?;
                let maximum = token.maximum_swap_value().map_err(|e| {
                    anyhow::anyhow!("Invalid maximum_swap for {} on chain {}: {}", token.token_id, chain.chain_id, e)
                })?;
                if minimum > maximum {
                    anyhow::bail!(
                        "Configuration error: minimum_swap exceeds maximum_swap for {} on chain {}",
                        token.token_id,
                        chain.chain_id
                    );
                }
            }
        }

        for (token_id, threshold) in &self.policy.big_value_thresholds {
            let amounts = threshold.default.iter().chain(threshold.chains.values());
            for amount in amounts {
                if !is_decimal_amount(amount) {
                    anyhow::bail!("Invalid big value threshold '{}' for token {}", amount, token_id);
                }
            }
            for chain_id in threshold.chains.keys() {
                chain_id.parse::<u64>().map_err(|_| {
                    anyhow::anyhow!("Invalid chain ID '{}' in big value thresholds of {}", chain_id, token_id)
                })?;
            }
        }

        Ok(())
    }

    /// Returns the configuration of `chain_id`, if configured.
    pub fn chain(&self, chain_id: u64) -> Option<&ChainConfig> {
        self.chains.iter().find(|chain| chain.chain_id == chain_id)
    }

    /// Creates a default configuration with placeholder values.
    ///
    /// No chains are configured; suitable for local development and testing.
    #[allow(clippy::should_implement_trait)]
    pub fn default() -> Self {
        Self {
            identifier: default_identifier(),
            jobs: JobsConfig::default(),
            http: HttpConfig::default(),
            policy: PolicyConfig::default(),
            chains: Vec::new(),
            api: ApiConfig {
                host: "127.0.0.1".to_string(),
                port: 11556,
                cors_origins: vec!["http://localhost:11556".to_string()],
            },
        }
    }
}

// ============================================================================
// AMOUNT PARSING
// ============================================================================

/// Returns true for plain decimal amounts such as `"100"` or `"0.25"`.
pub fn is_decimal_amount(amount: &str) -> bool {
    let mut parts = amount.splitn(2, '.');
    let whole = parts.next().unwrap_or_default();
    let fraction = parts.next();
    let digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    !whole.is_empty() && digits(whole) && fraction.map_or(true, |f| !f.is_empty() && digits(f))
}

/// Converts a whole-token decimal amount into smallest units.
///
/// `parse_units("1.5", 6)` is `1_500_000`. Fractions with more digits than
/// `decimals` are rejected rather than truncated.
pub fn parse_units(amount: &str, decimals: u8) -> Result<U256, String> {
    if !is_decimal_amount(amount) {
        return Err(format!("'{}' is not a decimal amount", amount));
    }
    let (whole, fraction) = amount.split_once('.').unwrap_or((amount, ""));
    let fraction = fraction.trim_end_matches('0');
    if fraction.len() > decimals as usize {
        return Err(format!("'{}' has more than {} decimal places", amount, decimals));
    }

    let padded = format!("{}{:0<width$}", whole, fraction, width = decimals as usize);
    U256::from_dec_str(&padded).map_err(|e| format!("'{}' out of range: {:?}", amount, e))
}
