//! Swap Policy Module
//!
//! Blacklist membership and big-value rules consulted by the verification job.

use ethereum_types::U256;

use crate::config::{parse_units, PolicyConfig};

/// Policy rules applied to verified swaps.
pub trait PolicyEngine: Send + Sync {
    /// Returns the denial reason if the swap route or token is blacklisted.
    fn check_blacklist(&self, from_chain_id: u64, to_chain_id: u64, token_id: &str) -> Option<String>;

    fn is_blacklisted(&self, from_chain_id: u64, to_chain_id: u64, token_id: &str) -> bool {
        self.check_blacklist(from_chain_id, to_chain_id, token_id).is_some()
    }

    /// Big-value threshold in smallest units for a token with `decimals`.
    ///
    /// `U256::MAX` when no threshold applies.
    fn big_value_threshold(&self, token_id: &str, to_chain_id: u64, decimals: u8) -> U256;

    /// Whether `address` is exempt from the big-value hold for `token_id`.
    fn is_in_big_value_whitelist(&self, token_id: &str, address: &str) -> bool;
}

/// `PolicyEngine` backed by the `[policy]` config section.
#[derive(Debug, Clone, Default)]
pub struct ConfigPolicy {
    config: PolicyConfig,
}

impl ConfigPolicy {
    pub fn new(config: PolicyConfig) -> Self {
        Self { config }
    }

    fn threshold_amount(&self, token_id: &str, to_chain_id: u64) -> Option<&str> {
        let (_, threshold) = self
            .config
            .big_value_thresholds
            .iter()
            .find(|(id, _)| id.eq_ignore_ascii_case(token_id))?;

        threshold
            .chains
            .iter()
            .find(|(chain_id, _)| chain_id.parse::<u64>().ok() == Some(to_chain_id))
            .map(|(_, amount)| amount.as_str())
            .or(threshold.default.as_deref())
    }
}

impl PolicyEngine for ConfigPolicy {
    fn check_blacklist(&self, from_chain_id: u64, to_chain_id: u64, token_id: &str) -> Option<String> {
        let chains = &self.config.blacklisted_chain_ids;
        if chains.contains(&from_chain_id) {
            return Some(format!("from chain {} is blacklisted", from_chain_id));
        }
        if chains.contains(&to_chain_id) {
            return Some(format!("to chain {} is blacklisted", to_chain_id));
        }
        if self
            .config
            .blacklisted_token_ids
            .iter()
            .any(|id| id.eq_ignore_ascii_case(token_id))
        {
            return Some(format!("token {} is blacklisted", token_id));
        }
        None
    }

    fn big_value_threshold(&self, token_id: &str, to_chain_id: u64, decimals: u8) -> U256 {
        self.threshold_amount(token_id, to_chain_id)
            .and_then(|amount| parse_units(amount, decimals).ok())
            .unwrap_or(U256::MAX)
    }

    fn is_in_big_value_whitelist(&self, token_id: &str, address: &str) -> bool {
        self.config
            .big_value_whitelist
            .iter()
            .filter(|(id, _)| id.eq_ignore_ascii_case(token_id))
            .flat_map(|(_, addresses)| addresses.iter())
            .any(|whitelisted| whitelisted.eq_ignore_ascii_case(address))
    }
}
