//! Test module organization
//!
//! This module re-exports test helpers for use in test files.

mod helpers;

#[allow(unused_imports)]
pub use helpers::{
    bridges_with, build_test_config, build_test_config_with_gateway, build_test_policy, capture_logs,
    create_not_stable_swap, create_swap_info, create_swap_record, destination_chain_config, fast_settings,
    source_chain_config, store_with, swap_key, two_chain_toml, usdc_token, CountingStage, FailingStore, LogCounter,
    MockConnector, DST_CHAIN_ID, DUMMY_RECEIVER_ADDR, DUMMY_ROUTER_ADDR, DUMMY_ROUTER_ADDR_DST, DUMMY_SENDER_ADDR, DUMMY_TOKEN_ADDR_DST,
    DUMMY_TOKEN_ADDR_SRC, DUMMY_TX_HASH, DUMMY_TX_HASH_2, DUMMY_TX_HASH_3, DUMMY_UNDERLYING_SRC,
    DUMMY_WHITELISTED_ADDR, SRC_CHAIN_ID, USDC_THRESHOLD, USDC_THRESHOLD_UNITS,
};
