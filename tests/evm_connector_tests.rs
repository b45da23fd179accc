//! Unit tests for the EVM connector
//!
//! A wiremock server plays the JSON-RPC node; each test scripts one receipt
//! and checks how the connector classifies it.

use ethereum_types::U256;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

use router_swap::bridge::evm::{event_topic, parse_any_swap_out, EvmLog, LOG_ANY_SWAP_OUT_SIGNATURE};
use router_swap::bridge::{ChainConnector, EvmConnector, SwapType, TokenRegistry, VerifyArgs};
use router_swap::config::{ChainConfig, Config};
use router_swap::error::SwapError;

#[path = "mod.rs"]
mod test_helpers;
use test_helpers::{
    build_test_config_with_gateway, source_chain_config, DST_CHAIN_ID, DUMMY_RECEIVER_ADDR, DUMMY_ROUTER_ADDR,
    DUMMY_SENDER_ADDR, DUMMY_TOKEN_ADDR_SRC, DUMMY_TX_HASH, SRC_CHAIN_ID,
};

const SWAP_BLOCK: u64 = 100;
/// Swap block plus the 5 configured confirmations
const STABLE_HEAD: u64 = 105;
/// 2 USDC with 6 decimals
const SWAP_AMOUNT: u64 = 2_000_000;

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

fn address_topic(address: &str) -> String {
    format!("0x{:0>64}", address.trim_start_matches("0x"))
}

fn word(value: u64) -> String {
    format!("{:064x}", value)
}

/// `LogAnySwapOut` emitted by the source router.
fn swap_log(amount: u64, from_chain_id: u64, to_chain_id: u64) -> Value {
    json!({
        "address": DUMMY_ROUTER_ADDR,
        "topics": [
            event_topic(LOG_ANY_SWAP_OUT_SIGNATURE),
            address_topic(DUMMY_TOKEN_ADDR_SRC),
            address_topic(DUMMY_SENDER_ADDR),
            address_topic(DUMMY_RECEIVER_ADDR),
        ],
        "data": format!("0x{}{}{}", word(amount), word(from_chain_id), word(to_chain_id)),
        "removed": false
    })
}

fn receipt(status: &str, logs: Vec<Value>) -> Value {
    json!({
        "blockNumber": format!("0x{:x}", SWAP_BLOCK),
        "status": status,
        "from": DUMMY_SENDER_ADDR,
        "to": DUMMY_ROUTER_ADDR,
        "logs": logs
    })
}

fn rpc_result(result: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "jsonrpc": "2.0", "id": 1, "result": result }))
}

/// Mounts a node answering with `receipt` and a head block of `head`.
async fn mock_node(receipt: Value, head: u64) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "method": "eth_getTransactionReceipt" })))
        .respond_with(rpc_result(receipt))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "method": "eth_blockNumber" })))
        .respond_with(rpc_result(json!(format!("0x{:x}", head))))
        .mount(&server)
        .await;
    server
}

fn connector_for(chain: ChainConfig, config: &Config) -> EvmConnector {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(2))
        .no_proxy()
        .build()
        .unwrap();
    EvmConnector::new(chain, client, Arc::new(TokenRegistry::from_config(config))).unwrap()
}

fn connector(gateway: &str) -> EvmConnector {
    connector_for(source_chain_config(gateway), &build_test_config_with_gateway(gateway))
}

fn stable_args() -> VerifyArgs {
    VerifyArgs {
        swap_type: SwapType::Erc20Swap,
        log_index: 0,
        allow_unstable: false,
    }
}

async fn verify_receipt(receipt: Value) -> Result<router_swap::bridge::SwapTxInfo, SwapError> {
    let server = mock_node(receipt, STABLE_HEAD).await;
    connector(&server.uri()).verify_transaction(DUMMY_TX_HASH, &stable_args()).await
}

// ============================================================================
// SUCCESSFUL VERIFICATION
// ============================================================================

/// Test that a valid swap log is decoded into a swap descriptor
/// What is tested: full verification against a mocked node
/// Why: every downstream status depends on these fields
#[tokio::test]
async fn test_verify_valid_swap() {
    let info = verify_receipt(receipt("0x1", vec![swap_log(SWAP_AMOUNT, SRC_CHAIN_ID, DST_CHAIN_ID)]))
        .await
        .unwrap();

    assert_eq!(info.hash, DUMMY_TX_HASH);
    assert_eq!(info.height, SWAP_BLOCK);
    assert_eq!(info.from_chain_id, SRC_CHAIN_ID);
    assert_eq!(info.to_chain_id, DST_CHAIN_ID);
    assert_eq!(info.value, U256::from(SWAP_AMOUNT));
    assert_eq!(info.token, DUMMY_TOKEN_ADDR_SRC);
    assert_eq!(info.token_id, "USDC");
    assert_eq!(info.from, DUMMY_SENDER_ADDR);
    assert_eq!(info.bind, DUMMY_RECEIVER_ADDR);
    assert_eq!(info.tx_to, DUMMY_ROUTER_ADDR);
}

/// Test that finality is only enforced when unstable transactions are not allowed
/// What is tested: confirmations check with allow_unstable false and true
/// Why: registration accepts fresh transactions, verification does not
#[tokio::test]
async fn test_unstable_transaction() {
    let server = mock_node(
        receipt("0x1", vec![swap_log(SWAP_AMOUNT, SRC_CHAIN_ID, DST_CHAIN_ID)]),
        STABLE_HEAD - 1,
    )
    .await;
    let connector = connector(&server.uri());

    let result = connector.verify_transaction(DUMMY_TX_HASH, &stable_args()).await;
    assert_eq!(result, Err(SwapError::TxNotStable));

    let args = VerifyArgs {
        allow_unstable: true,
        ..stable_args()
    };
    assert!(connector.verify_transaction(DUMMY_TX_HASH, &args).await.is_ok());
}

// ============================================================================
// TRANSIENT FAILURES
// ============================================================================

/// Test that an unknown transaction is reported as not found
/// Why: the node may not have seen the transaction yet
#[tokio::test]
async fn test_transaction_not_found() {
    assert_eq!(verify_receipt(Value::Null).await, Err(SwapError::TxNotFound));
}

/// Test that a pending receipt without block number is not stable
/// Why: a receipt without block is not mined yet
#[tokio::test]
async fn test_receipt_without_block_number() {
    let mut pending = receipt("0x1", vec![swap_log(SWAP_AMOUNT, SRC_CHAIN_ID, DST_CHAIN_ID)]);
    pending["blockNumber"] = Value::Null;
    assert_eq!(verify_receipt(pending).await, Err(SwapError::TxNotStable));
}

/// Test that JSON-RPC and transport errors become RpcQueryError
/// What is tested: node error response and unreachable gateway
/// Why: RPC trouble is transient and must not reject the swap
#[tokio::test]
async fn test_rpc_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": { "code": -32000, "message": "header not found" }
        })))
        .mount(&server)
        .await;

    let result = connector(&server.uri()).verify_transaction(DUMMY_TX_HASH, &stable_args()).await;
    assert!(matches!(result, Err(SwapError::RpcQueryError(ref msg)) if msg.contains("header not found")));

    let result = connector("http://127.0.0.1:1").verify_transaction(DUMMY_TX_HASH, &stable_args()).await;
    assert!(matches!(result, Err(SwapError::RpcQueryError(_))));
}

/// Test that a failing gateway falls through to the next one
/// What is tested: gateway failover in RPC calls
/// Why: one broken node must not stall verification
#[tokio::test]
async fn test_gateway_failover() {
    let broken = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&broken)
        .await;
    let healthy = mock_node(
        receipt("0x1", vec![swap_log(SWAP_AMOUNT, SRC_CHAIN_ID, DST_CHAIN_ID)]),
        STABLE_HEAD,
    )
    .await;

    let mut chain = source_chain_config(&broken.uri());
    chain.gateways.push(healthy.uri());
    let connector = connector_for(chain, &build_test_config_with_gateway(&broken.uri()));

    assert!(connector.verify_transaction(DUMMY_TX_HASH, &stable_args()).await.is_ok());
}

// ============================================================================
// REJECTED TRANSACTIONS
// ============================================================================

/// Test receipt and log level rejections
/// What is tested: failed receipt, log index, removed log, wrong contract, wrong topic
/// Why: only successful router swap logs may be relayed
#[tokio::test]
async fn test_receipt_and_log_rejections() {
    let log = swap_log(SWAP_AMOUNT, SRC_CHAIN_ID, DST_CHAIN_ID);

    assert_eq!(
        verify_receipt(receipt("0x0", vec![log.clone()])).await,
        Err(SwapError::TxWithWrongReceipt)
    );

    assert_eq!(
        verify_receipt(receipt("0x1", vec![])).await,
        Err(SwapError::LogIndexOutOfRange(0))
    );

    let mut removed = log.clone();
    removed["removed"] = json!(true);
    assert_eq!(
        verify_receipt(receipt("0x1", vec![removed])).await,
        Err(SwapError::TxWithRemovedLog)
    );

    let mut other_contract = log.clone();
    other_contract["address"] = json!("0x00000000000000000000000000000000000000ee");
    assert!(matches!(
        verify_receipt(receipt("0x1", vec![other_contract])).await,
        Err(SwapError::TxWithWrongContract(_))
    ));

    let mut other_event = log.clone();
    other_event["topics"][0] = json!(event_topic("Transfer(address,address,uint256)"));
    assert_eq!(
        verify_receipt(receipt("0x1", vec![other_event])).await,
        Err(SwapError::SwapoutLogNotFound)
    );

    let mut short_data = log;
    short_data["data"] = json!("0x1234");
    assert!(matches!(
        verify_receipt(receipt("0x1", vec![short_data])).await,
        Err(SwapError::WrongLogData(_))
    ));
}

/// Test swap path rejections
/// What is tested: wrong source chain, same destination, unsupported destination
/// Why: a swap must leave this chain for another configured chain
#[tokio::test]
async fn test_wrong_path() {
    for (from, to) in [(DST_CHAIN_ID, SRC_CHAIN_ID), (SRC_CHAIN_ID, SRC_CHAIN_ID), (SRC_CHAIN_ID, 137)] {
        let result = verify_receipt(receipt("0x1", vec![swap_log(SWAP_AMOUNT, from, to)])).await;
        assert!(
            matches!(result, Err(SwapError::TxWithWrongPath(_))),
            "{} -> {} gave {:?}",
            from,
            to,
            result
        );
    }
}

/// Test swap value limits
/// What is tested: below minimum and above maximum
/// Why: limits protect the destination liquidity
#[tokio::test]
async fn test_wrong_value() {
    // minimum is 1 USDC, maximum 5,000,000 USDC
    for amount in [999_999u64, 5_000_000_000_001] {
        let result = verify_receipt(receipt("0x1", vec![swap_log(amount, SRC_CHAIN_ID, DST_CHAIN_ID)])).await;
        assert!(matches!(result, Err(SwapError::TxWithWrongValue(_))), "{} gave {:?}", amount, result);
    }
}

/// Test token configuration rejections
/// What is tested: unknown source token, missing destination token, missing underlying
/// Why: the destination must be able to pay out the same token
#[tokio::test]
async fn test_token_config_rejections() {
    let server = mock_node(
        receipt("0x1", vec![swap_log(SWAP_AMOUNT, SRC_CHAIN_ID, DST_CHAIN_ID)]),
        STABLE_HEAD,
    )
    .await;

    // source chain does not know the token
    let mut chain = source_chain_config(&server.uri());
    chain.tokens[0].address = "0x00000000000000000000000000000000000000c9".to_string();
    let result = connector_for(chain, &build_test_config_with_gateway(&server.uri()))
        .verify_transaction(DUMMY_TX_HASH, &stable_args())
        .await;
    assert!(matches!(result, Err(SwapError::MissTokenConfig(_))), "{:?}", result);

    // destination chain does not list the token ID
    let mut config = build_test_config_with_gateway(&server.uri());
    config.chains[1].tokens[0].token_id = "USDT".to_string();
    let result = connector_for(source_chain_config(&server.uri()), &config)
        .verify_transaction(DUMMY_TX_HASH, &stable_args())
        .await;
    assert!(matches!(result, Err(SwapError::MissTokenConfig(_))), "{:?}", result);

    // destination has no underlying token
    let mut config = build_test_config_with_gateway(&server.uri());
    config.chains[1].tokens[0].underlying = None;
    let result = connector_for(source_chain_config(&server.uri()), &config)
        .verify_transaction(DUMMY_TX_HASH, &stable_args())
        .await;
    assert!(matches!(result, Err(SwapError::NoUnderlyingToken(_))), "{:?}", result);
}

/// Test that only ERC20 swaps are supported
/// Why: other swap kinds have no log parser
#[tokio::test]
async fn test_unsupported_swap_type() {
    let args = VerifyArgs {
        swap_type: SwapType::NftSwap,
        ..stable_args()
    };
    let result = connector("http://127.0.0.1:1").verify_transaction(DUMMY_TX_HASH, &args).await;
    assert_eq!(result, Err(SwapError::SwapTypeNotSupported("NftSwap".to_string())));
}

// ============================================================================
// GATEWAYS AND CONSTRUCTION
// ============================================================================

/// Test that gateways are re-ranked by block height
/// What is tested: adjust_gateway_order with a lagging and an unreachable node
/// Why: requests should hit the most up-to-date node first
#[tokio::test]
async fn test_adjust_gateway_order() {
    let lagging = mock_node(Value::Null, 0x10).await;
    let leading = mock_node(Value::Null, 0x20).await;
    let unreachable = "http://127.0.0.1:1".to_string();

    let mut chain = source_chain_config(&unreachable);
    chain.gateways.push(lagging.uri());
    chain.gateways.push(leading.uri());
    let connector = connector_for(chain, &build_test_config_with_gateway(&lagging.uri()));

    connector.adjust_gateway_order().await;

    assert_eq!(connector.gateways().await, vec![leading.uri(), lagging.uri(), unreachable]);
}

/// Test that a malformed router contract is rejected at construction
/// Why: every log check compares against the router address
#[test]
fn test_new_rejects_bad_router() {
    let mut chain = source_chain_config("http://127.0.0.1:18545");
    chain.router_contract = "0x1234".to_string();
    let result = EvmConnector::new(chain, reqwest::Client::new(), Arc::new(TokenRegistry::default()));
    assert!(result.is_err());
}

/// Test log decoding on its own
/// What is tested: topics to addresses, data words to amounts and chain IDs
/// Why: addresses are right-aligned in 32-byte topics
#[test]
fn test_parse_any_swap_out() {
    let log: EvmLog = serde_json::from_value(swap_log(SWAP_AMOUNT, SRC_CHAIN_ID, DST_CHAIN_ID)).unwrap();
    let event = parse_any_swap_out(&log).unwrap();

    assert_eq!(event.token, DUMMY_TOKEN_ADDR_SRC);
    assert_eq!(event.from, DUMMY_SENDER_ADDR);
    assert_eq!(event.to, DUMMY_RECEIVER_ADDR);
    assert_eq!(event.amount, U256::from(SWAP_AMOUNT));
    assert_eq!(event.from_chain_id, U256::from(SRC_CHAIN_ID));
    assert_eq!(event.to_chain_id, U256::from(DST_CHAIN_ID));
}

/// Test that a malformed address topic is rejected instead of panicking
/// What is tested: non-hex and multi-byte characters in a 64-character topic
/// Why: topics come from the RPC node and must not crash the verify job
#[test]
fn test_parse_any_swap_out_rejects_bad_topic() {
    let mut value = swap_log(SWAP_AMOUNT, SRC_CHAIN_ID, DST_CHAIN_ID);
    value["topics"][1] = json!(format!("0x{}\u{e9}{}", "a".repeat(23), "a".repeat(39)));
    let log: EvmLog = serde_json::from_value(value).unwrap();
    assert!(matches!(parse_any_swap_out(&log), Err(SwapError::WrongLogData(_))));

    let mut value = swap_log(SWAP_AMOUNT, SRC_CHAIN_ID, DST_CHAIN_ID);
    value["topics"][2] = json!(format!("0x{}", "z".repeat(64)));
    let log: EvmLog = serde_json::from_value(value).unwrap();
    assert!(matches!(parse_any_swap_out(&log), Err(SwapError::WrongLogData(_))));
}

/// Test that a malformed topic in a receipt becomes a verification failure
/// Why: the verify job reports it as WrongLogData and keeps running
#[tokio::test]
async fn test_verify_rejects_non_hex_topic() {
    let mut log = swap_log(SWAP_AMOUNT, SRC_CHAIN_ID, DST_CHAIN_ID);
    log["topics"][3] = json!(format!("0x{}\u{e9}{}", "0".repeat(23), "0".repeat(39)));
    let result = verify_receipt(receipt("0x1", vec![log])).await;
    assert!(matches!(result, Err(SwapError::WrongLogData(_))), "{:?}", result);
}
