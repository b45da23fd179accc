//! Shared test helpers
//!
//! The module is organized into several categories:
//! - **Configuration Builders**: test configs with two chains and one multichain token
//! - **Record Creators**: default swap records and verified swap descriptors
//! - **Mocks**: scripted chain connector, failing store, no-op stage handler
//! - **Log Capture**: tracing layer counting warn/error events

#![allow(dead_code)]

use async_trait::async_trait;
use ethereum_types::U256;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

use router_swap::bridge::{ChainConnector, ConnectorRegistry, RouterBridges, SwapTxInfo, SwapType, VerifyArgs};
use router_swap::config::{
    ApiConfig, BigValueThresholdConfig, ChainConfig, Config, HttpConfig, JobsConfig, PolicyConfig, TokenConfig,
};
use router_swap::error::{StoreError, SwapError};
use router_swap::shutdown::ShutdownSignal;
use router_swap::storage::{
    MatchStatus, MemorySwapStore, SwapKey, SwapRecord, SwapResult, SwapStatus, SwapStore,
};
use router_swap::worker::{now_unix, JobSettings, StageHandler};

// ============================================================================
// CONSTANTS
// ============================================================================

pub const SRC_CHAIN_ID: u64 = 1;
pub const DST_CHAIN_ID: u64 = 56;

/// Dummy transaction hash (32 bytes)
pub const DUMMY_TX_HASH: &str = "0x00000000000000000000000000000000000000000000000000000000000000a1";
/// Second dummy transaction hash
pub const DUMMY_TX_HASH_2: &str = "0x00000000000000000000000000000000000000000000000000000000000000a2";
/// Third dummy transaction hash
pub const DUMMY_TX_HASH_3: &str = "0x00000000000000000000000000000000000000000000000000000000000000a3";

/// Router contract on the source chain
pub const DUMMY_ROUTER_ADDR: &str = "0x00000000000000000000000000000000000000b1";
/// Router contract on the destination chain
pub const DUMMY_ROUTER_ADDR_DST: &str = "0x00000000000000000000000000000000000000b2";
/// USDC on the source chain (6 decimals)
pub const DUMMY_TOKEN_ADDR_SRC: &str = "0x00000000000000000000000000000000000000c1";
/// USDC on the destination chain (18 decimals)
pub const DUMMY_TOKEN_ADDR_DST: &str = "0x00000000000000000000000000000000000000c2";
pub const DUMMY_UNDERLYING_SRC: &str = "0x00000000000000000000000000000000000000d1";
pub const DUMMY_UNDERLYING_DST: &str = "0x00000000000000000000000000000000000000d2";
pub const DUMMY_SENDER_ADDR: &str = "0x00000000000000000000000000000000000000e1";
pub const DUMMY_RECEIVER_ADDR: &str = "0x00000000000000000000000000000000000000e2";
/// Address exempt from the big-value hold
pub const DUMMY_WHITELISTED_ADDR: &str = "0x00000000000000000000000000000000000000f1";

/// USDC big-value threshold in whole tokens
pub const USDC_THRESHOLD: &str = "1000";
/// USDC big-value threshold in source units (6 decimals)
pub const USDC_THRESHOLD_UNITS: u64 = 1_000_000_000;

// ============================================================================
// CONFIGURATION BUILDERS
// ============================================================================

pub fn usdc_token(address: &str, decimals: u8, underlying: Option<&str>) -> TokenConfig {
    TokenConfig {
        token_id: "USDC".to_string(),
        address: address.to_string(),
        decimals,
        underlying: underlying.map(str::to_string),
        minimum_swap: "1".to_string(),
        maximum_swap: "5000000".to_string(),
    }
}

pub fn source_chain_config(gateway: &str) -> ChainConfig {
    ChainConfig {
        name: "source".to_string(),
        chain_id: SRC_CHAIN_ID,
        gateways: vec![gateway.to_string()],
        router_contract: DUMMY_ROUTER_ADDR.to_string(),
        confirmations: 5,
        tokens: vec![usdc_token(DUMMY_TOKEN_ADDR_SRC, 6, Some(DUMMY_UNDERLYING_SRC))],
    }
}

pub fn destination_chain_config() -> ChainConfig {
    ChainConfig {
        name: "destination".to_string(),
        chain_id: DST_CHAIN_ID,
        gateways: vec!["http://127.0.0.1:18546".to_string()],
        router_contract: DUMMY_ROUTER_ADDR_DST.to_string(),
        confirmations: 5,
        tokens: vec![usdc_token(DUMMY_TOKEN_ADDR_DST, 18, Some(DUMMY_UNDERLYING_DST))],
    }
}

pub fn build_test_policy() -> PolicyConfig {
    let mut thresholds = HashMap::new();
    thresholds.insert(
        "USDC".to_string(),
        BigValueThresholdConfig {
            default: Some(USDC_THRESHOLD.to_string()),
            chains: HashMap::new(),
        },
    );
    let mut whitelist = HashMap::new();
    whitelist.insert("USDC".to_string(), vec![DUMMY_WHITELISTED_ADDR.to_string()]);

    PolicyConfig {
        blacklisted_chain_ids: Vec::new(),
        blacklisted_token_ids: Vec::new(),
        big_value_thresholds: thresholds,
        big_value_whitelist: whitelist,
    }
}

/// Test config with a source chain served at `gateway` and a destination chain.
pub fn build_test_config_with_gateway(gateway: &str) -> Config {
    Config {
        identifier: "router-swap-test".to_string(),
        jobs: JobsConfig {
            verify_interval_ms: 20,
            pass_big_value_interval_ms: 20,
            gateway_adjust_interval_ms: 20,
            start_interval_ms: 1,
            ..JobsConfig::default()
        },
        http: HttpConfig { timeout_ms: 2000 },
        policy: build_test_policy(),
        chains: vec![source_chain_config(gateway), destination_chain_config()],
        api: ApiConfig {
            host: "127.0.0.1".to_string(),
            port: 11556,
            cors_origins: vec!["*".to_string()],
        },
    }
}

pub fn build_test_config() -> Config {
    build_test_config_with_gateway("http://127.0.0.1:18545")
}

// ============================================================================
// RECORD CREATORS
// ============================================================================

/// Verified USDC swap from the source to the destination chain.
pub fn create_swap_info(txid: &str, value: U256) -> SwapTxInfo {
    SwapTxInfo {
        swap_type: SwapType::Erc20Swap,
        hash: txid.to_string(),
        height: 100,
        timestamp: 1_700_000_000,
        from_chain_id: SRC_CHAIN_ID,
        to_chain_id: DST_CHAIN_ID,
        log_index: 0,
        from: DUMMY_SENDER_ADDR.to_string(),
        tx_to: DUMMY_ROUTER_ADDR.to_string(),
        bind: DUMMY_RECEIVER_ADDR.to_string(),
        value,
        token: DUMMY_TOKEN_ADDR_SRC.to_string(),
        token_id: "USDC".to_string(),
    }
}

pub fn create_swap_record(txid: &str, status: SwapStatus, init_time: u64) -> SwapRecord {
    let mut record = SwapRecord::from_swap_info(&create_swap_info(txid, U256::from(5_000_000u64)), init_time);
    record.status = status;
    record
}

/// Fresh `NotStable` record created now.
pub fn create_not_stable_swap(txid: &str) -> SwapRecord {
    create_swap_record(txid, SwapStatus::NotStable, now_unix())
}

pub fn swap_key(txid: &str) -> SwapKey {
    SwapKey::new(SRC_CHAIN_ID, txid, 0)
}

pub async fn store_with(records: Vec<SwapRecord>) -> Arc<MemorySwapStore> {
    let store = Arc::new(MemorySwapStore::new());
    for record in records {
        store.add_swap(record).await.unwrap();
    }
    store
}

pub fn fast_settings() -> JobSettings {
    JobSettings {
        max_lifetime: Duration::from_secs(24 * 3600),
        rest_interval: Duration::from_millis(20),
    }
}

// ============================================================================
// MOCKS
// ============================================================================

/// Chain connector returning a scripted verification result.
pub struct MockConnector {
    config: ChainConfig,
    result: Mutex<Result<SwapTxInfo, SwapError>>,
    calls: AtomicUsize,
    args: Mutex<Vec<VerifyArgs>>,
    /// Requests shutdown on every call when set
    shutdown_on_call: Option<ShutdownSignal>,
}

impl MockConnector {
    pub fn new(result: Result<SwapTxInfo, SwapError>) -> Self {
        Self {
            config: source_chain_config("http://127.0.0.1:18545"),
            result: Mutex::new(result),
            calls: AtomicUsize::new(0),
            args: Mutex::new(Vec::new()),
            shutdown_on_call: None,
        }
    }

    pub fn verified(value: U256) -> Self {
        Self::new(Ok(create_swap_info(DUMMY_TX_HASH, value)))
    }

    pub fn failing(err: SwapError) -> Self {
        Self::new(Err(err))
    }

    pub fn with_config(mut self, config: ChainConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_shutdown_on_call(mut self, shutdown: ShutdownSignal) -> Self {
        self.shutdown_on_call = Some(shutdown);
        self
    }

    pub fn set_result(&self, result: Result<SwapTxInfo, SwapError>) {
        *self.result.lock().unwrap() = result;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn recorded_args(&self) -> Vec<VerifyArgs> {
        self.args.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChainConnector for MockConnector {
    fn chain_config(&self) -> &ChainConfig {
        &self.config
    }

    async fn verify_transaction(&self, txid: &str, args: &VerifyArgs) -> Result<SwapTxInfo, SwapError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.args.lock().unwrap().push(*args);
        if let Some(shutdown) = &self.shutdown_on_call {
            shutdown.shutdown();
        }
        let mut result = self.result.lock().unwrap().clone();
        if let Ok(info) = result.as_mut() {
            info.hash = txid.to_string();
            info.log_index = args.log_index;
        }
        result
    }
}

pub fn bridges_with(connector: Arc<MockConnector>) -> Arc<RouterBridges> {
    Arc::new(RouterBridges::new(ConnectorRegistry::new().with_connector(connector)))
}

/// Store wrapper whose queries or updates can be made to fail.
pub struct FailingStore {
    pub inner: MemorySwapStore,
    pub fail_find: bool,
    pub fail_update: bool,
}

impl FailingStore {
    pub fn failing_find() -> Self {
        Self {
            inner: MemorySwapStore::new(),
            fail_find: true,
            fail_update: false,
        }
    }

    pub fn failing_update() -> Self {
        Self {
            inner: MemorySwapStore::new(),
            fail_find: false,
            fail_update: true,
        }
    }
}

fn backend_error() -> StoreError {
    StoreError::Backend("connection refused".to_string())
}

#[async_trait]
impl SwapStore for FailingStore {
    async fn find_swaps_with_status(&self, status: SwapStatus, since: u64) -> Result<Vec<SwapRecord>, StoreError> {
        if self.fail_find {
            return Err(backend_error());
        }
        self.inner.find_swaps_with_status(status, since).await
    }

    async fn update_swap_status(
        &self,
        key: &SwapKey,
        status: SwapStatus,
        timestamp: u64,
        memo: &str,
    ) -> Result<(), StoreError> {
        if self.fail_update {
            return Err(backend_error());
        }
        self.inner.update_swap_status(key, status, timestamp, memo).await
    }

    async fn add_initial_swap_result(
        &self,
        info: &SwapTxInfo,
        status: MatchStatus,
        timestamp: u64,
    ) -> Result<(), StoreError> {
        self.inner.add_initial_swap_result(info, status, timestamp).await
    }

    async fn add_swap(&self, record: SwapRecord) -> Result<(), StoreError> {
        self.inner.add_swap(record).await
    }

    async fn get_swap(&self, key: &SwapKey) -> Result<Option<SwapRecord>, StoreError> {
        self.inner.get_swap(key).await
    }

    async fn get_swap_result(&self, key: &SwapKey) -> Result<Option<SwapResult>, StoreError> {
        self.inner.get_swap_result(key).await
    }

    async fn get_swap_history(
        &self,
        chain_id: u64,
        address: &str,
        offset: usize,
        limit: usize,
        statuses: &[SwapStatus],
    ) -> Result<Vec<SwapRecord>, StoreError> {
        self.inner
            .get_swap_history(chain_id, address, offset, limit, statuses)
            .await
    }
}

/// Stage handler that only counts the records it sees.
pub struct CountingStage {
    name: String,
    status: SwapStatus,
    pub processed: AtomicUsize,
}

impl CountingStage {
    pub fn new(name: &str, status: SwapStatus) -> Self {
        Self {
            name: name.to_string(),
            status,
            processed: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl StageHandler for CountingStage {
    fn job_name(&self) -> &str {
        &self.name
    }

    fn input_status(&self) -> SwapStatus {
        self.status
    }

    fn settings(&self) -> JobSettings {
        fast_settings()
    }

    async fn process(&self, _swap: &SwapRecord) -> Result<(), SwapError> {
        self.processed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ============================================================================
// LOG CAPTURE
// ============================================================================

/// Counts warn and error events seen by the current thread's subscriber.
#[derive(Clone, Default)]
pub struct LogCounter {
    errors: Arc<AtomicUsize>,
    warnings: Arc<AtomicUsize>,
}

impl LogCounter {
    pub fn errors(&self) -> usize {
        self.errors.load(Ordering::SeqCst)
    }

    pub fn warnings(&self) -> usize {
        self.warnings.load(Ordering::SeqCst)
    }
}

impl<S: Subscriber> Layer<S> for LogCounter {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        match *event.metadata().level() {
            Level::ERROR => {
                self.errors.fetch_add(1, Ordering::SeqCst);
            }
            Level::WARN => {
                self.warnings.fetch_add(1, Ordering::SeqCst);
            }
            _ => {}
        }
    }
}

/// Installs a `LogCounter` for the current thread until the guard drops.
pub fn capture_logs() -> (LogCounter, tracing::subscriber::DefaultGuard) {
    let counter = LogCounter::default();
    let subscriber = tracing_subscriber::registry().with(counter.clone());
    let guard = tracing::subscriber::set_default(subscriber);
    (counter, guard)
}

// ============================================================================
// TOML FIXTURES
// ============================================================================

/// Minimal config file: two chains, one token each, optional sections omitted.
pub fn two_chain_toml() -> String {
    format!(
        r#"
[policy]
blacklisted_chain_ids = []

[policy.big_value_thresholds.USDC]
default = "1000"
chains = {{ "56" = "500" }}

[[chains]]
name = "source"
chain_id = 1
gateways = ["http://127.0.0.1:18545"]
router_contract = "{router}"

[[chains.tokens]]
token_id = "USDC"
address = "{src_token}"
decimals = 6

[[chains]]
name = "destination"
chain_id = 56
gateways = ["http://127.0.0.1:18546"]
router_contract = "{router_dst}"

[[chains.tokens]]
token_id = "USDC"
address = "{dst_token}"
decimals = 18

[api]
host = "127.0.0.1"
port = 11556
cors_origins = ["*"]
"#,
        router = DUMMY_ROUTER_ADDR,
        src_token = DUMMY_TOKEN_ADDR_SRC,
        router_dst = DUMMY_ROUTER_ADDR_DST,
        dst_token = DUMMY_TOKEN_ADDR_DST,
    )
}
