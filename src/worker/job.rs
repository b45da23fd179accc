//! Store-driven job loop
//!
//! Every pipeline stage follows the same pattern: fetch the records in the
//! status it owns, process them one by one, rest, repeat. Shutdown is checked
//! before each record and after each batch.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use super::now_unix;
use crate::error::SwapError;
use crate::shutdown::ShutdownSignal;
use crate::storage::{SwapRecord, SwapStatus, SwapStore};

const SECONDS_PER_DAY: u64 = 24 * 3600;

/// One pipeline stage, driven by a `JobLoop`.
#[async_trait]
pub trait StageHandler: Send + Sync {
    fn job_name(&self) -> &str;

    /// Status this stage moves records out of.
    fn input_status(&self) -> SwapStatus;

    /// Loop timing used when the orchestrator starts this stage.
    fn settings(&self) -> JobSettings {
        JobSettings::default()
    }

    /// Processes one record. An error never aborts the batch.
    async fn process(&self, swap: &SwapRecord) -> Result<(), SwapError>;

    /// Reports a failed record.
    fn report(&self, swap: &SwapRecord, err: &SwapError) {
        error!(
            chainid = swap.key.from_chain_id,
            txid = %swap.key.txid,
            logindex = swap.key.log_index,
            "{} failed: {}",
            self.job_name(),
            err
        );
    }
}

/// Timing of one job loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobSettings {
    /// Records created earlier than `now - max_lifetime` are ignored
    pub max_lifetime: Duration,
    /// Sleep between passes
    pub rest_interval: Duration,
}

impl Default for JobSettings {
    fn default() -> Self {
        Self {
            max_lifetime: Duration::from_secs(7 * SECONDS_PER_DAY),
            rest_interval: Duration::from_secs(3),
        }
    }
}

/// Result of one pass over a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    /// Batch finished and no shutdown was requested
    Completed { processed: usize },
    /// Shutdown observed; the loop must stop
    Cancelled { processed: usize },
}

pub struct JobLoop {
    store: Arc<dyn SwapStore>,
    handler: Arc<dyn StageHandler>,
    settings: JobSettings,
    shutdown: ShutdownSignal,
}

impl JobLoop {
    pub fn new(
        store: Arc<dyn SwapStore>,
        handler: Arc<dyn StageHandler>,
        settings: JobSettings,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            store,
            handler,
            settings,
            shutdown,
        }
    }

    pub fn name(&self) -> &str {
        self.handler.job_name()
    }

    /// Runs one pass: query, process each record, re-check shutdown.
    pub async fn run_once(&self) -> PassOutcome {
        let since = now_unix().saturating_sub(self.settings.max_lifetime.as_secs());
        let status = self.handler.input_status();

        let swaps = match self.store.find_swaps_with_status(status, since).await {
            Ok(swaps) => swaps,
            Err(e) => {
                error!("{}: failed to find swaps with status {}: {}", self.name(), status, e);
                Vec::new()
            }
        };

        if !swaps.is_empty() {
            info!("{}: found {} swaps with status {}", self.name(), swaps.len(), status);
        }

        let mut processed = 0;
        for swap in &swaps {
            if self.shutdown.is_shutting_down() {
                return PassOutcome::Cancelled { processed };
            }
            if let Err(e) = self.handler.process(swap).await {
                self.handler.report(swap, &e);
            }
            processed += 1;
        }

        if self.shutdown.is_shutting_down() {
            PassOutcome::Cancelled { processed }
        } else {
            PassOutcome::Completed { processed }
        }
    }

    /// Runs passes until shutdown.
    pub async fn run(self) {
        info!("Starting {} job", self.name());
        loop {
            match self.run_once().await {
                PassOutcome::Cancelled { .. } => break,
                PassOutcome::Completed { .. } => {
                    if self.shutdown.sleep(self.settings.rest_interval).await {
                        break;
                    }
                }
            }
        }
        info!("{} job stopped", self.name());
    }
}
