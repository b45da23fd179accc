//! Router Swap Workers
//!
//! Orchestration of the pipeline jobs. Each job runs as its own tokio task and
//! talks to its siblings only through the swap store.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::bridge::gateway::start_adjust_gateway_order_job;
use crate::bridge::{init_http_client, init_router_bridges, RouterBridges};
use crate::config::{Config, JobsConfig};
use crate::policy::PolicyEngine;
use crate::shutdown::ShutdownSignal;
use crate::storage::SwapStore;

pub mod job;
pub mod passbigvalue;
pub mod register;
pub mod verify;

pub use job::{JobLoop, JobSettings, PassOutcome, StageHandler};
pub use passbigvalue::PassBigValueHandler;
pub use register::{register_swap, Registration};
pub use verify::VerifyHandler;

pub const GATEWAY_JOB_NAME: &str = "gateway";

/// Current unix time in seconds.
pub fn now_unix() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}

/// Shared collaborators of every job.
#[derive(Clone)]
pub struct WorkerContext {
    pub config: Arc<Config>,
    pub store: Arc<dyn SwapStore>,
    pub policy: Arc<dyn PolicyEngine>,
    pub bridges: Arc<RouterBridges>,
    pub shutdown: ShutdownSignal,
}

/// Stage handlers supplied by the hosting process.
///
/// Stages left as `None` are not started.
#[derive(Clone, Default)]
pub struct JobSet {
    pub swap: Option<Arc<dyn StageHandler>>,
    pub stable: Option<Arc<dyn StageHandler>>,
    pub replace: Option<Arc<dyn StageHandler>>,
    pub accept_sign: Option<Arc<dyn StageHandler>>,
}

/// Handles of the started jobs, in start order.
#[derive(Default)]
pub struct JobHandles {
    jobs: Vec<(String, JoinHandle<()>)>,
}

impl JobHandles {
    fn push(&mut self, name: &str, handle: JoinHandle<()>) {
        self.jobs.push((name.to_string(), handle));
    }

    pub fn names(&self) -> Vec<String> {
        self.jobs.iter().map(|(name, _)| name.clone()).collect()
    }

    /// Waits for every job to finish. Jobs only finish after shutdown.
    pub async fn wait(self) {
        let (names, handles): (Vec<String>, Vec<JoinHandle<()>>) = self.jobs.into_iter().unzip();
        let results = futures::future::join_all(handles).await;
        for (name, result) in names.iter().zip(results) {
            if let Err(e) = result {
                error!("Job {} panicked: {}", name, e);
            }
        }
    }
}

fn verify_settings(jobs: &JobsConfig) -> JobSettings {
    JobSettings {
        max_lifetime: Duration::from_secs(jobs.max_verify_lifetime_secs),
        rest_interval: Duration::from_millis(jobs.verify_interval_ms),
    }
}

fn pass_big_value_settings(jobs: &JobsConfig) -> JobSettings {
    JobSettings {
        max_lifetime: Duration::from_secs(jobs.max_pass_big_value_lifetime_secs),
        rest_interval: Duration::from_millis(jobs.pass_big_value_interval_ms),
    }
}

fn spawn_stage(ctx: &WorkerContext, handles: &mut JobHandles, handler: Arc<dyn StageHandler>) {
    let name = handler.job_name().to_string();
    let settings = handler.settings();
    let job = JobLoop::new(ctx.store.clone(), handler, settings, ctx.shutdown.clone());
    handles.push(&name, tokio::spawn(job.run()));
}

fn spawn_external(ctx: &WorkerContext, handles: &mut JobHandles, name: &str, handler: &Option<Arc<dyn StageHandler>>) {
    match handler {
        Some(handler) => spawn_stage(ctx, handles, handler.clone()),
        None => info!("No {} job supplied, skipping", name),
    }
}

/// Starts the router swap jobs for the given role.
///
/// Connectors are initialised first (fatal for a server, best effort for a
/// client) and installed in `ctx.bridges`. A client only runs the gateway
/// and signature-acceptance jobs; a server runs the full pipeline.
pub async fn start_router_swap_work(
    ctx: &WorkerContext,
    is_server: bool,
    jobs: JobSet,
) -> anyhow::Result<JobHandles> {
    let config = &ctx.config;
    let pause = Duration::from_millis(config.jobs.start_interval_ms);

    let client = init_http_client(&config.http)?;
    let registry = init_router_bridges(config, &client, is_server)?;
    ctx.bridges.replace(registry).await;

    let mut handles = JobHandles::default();

    info!("Starting gateway ordering job");
    handles.push(
        GATEWAY_JOB_NAME,
        tokio::spawn(start_adjust_gateway_order_job(
            ctx.bridges.clone(),
            Duration::from_millis(config.jobs.gateway_adjust_interval_ms),
            ctx.shutdown.clone(),
        )),
    );
    tokio::time::sleep(pause).await;

    if !is_server {
        spawn_external(ctx, &mut handles, "accept sign", &jobs.accept_sign);
        return Ok(handles);
    }

    spawn_external(ctx, &mut handles, "swap", &jobs.swap);
    tokio::time::sleep(pause).await;

    let verify = VerifyHandler::new(
        ctx.store.clone(),
        ctx.policy.clone(),
        ctx.bridges.clone(),
        verify_settings(&config.jobs),
    );
    spawn_stage(ctx, &mut handles, Arc::new(verify));
    tokio::time::sleep(pause).await;

    spawn_external(ctx, &mut handles, "stable", &jobs.stable);
    tokio::time::sleep(pause).await;

    spawn_external(ctx, &mut handles, "replace", &jobs.replace);
    tokio::time::sleep(pause).await;

    let pass_big_value = PassBigValueHandler::new(
        ctx.store.clone(),
        ctx.bridges.clone(),
        pass_big_value_settings(&config.jobs),
        config.jobs.pass_big_value_time_required_secs,
    );
    if !pass_big_value.is_enabled() {
        info!("Big value pass-through is disabled");
    }
    spawn_stage(ctx, &mut handles, Arc::new(pass_big_value));

    info!("Started {} router swap jobs", handles.jobs.len());
    Ok(handles)
}
