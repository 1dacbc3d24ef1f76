//! Tenant batch processing on top of a [`workpool`] pool.
//!
//! ## Responsibilities
//!
//! - Build the pool from [`RunnerConfig`] and tie its cancellation to the
//!   process-wide shutdown token and the optional deadline.
//! - Log every outcome as it arrives and count successes and failures.
//! - Report which tenants were skipped because the run was cancelled.

pub mod config;
pub mod telemetry;
pub mod tenant;

use self::{
    config::RunnerConfig,
    telemetry::{
        increment_jobs_failed, increment_jobs_skipped, increment_jobs_submitted,
        increment_jobs_succeeded, record_run_duration,
    },
    tenant::TenantProcessor,
};
use futures::StreamExt;
use std::{collections::HashSet, time::Instant};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use workpool::{JobId, Outcome, PoolConfig, WorkerPool};

/// What happened to the tenants of one run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub succeeded: usize,
    pub failed: usize,
    /// Tenants that never produced an outcome, in submission order.
    pub skipped: Vec<String>,
}

/// Processes every configured tenant, or as many as possible before
/// `shutdown` is cancelled or the deadline elapses.
#[tracing::instrument(skip_all, fields(tenants = config.tenants.len(), workers = config.num_workers))]
pub async fn run(config: RunnerConfig, shutdown: CancellationToken) -> anyhow::Result<RunSummary> {
    let start = Instant::now();
    let pool = WorkerPool::with_parent(
        TenantProcessor::from(&config),
        PoolConfig::new(config.num_workers)?,
        &shutdown,
    );

    increment_jobs_submitted(config.tenants.len() as u64);
    let (mut outcomes, cancel) = pool
        .start(config.tenants.iter().map(String::as_str))
        .into_parts();
    let deadline = config.deadline.map(|deadline| cancel.cancel_after(deadline));

    let mut summary = RunSummary::default();
    let mut seen: HashSet<JobId> = HashSet::with_capacity(config.tenants.len());

    while let Some(outcome) = outcomes.next().await {
        seen.insert(outcome.id().clone());
        match outcome {
            Outcome::Success { value, .. } => {
                tracing::info!("RESULT: {value}");
                increment_jobs_succeeded();
                summary.succeeded += 1;
            }
            Outcome::Failure { error, .. } => {
                tracing::error!("ERROR: {error}");
                increment_jobs_failed();
                summary.failed += 1;
            }
        }
    }

    if let Some(deadline) = deadline {
        deadline.abort();
    }

    summary.skipped = config
        .tenants
        .iter()
        .filter(|tenant| !seen.contains(tenant.as_str()))
        .cloned()
        .collect();

    if !summary.skipped.is_empty() {
        tracing::warn!(
            "Run cancelled, {} tenants were never processed: {:?}",
            summary.skipped.len(),
            summary.skipped
        );
        increment_jobs_skipped(summary.skipped.len() as u64);
    }

    record_run_duration(start.elapsed().as_millis() as f64);
    tracing::info!(
        "Finished processing all jobs: {} succeeded, {} failed, {} skipped",
        summary.succeeded,
        summary.failed,
        summary.skipped.len()
    );

    Ok(summary)
}

/// Cancels `shutdown` on Ctrl+C or SIGTERM.
pub async fn shutdown_signal(shutdown: CancellationToken) {
    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::warn!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        () = ctrl_c => tracing::info!("Received Ctrl+C signal"),
        () = terminate => tracing::info!("Received SIGTERM signal"),
        () = shutdown.cancelled() => return,
    }

    tracing::info!("Shutdown signal received, cancelling remaining tenants...");
    shutdown.cancel();
}
