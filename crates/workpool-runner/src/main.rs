#![doc = include_str!("../README.md")]

mod runner;

use clap::Parser;
use runner::config::{CliArgs, RunnerConfig};
use runner::telemetry::init_telemetry;
use tokio_util::sync::CancellationToken;

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = RunnerConfig::try_from(args)?;

    let providers = init_telemetry()?;
    log_startup_info(&config);

    let shutdown = CancellationToken::new();
    let signals = tokio::spawn(runner::shutdown_signal(shutdown.clone()));

    let result = runner::run(config, shutdown).await;
    signals.abort();

    if let Ok(summary) = &result {
        tracing::debug!(?summary, "Run complete");
    }

    providers.shutdown();
    result.map(|_| ())
}

fn log_startup_info(config: &RunnerConfig) {
    if cfg!(debug_assertions) {
        tracing::info!("Starting tenant run with full config: {:#?}", config);
    } else {
        tracing::info!(
            "Starting tenant run: {} tenants on {} workers",
            config.tenants.len(),
            config.num_workers
        );
    }
}
