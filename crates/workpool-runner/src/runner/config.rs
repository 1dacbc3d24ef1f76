use anyhow::bail;
use clap::Parser;
use core::time::Duration;
use std::collections::HashSet;

/// Runtime configuration for the `workpool-runner` binary.
///
/// All values are parsed from CLI arguments or environment variables (a
/// `.env` file is loaded first), with defaults that reproduce the classic
/// six-tenant demo run.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "workpool-runner",
    version,
    about = "Processes a batch of tenants through a bounded worker pool"
)]
pub struct CliArgs {
    /// Tenants to process, in submission order.
    ///
    /// Environment variable: `TENANTS`
    #[arg(
        long,
        env = "TENANTS",
        value_delimiter = ',',
        default_values_t = (1..=6).map(|i| format!("tenant-{i}")).collect::<Vec<_>>()
    )]
    pub tenants: Vec<String>,

    /// Number of workers processing tenants concurrently.
    ///
    /// Defaults to the number of logical CPUs.
    ///
    /// Environment variable: `NUM_WORKERS`
    #[arg(long, env = "NUM_WORKERS")]
    pub num_workers: Option<usize>,

    /// Tenants whose processing fails.
    ///
    /// Environment variable: `FAIL_TENANTS`
    #[arg(
        long,
        env = "FAIL_TENANTS",
        value_delimiter = ',',
        default_values_t = vec![String::from("tenant-2")]
    )]
    pub fail_tenants: Vec<String>,

    /// Fixed part of the simulated processing time, in milliseconds.
    ///
    /// Environment variable: `BASE_DELAY_MS`
    #[arg(long, env = "BASE_DELAY_MS", default_value_t = 100)]
    pub base_delay_ms: u64,

    /// Simulated processing time added per character of the tenant id, in
    /// milliseconds.
    ///
    /// Environment variable: `PER_CHAR_DELAY_MS`
    #[arg(long, env = "PER_CHAR_DELAY_MS", default_value_t = 10)]
    pub per_char_delay_ms: u64,

    /// Cancel the run once this many milliseconds have elapsed.
    ///
    /// Tenants already being processed still finish; the rest are skipped.
    ///
    /// Environment variable: `DEADLINE_MS`
    #[arg(long, env = "DEADLINE_MS")]
    pub deadline_ms: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub tenants: Vec<String>,
    pub num_workers: usize,
    pub fail_tenants: HashSet<String>,
    pub base_delay: Duration,
    pub per_char_delay: Duration,
    pub deadline: Option<Duration>,
}

impl TryFrom<CliArgs> for RunnerConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        let num_workers = args.num_workers.unwrap_or_else(num_cpus::get);
        if num_workers == 0 {
            bail!("NUM_WORKERS must be greater than 0");
        }

        let mut seen = HashSet::with_capacity(args.tenants.len());
        for tenant in &args.tenants {
            if tenant.is_empty() {
                bail!("TENANTS must not contain empty tenant ids");
            }
            if !seen.insert(tenant.as_str()) {
                bail!("TENANTS contains duplicate tenant id {tenant:?}");
            }
        }

        if args.deadline_ms == Some(0) {
            bail!("DEADLINE_MS must be greater than 0");
        }

        Ok(Self {
            num_workers,
            fail_tenants: args.fail_tenants.into_iter().collect(),
            base_delay: Duration::from_millis(args.base_delay_ms),
            per_char_delay: Duration::from_millis(args.per_char_delay_ms),
            deadline: args.deadline_ms.map(Duration::from_millis),
            tenants: args.tenants,
        })
    }
}
