use super::config::RunnerConfig;
use core::{future::Future, time::Duration};
use std::{collections::HashSet, sync::Arc};
use workpool::{Job, JobId, TaskError, TaskFn};

#[derive(Clone, thiserror::Error, Debug, PartialEq, Eq)]
pub enum TenantError {
    #[error("failed to process tenant: {tenant}")]
    Failed { tenant: JobId },
}

/// Simulated per-tenant work.
///
/// Processing takes longer for longer tenant ids, and the configured tenants
/// always fail.
#[derive(Clone, Debug)]
pub struct TenantProcessor {
    failing: Arc<HashSet<String>>,
    base_delay: Duration,
    per_char_delay: Duration,
}

impl TenantProcessor {
    pub fn new(
        failing: impl IntoIterator<Item = String>,
        base_delay: Duration,
        per_char_delay: Duration,
    ) -> Self {
        Self {
            failing: Arc::new(failing.into_iter().collect()),
            base_delay,
            per_char_delay,
        }
    }

    fn delay_for(&self, tenant: &JobId) -> Duration {
        let chars = u32::try_from(tenant.as_str().len()).unwrap_or(u32::MAX);
        self.base_delay
            .saturating_add(self.per_char_delay.saturating_mul(chars))
    }
}

impl From<&RunnerConfig> for TenantProcessor {
    fn from(config: &RunnerConfig) -> Self {
        Self::new(
            config.fail_tenants.iter().cloned(),
            config.base_delay,
            config.per_char_delay,
        )
    }
}

impl TaskFn<()> for TenantProcessor {
    type Value = String;
    type Error = TenantError;

    fn call(
        &self,
        job: Job,
    ) -> impl Future<Output = Result<String, TaskError<TenantError>>> + Send {
        let delay = self.delay_for(job.id());
        let fails = self.failing.contains(job.id().as_str());
        let (tenant, ()) = job.into_parts();

        async move {
            tracing::info!("Processing tenant with ID: {:?}", tenant.as_str());
            tokio::time::sleep(delay).await;

            if fails {
                return Err(TaskError::Failed(TenantError::Failed { tenant }));
            }
            Ok(format!("Successfully processed tenant {tenant}"))
        }
    }
}
