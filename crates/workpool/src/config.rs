use crate::error::{Error, Result};
use core::num::NonZeroUsize;

/// Sizing for a [`WorkerPool`](crate::WorkerPool).
///
/// The parallelism is both the number of workers spawned and the capacity of
/// each outcome queue: a worker awaits its outcome send before dequeuing the
/// next job, so at most one outcome per worker is ever waiting to be queued.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PoolConfig {
    parallelism: NonZeroUsize,
}

impl PoolConfig {
    /// Creates a config with exactly `parallelism` workers.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParallelism`] if `parallelism` is zero.
    pub fn new(parallelism: usize) -> Result<Self> {
        NonZeroUsize::new(parallelism)
            .map(|parallelism| Self { parallelism })
            .ok_or(Error::InvalidParallelism { parallelism })
    }

    /// Number of workers the pool will spawn.
    pub const fn parallelism(&self) -> usize {
        self.parallelism.get()
    }
}

impl Default for PoolConfig {
    /// One worker per logical CPU.
    fn default() -> Self {
        Self {
            parallelism: NonZeroUsize::new(num_cpus::get()).unwrap_or(NonZeroUsize::MIN),
        }
    }
}
