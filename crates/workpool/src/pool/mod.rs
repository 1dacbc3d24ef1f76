//! The worker pool: job source, workers, completion watcher and drain loop.
//!
//! Starting a pool spawns `parallelism + 2` tasks on the current Tokio
//! runtime:
//!
//! - the job source, which fills the job queue and then closes it;
//! - `parallelism` workers, competing for jobs on that queue and sending one
//!   outcome per job onto either the success or the failure queue;
//! - the completion watcher, which joins every worker and only then closes
//!   both outcome queues.
//!
//! The caller drains the outcome queues through [`Outcomes`], a stream that
//! merges both and ends once both are closed and empty.
//!
//! Every queue has exactly one closer. The source closes the job queue and
//! the watcher closes the outcome queues. Workers never close anything.

mod collector;
mod drain;
mod queue;
mod source;
mod worker;

#[cfg(test)]
mod tests;

pub use self::collector::PoolReport;
pub use self::drain::{DrainStats, DrainSummary, Outcomes};

use self::{
    collector::watch_completion,
    queue::JobQueue,
    source::feed_jobs,
    worker::{OutcomeSenders, worker_loop},
};
use crate::{cancel::CancelHandle, config::PoolConfig, error::Result, job::Job, task::TaskFn};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// A configured, not yet started pool.
pub struct WorkerPool<T> {
    task: Arc<T>,
    config: PoolConfig,
    token: CancellationToken,
}

impl<T> WorkerPool<T> {
    pub fn new(task: T, config: PoolConfig) -> Self {
        Self {
            task: Arc::new(task),
            config,
            token: CancellationToken::new(),
        }
    }

    /// Like [`WorkerPool::new`], with the pool's cancellation signal tied to
    /// `parent`.
    ///
    /// Cancelling `parent` cancels the pool. Cancelling the pool leaves
    /// `parent` untouched. The signal is fixed at construction, so every
    /// [`CancelHandle`] taken from the pool controls the same workers.
    pub fn with_parent(task: T, config: PoolConfig, parent: &CancellationToken) -> Self {
        Self {
            task: Arc::new(task),
            config,
            token: parent.child_token(),
        }
    }

    /// A trigger for this pool's cancellation signal, usable before the pool
    /// is started.
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle::new(self.token.clone())
    }

    pub const fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Spawns the source, the workers and the completion watcher.
    ///
    /// The job queue holds every job up front, so the source never waits on
    /// the workers. The outcome queues each hold `parallelism` outcomes.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    pub fn start<P, I>(self, jobs: I) -> PoolHandle<T::Value, T::Error>
    where
        T: TaskFn<P>,
        P: Send + 'static,
        I: IntoIterator,
        I::Item: Into<Job<P>>,
    {
        let jobs: Vec<Job<P>> = jobs.into_iter().map(Into::into).collect();
        let parallelism = self.config.parallelism();

        #[cfg(feature = "tracing")]
        tracing::info!("Starting {parallelism} workers to process {} jobs", jobs.len());

        let (job_tx, job_queue) = JobQueue::bounded(jobs.len());
        let (success_tx, success_rx) = mpsc::channel(parallelism);
        let (failure_tx, failure_rx) = mpsc::channel(parallelism);
        let senders = OutcomeSenders {
            successes: success_tx,
            failures: failure_tx,
        };

        let workers = (0..parallelism)
            .map(|worker_id| {
                tokio::spawn(worker_loop(
                    worker_id,
                    job_queue.clone(),
                    Arc::clone(&self.task),
                    senders.clone(),
                    self.token.clone(),
                ))
            })
            .collect();
        // Only the workers may hold the receive side.
        drop(job_queue);

        let source = tokio::spawn(feed_jobs(jobs, job_tx, self.token.clone()));
        let watcher = tokio::spawn(watch_completion(workers, source, senders));

        PoolHandle {
            outcomes: Outcomes::new(
                success_rx,
                failure_rx,
                watcher,
                self.token.clone().drop_guard(),
            ),
            cancel: CancelHandle::new(self.token),
        }
    }
}

/// A running pool: its outcome stream plus its cancellation trigger.
pub struct PoolHandle<V, E> {
    outcomes: Outcomes<V, E>,
    cancel: CancelHandle,
}

impl<V, E> PoolHandle<V, E> {
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Raises the pool's cancellation signal. Idempotent.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn outcomes(&mut self) -> &mut Outcomes<V, E> {
        &mut self.outcomes
    }

    pub fn into_parts(self) -> (Outcomes<V, E>, CancelHandle) {
        (self.outcomes, self.cancel)
    }

    /// Drains every outcome and waits for the pool to wind down.
    pub async fn drain(self) -> DrainSummary<V, E> {
        self.outcomes.drain().await
    }
}

/// Starts a pool of `parallelism` workers applying `task` to every job.
///
/// # Errors
///
/// Returns [`Error::InvalidParallelism`](crate::Error::InvalidParallelism) if
/// `parallelism` is zero. Nothing is spawned in that case.
///
/// # Panics
///
/// Panics if called outside of a Tokio runtime.
pub fn run_pool<P, T, I>(jobs: I, task: T, parallelism: usize) -> Result<PoolHandle<T::Value, T::Error>>
where
    T: TaskFn<P>,
    P: Send + 'static,
    I: IntoIterator,
    I::Item: Into<Job<P>>,
{
    let config = PoolConfig::new(parallelism)?;
    Ok(WorkerPool::new(task, config).start(jobs))
}
