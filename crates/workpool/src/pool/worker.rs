use super::queue::JobQueue;
use crate::{job::JobId, outcome::TaskError, task::TaskFn};
use futures::FutureExt;
use std::{panic::AssertUnwindSafe, sync::Arc};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Send side of the two outcome queues.
///
/// Every worker owns a clone; the completion watcher owns the original. A
/// queue closes once the last sender is gone, and since the watcher only drops
/// its senders after joining every worker, it is always the one that closes
/// them.
pub(crate) struct OutcomeSenders<V, E> {
    pub(crate) successes: mpsc::Sender<(JobId, V)>,
    pub(crate) failures: mpsc::Sender<(JobId, TaskError<E>)>,
}

impl<V, E> Clone for OutcomeSenders<V, E> {
    fn clone(&self) -> Self {
        Self {
            successes: self.successes.clone(),
            failures: self.failures.clone(),
        }
    }
}

/// Why a worker left its loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum WorkerExit {
    /// The job queue was closed and fully drained.
    QueueClosed,
    /// The pool's cancellation signal was raised.
    Cancelled,
    /// Nobody is listening for outcomes anymore.
    OutcomesDropped,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct WorkerReport {
    pub(crate) worker_id: usize,
    /// Outcomes delivered to the outcome queues.
    pub(crate) processed: usize,
    pub(crate) exit: WorkerExit,
}

/// Worker task: takes jobs off the shared queue until it is closed or the pool
/// is cancelled, reporting exactly one outcome per job taken.
///
/// Cancellation is checked before every dequeue and wins over a job that is
/// ready at the same time. A running task invocation is never interrupted.
///
/// A task function that fails or panics yields an [`Outcome::Failure`] and the
/// worker moves on to the next job.
///
/// The outcome send is awaited before the next dequeue, so a worker never has
/// more than one undelivered outcome.
///
/// [`Outcome::Failure`]: crate::Outcome::Failure
pub(crate) async fn worker_loop<P, T>(
    worker_id: usize,
    jobs: JobQueue<P>,
    task: Arc<T>,
    outcomes: OutcomeSenders<T::Value, T::Error>,
    cancel: CancellationToken,
) -> WorkerReport
where
    T: TaskFn<P>,
    P: Send + 'static,
{
    #[cfg(feature = "tracing")]
    tracing::trace!("Worker {worker_id} started");

    let mut processed = 0;

    let exit = loop {
        let job = tokio::select! {
            biased;
            () = cancel.cancelled() => break WorkerExit::Cancelled,
            job = jobs.next() => match job {
                Some(job) => job,
                None => break WorkerExit::QueueClosed,
            },
        };

        let id = job.id().clone();
        // `call` itself may panic before handing back its future.
        let result = AssertUnwindSafe(async { task.call(job).await })
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| Err(TaskError::from_panic(&*payload)));

        let delivered = match result {
            Ok(value) => outcomes.successes.send((id, value)).await.is_ok(),
            Err(error) => outcomes.failures.send((id, error)).await.is_ok(),
        };
        if !delivered {
            break WorkerExit::OutcomesDropped;
        }
        processed += 1;
    };

    match exit {
        WorkerExit::QueueClosed => {
            #[cfg(feature = "tracing")]
            tracing::trace!("Worker {worker_id} shutting down: job queue closed");
        }
        WorkerExit::Cancelled => {
            #[cfg(feature = "tracing")]
            tracing::debug!("Worker {worker_id} shutting down: pool cancelled");
        }
        WorkerExit::OutcomesDropped => {
            #[cfg(feature = "tracing")]
            tracing::warn!("Worker {worker_id} shutting down: outcome stream dropped");
        }
    }

    WorkerReport {
        worker_id,
        processed,
        exit,
    }
}
