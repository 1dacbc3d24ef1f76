use super::worker::{OutcomeSenders, WorkerReport};
use futures::future::join_all;
use tokio::task::JoinHandle;

/// Final accounting of a pool run, produced by the completion watcher.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PoolReport {
    /// Workers that were joined.
    pub workers: usize,
    /// Jobs the source put on the job queue.
    pub enqueued: usize,
    /// Outcomes delivered by all workers combined.
    pub processed: usize,
}

/// Waits for every worker to terminate, then closes both outcome queues.
///
/// This runs as its own task, concurrently with whoever drains the outcome
/// stream: the queues may only close after the workers are done, and the
/// workers may only finish if the queues are being drained.
pub(crate) async fn watch_completion<V, E>(
    workers: Vec<JoinHandle<WorkerReport>>,
    source: JoinHandle<usize>,
    outcomes: OutcomeSenders<V, E>,
) -> PoolReport {
    let joined = join_all(workers).await;

    let OutcomeSenders {
        successes,
        failures,
    } = outcomes;
    drop(successes);
    drop(failures);

    #[cfg(feature = "tracing")]
    tracing::debug!("All workers have finished, outcome queues closed");

    let mut report = PoolReport {
        workers: joined.len(),
        ..PoolReport::default()
    };
    for worker in joined {
        match worker {
            Ok(worker) => report.processed += worker.processed,
            Err(_e) => {
                #[cfg(feature = "tracing")]
                tracing::error!("Worker task did not complete: {_e}");
            }
        }
    }

    report.enqueued = match source.await {
        Ok(enqueued) => enqueued,
        Err(_e) => {
            #[cfg(feature = "tracing")]
            tracing::error!("Job source did not complete: {_e}");
            0
        }
    };

    report
}
