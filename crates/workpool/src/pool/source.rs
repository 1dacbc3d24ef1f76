use crate::job::Job;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Feeds `jobs` into the job queue in order, then closes it.
///
/// Stops early if the pool is cancelled. The queue is closed on every path by
/// dropping the only sender, so workers never wait for jobs that will not
/// arrive. Returns the number of jobs enqueued.
pub(crate) async fn feed_jobs<P>(
    jobs: Vec<Job<P>>,
    tx: mpsc::Sender<Job<P>>,
    cancel: CancellationToken,
) -> usize {
    let total = jobs.len();
    let mut enqueued = 0;

    for job in jobs {
        let sent = tokio::select! {
            biased;
            () = cancel.cancelled() => false,
            res = tx.send(job) => res.is_ok(),
        };
        if !sent {
            break;
        }
        enqueued += 1;
    }
    drop(tx);

    if enqueued == total {
        #[cfg(feature = "tracing")]
        tracing::debug!("All {total} jobs have been sent to the job queue");
    } else {
        #[cfg(feature = "tracing")]
        tracing::debug!("Job source stopped early after {enqueued} of {total} jobs");
    }

    enqueued
}
