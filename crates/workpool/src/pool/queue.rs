use crate::job::Job;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};

/// Receive side of the job queue, shared by every worker.
///
/// Jobs are handed off competitively: whichever worker holds the lock when a
/// job arrives takes it, and no other worker ever sees it. The queue reports
/// closed-and-drained (`None`) once the job source has dropped its sender and
/// every buffered job has been taken.
pub(crate) struct JobQueue<P> {
    rx: Arc<Mutex<mpsc::Receiver<Job<P>>>>,
}

impl<P> Clone for JobQueue<P> {
    fn clone(&self) -> Self {
        Self {
            rx: Arc::clone(&self.rx),
        }
    }
}

impl<P> JobQueue<P> {
    /// Creates a queue able to hold `capacity` jobs without blocking the
    /// source. A capacity of zero is rounded up to one.
    pub(crate) fn bounded(capacity: usize) -> (mpsc::Sender<Job<P>>, Self) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            tx,
            Self {
                rx: Arc::new(Mutex::new(rx)),
            },
        )
    }

    /// Waits for the next job.
    ///
    /// Cancel safe: if the future is dropped before it resolves, no job is
    /// lost and the lock is released.
    pub(crate) async fn next(&self) -> Option<Job<P>> {
        self.rx.lock().await.recv().await
    }
}
