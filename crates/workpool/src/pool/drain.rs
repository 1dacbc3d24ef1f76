//! The drain loop: one stream over both outcome queues.
//!
//! Each queue is a [`Lane`] that is either `Active` or `Retired`. A lane
//! retires the first time its queue reports closed-and-empty and is never
//! polled again. The stream ends once both lanes are retired. After that every
//! further poll returns `None` without touching a queue.

use super::collector::PoolReport;
use crate::{
    job::JobId,
    outcome::{Outcome, TaskError},
};
use core::{
    pin::Pin,
    task::{Context, Poll},
};
use futures::{
    Stream, StreamExt,
    stream::FusedStream,
};
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_util::sync::DropGuard;

enum Lane<T> {
    Active(mpsc::Receiver<T>),
    Retired,
}

impl<T> Lane<T> {
    fn poll_lane(&mut self, cx: &mut Context<'_>, polls: &mut u64) -> Poll<Option<T>> {
        let Self::Active(rx) = self else {
            return Poll::Ready(None);
        };
        *polls += 1;
        match rx.poll_recv(cx) {
            Poll::Ready(None) => {
                *self = Self::Retired;
                Poll::Ready(None)
            }
            polled => polled,
        }
    }

    const fn is_retired(&self) -> bool {
        matches!(self, Self::Retired)
    }
}

/// Counters kept by the drain loop.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DrainStats {
    /// Outcomes yielded so far.
    pub drained: usize,
    /// Times an outcome queue was polled. Stops growing once the stream has
    /// ended.
    pub receiver_polls: u64,
}

/// Stream of every [`Outcome`] a pool produces, in completion order.
///
/// The stream ends once all workers have terminated and both outcome queues
/// are closed and empty. Dropping it before then raises the pool's
/// cancellation signal.
pub struct Outcomes<V, E> {
    successes: Lane<(JobId, V)>,
    failures: Lane<(JobId, TaskError<E>)>,
    successes_first: bool,
    stats: DrainStats,
    watcher: Option<JoinHandle<PoolReport>>,
    cancel_on_drop: Option<DropGuard>,
}

impl<V, E> Outcomes<V, E> {
    pub(crate) fn new(
        successes: mpsc::Receiver<(JobId, V)>,
        failures: mpsc::Receiver<(JobId, TaskError<E>)>,
        watcher: JoinHandle<PoolReport>,
        cancel_on_drop: DropGuard,
    ) -> Self {
        Self {
            successes: Lane::Active(successes),
            failures: Lane::Active(failures),
            successes_first: true,
            stats: DrainStats {
                drained: 0,
                receiver_polls: 0,
            },
            watcher: Some(watcher),
            cancel_on_drop: Some(cancel_on_drop),
        }
    }

    pub const fn stats(&self) -> DrainStats {
        self.stats
    }

    /// Whether both outcome queues have been retired.
    pub const fn is_done(&self) -> bool {
        self.successes.is_retired() && self.failures.is_retired()
    }

    /// Consumes the rest of the stream and waits for the pool to wind down.
    pub async fn drain(mut self) -> DrainSummary<V, E> {
        let mut successes = Vec::new();
        let mut failures = Vec::new();

        while let Some(outcome) = self.next().await {
            match outcome {
                Outcome::Success { id, value } => successes.push((id, value)),
                Outcome::Failure { id, error } => failures.push((id, error)),
            }
        }

        let report = match self.watcher.take() {
            Some(watcher) => watcher.await.unwrap_or_else(|_e| {
                #[cfg(feature = "tracing")]
                tracing::error!("Completion watcher did not complete: {_e}");
                PoolReport::default()
            }),
            None => PoolReport::default(),
        };

        DrainSummary {
            successes,
            failures,
            stats: self.stats,
            report,
        }
    }

    fn finish(&mut self) {
        if let Some(guard) = self.cancel_on_drop.take() {
            // Exhausted normally: nothing left to cancel.
            let _ = guard.disarm();

            #[cfg(feature = "tracing")]
            tracing::debug!("Finished draining {} outcomes", self.stats.drained);
        }
    }
}

impl<V, E> Stream for Outcomes<V, E> {
    type Item = Outcome<V, E>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        // Alternate which queue goes first so a busy one cannot starve the
        // other.
        let successes_first = this.successes_first;
        this.successes_first = !successes_first;

        let mut pending = false;
        for take_success in [successes_first, !successes_first] {
            let polled = if take_success {
                this.successes
                    .poll_lane(cx, &mut this.stats.receiver_polls)
                    .map(|o| o.map(|(id, value)| Outcome::Success { id, value }))
            } else {
                this.failures
                    .poll_lane(cx, &mut this.stats.receiver_polls)
                    .map(|o| o.map(|(id, error)| Outcome::Failure { id, error }))
            };

            match polled {
                Poll::Ready(Some(outcome)) => {
                    this.stats.drained += 1;
                    return Poll::Ready(Some(outcome));
                }
                Poll::Ready(None) => {}
                Poll::Pending => pending = true,
            }
        }

        if pending {
            return Poll::Pending;
        }
        this.finish();
        Poll::Ready(None)
    }
}

impl<V, E> FusedStream for Outcomes<V, E> {
    fn is_terminated(&self) -> bool {
        self.is_done()
    }
}

/// Everything a pool produced, split by kind.
#[derive(Debug)]
pub struct DrainSummary<V, E> {
    pub successes: Vec<(JobId, V)>,
    pub failures: Vec<(JobId, TaskError<E>)>,
    pub stats: DrainStats,
    pub report: PoolReport,
}

impl<V, E> DrainSummary<V, E> {
    /// Number of outcomes of either kind.
    pub fn total(&self) -> usize {
        self.successes.len() + self.failures.len()
    }
}
