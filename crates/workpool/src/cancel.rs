use core::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

/// Trigger for a pool's cancellation signal.
///
/// Cancelling stops every worker from taking another job and stops the job
/// source from enqueueing more. Task invocations already running are not
/// interrupted; their outcomes are still reported.
///
/// The signal is write-once: once raised it stays raised, and raising it again
/// has no further effect. Handles are cheap to clone and can be used from any
/// task or thread.
#[derive(Clone, Debug, Default)]
pub struct CancelHandle {
    token: CancellationToken,
}

impl CancelHandle {
    pub(crate) const fn new(token: CancellationToken) -> Self {
        Self { token }
    }

    /// Raises the cancellation signal. Idempotent.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the signal has been raised.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }

    /// Raises the signal after `deadline` has elapsed.
    ///
    /// Aborting the returned handle disarms the deadline. The timer task exits
    /// early if the signal is raised by someone else first.
    pub fn cancel_after(&self, deadline: Duration) -> JoinHandle<()> {
        let token = self.token.clone();
        tokio::spawn(async move {
            tokio::select! {
                () = token.cancelled() => {}
                () = tokio::time::sleep(deadline) => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!("Deadline of {deadline:?} elapsed, cancelling pool");
                    token.cancel();
                }
            }
        })
    }
}
