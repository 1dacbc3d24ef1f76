//! The caller-supplied computation the workers run for each job.
//!
//! Anything implementing [`TaskFn`] can drive a pool. Most callers reach for
//! one of the two adapters instead:
//!
//! - [`from_async`] wraps a closure returning a future. It runs directly on the
//!   worker task, so it must not block the thread.
//! - [`from_blocking`] wraps a synchronous closure. Each invocation is moved to
//!   Tokio's blocking thread pool so a slow or blocking computation never
//!   stalls the async workers.
//!
//! Task functions are shared by every worker and invoked concurrently with
//! different jobs.

use crate::{job::Job, outcome::TaskError};
use core::future::Future;
use std::sync::Arc;

/// A computation that turns a [`Job`] into a value or an error.
pub trait TaskFn<P>: Send + Sync + 'static {
    type Value: Send + 'static;
    type Error: Send + 'static;

    /// Processes a single job.
    ///
    /// # Errors
    ///
    /// Returns a [`TaskError`] if the job could not be processed. The error is
    /// reported as an [`Outcome::Failure`](crate::Outcome::Failure) and does
    /// not stop the worker that ran it.
    fn call(
        &self,
        job: Job<P>,
    ) -> impl Future<Output = Result<Self::Value, TaskError<Self::Error>>> + Send;
}

/// Adapter created by [`from_async`].
#[derive(Clone, Debug)]
pub struct AsyncTask<F> {
    f: F,
}

/// Wraps an async closure as a [`TaskFn`].
pub const fn from_async<F>(f: F) -> AsyncTask<F> {
    AsyncTask { f }
}

impl<P, F, Fut, V, E> TaskFn<P> for AsyncTask<F>
where
    F: Fn(Job<P>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<V, E>> + Send,
    V: Send + 'static,
    E: Send + 'static,
{
    type Value = V;
    type Error = E;

    fn call(&self, job: Job<P>) -> impl Future<Output = Result<V, TaskError<E>>> + Send {
        let fut = (self.f)(job);
        async move { fut.await.map_err(TaskError::Failed) }
    }
}

/// Adapter created by [`from_blocking`].
#[derive(Debug)]
pub struct BlockingTask<F> {
    f: Arc<F>,
}

impl<F> Clone for BlockingTask<F> {
    fn clone(&self) -> Self {
        Self {
            f: Arc::clone(&self.f),
        }
    }
}

/// Wraps a synchronous, possibly blocking closure as a [`TaskFn`].
///
/// Each call runs on [`tokio::task::spawn_blocking`]. A panic inside the
/// closure is reported as [`TaskError::Panicked`].
pub fn from_blocking<F>(f: F) -> BlockingTask<F> {
    BlockingTask { f: Arc::new(f) }
}

impl<P, F, V, E> TaskFn<P> for BlockingTask<F>
where
    F: Fn(Job<P>) -> Result<V, E> + Send + Sync + 'static,
    P: Send + 'static,
    V: Send + 'static,
    E: Send + 'static,
{
    type Value = V;
    type Error = E;

    fn call(&self, job: Job<P>) -> impl Future<Output = Result<V, TaskError<E>>> + Send {
        let f = Arc::clone(&self.f);
        async move {
            match tokio::task::spawn_blocking(move || f(job)).await {
                Ok(result) => result.map_err(TaskError::Failed),
                Err(err) => match err.try_into_panic() {
                    Ok(payload) => Err(TaskError::from_panic(&*payload)),
                    Err(_) => Err(TaskError::Aborted),
                },
            }
        }
    }
}
