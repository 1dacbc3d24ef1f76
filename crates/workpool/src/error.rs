//! Error types for the worker pool.
//!
//! Only misconfiguration is an [`Error`]. A task function that fails is not an
//! error of the pool: it becomes an [`Outcome::Failure`] on the outcome stream
//! and the pool keeps going.
//!
//! [`Outcome::Failure`]: crate::Outcome::Failure

pub type Result<T> = core::result::Result<T, Error>;

/// Errors reported synchronously when a pool is configured.
#[derive(Clone, thiserror::Error, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// The requested number of workers was zero.
    #[error("Invalid parallelism: {parallelism} (must be at least 1)")]
    InvalidParallelism { parallelism: usize },
}
