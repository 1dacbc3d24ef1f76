use crate::job::JobId;
use core::any::Any;

/// The single report produced for every job a worker dequeued.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome<V, E> {
    /// The task function returned a value.
    Success { id: JobId, value: V },
    /// The task function failed; the pool and its workers carry on.
    Failure { id: JobId, error: TaskError<E> },
}

impl<V, E> Outcome<V, E> {
    /// Identifier of the job this outcome reports on.
    pub const fn id(&self) -> &JobId {
        match self {
            Self::Success { id, .. } | Self::Failure { id, .. } => id,
        }
    }

    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Failure { .. })
    }

    /// Splits the outcome into a standard [`Result`], keeping the job id on
    /// both sides.
    pub fn into_result(self) -> Result<(JobId, V), (JobId, TaskError<E>)> {
        match self {
            Self::Success { id, value } => Ok((id, value)),
            Self::Failure { id, error } => Err((id, error)),
        }
    }
}

/// Why a task invocation produced no value.
#[derive(Clone, thiserror::Error, Debug, PartialEq, Eq)]
pub enum TaskError<E> {
    /// The task function returned an error.
    #[error("{0}")]
    Failed(E),

    /// The task function panicked. The panic is contained by the worker.
    #[error("Task panicked: {message}")]
    Panicked { message: String },

    /// A blocking invocation was torn down before it ran to completion,
    /// which only happens while the runtime is shutting down.
    #[error("Task aborted by runtime shutdown")]
    Aborted,
}

impl<E> TaskError<E> {
    pub(crate) fn from_panic(payload: &(dyn Any + Send)) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self::Panicked { message }
    }
}
