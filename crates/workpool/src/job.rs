use core::{borrow::Borrow, fmt};
use std::sync::Arc;

/// Opaque identifier of a [`Job`].
///
/// Cloning is cheap: the key is reference counted so every outcome can carry
/// the id of the job it belongs to without copying the string.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JobId(Arc<str>);

impl JobId {
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl Borrow<str> for JobId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for JobId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for JobId {
    fn from(id: String) -> Self {
        Self::new(id)
    }
}

/// A unit of work: an identifier plus whatever payload the task function
/// needs.
///
/// A job is immutable once submitted. Ownership moves from the job source to
/// exactly one worker through the job queue, and from there into the task
/// function.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Job<P = ()> {
    id: JobId,
    payload: P,
}

impl<P> Job<P> {
    pub fn new(id: impl Into<JobId>, payload: P) -> Self {
        Self {
            id: id.into(),
            payload,
        }
    }

    pub const fn id(&self) -> &JobId {
        &self.id
    }

    pub const fn payload(&self) -> &P {
        &self.payload
    }

    pub fn into_parts(self) -> (JobId, P) {
        (self.id, self.payload)
    }
}

impl From<JobId> for Job {
    fn from(id: JobId) -> Self {
        Self::new(id, ())
    }
}

impl From<&str> for Job {
    fn from(id: &str) -> Self {
        Self::new(id, ())
    }
}

impl From<String> for Job {
    fn from(id: String) -> Self {
        Self::new(id, ())
    }
}
