use crate::domain::value_objects::ids::QueueJobId;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    /// The queue no longer knows the job: the reservation expired or was
    /// handed to another worker.
    #[error("job not found")]
    NotFound,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("protocol error: {0}")]
    Protocol(String),
}

impl From<std::io::Error> for QueueError {
    fn from(e: std::io::Error) -> Self {
        QueueError::Connection(e.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservedJob {
    pub id: QueueJobId,
    pub body: String,
}

/// At-least-once work queue with time-limited reservations.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Add a tube to the set reservations are taken from.
    async fn watch(&self, tube: &str) -> Result<(), QueueError>;
    /// Select the tube that `put` writes to by default.
    async fn use_tube(&self, tube: &str) -> Result<(), QueueError>;
    /// Reserve the next job, or `None` when the timeout elapses first.
    async fn reserve(&self, timeout: Duration) -> Result<Option<ReservedJob>, QueueError>;
    /// Extend a reservation's visibility timeout.
    async fn touch(&self, id: QueueJobId) -> Result<(), QueueError>;
    /// Remove a reserved job for good.
    async fn delete(&self, id: QueueJobId) -> Result<(), QueueError>;
    /// Enqueue `body` on `tube`.
    async fn put(&self, tube: &str, body: &str) -> Result<QueueJobId, QueueError>;
}
