//! Bulk processor: batches write requests per worker and commits them as
//! `_bulk` calls on size, count, or time thresholds.
//!
//! Every commit is bracketed by [`BulkHooks::before`] and
//! [`BulkHooks::after`]. A commit that fails as a whole with a retryable
//! error keeps its batch so the next commit (threshold, flush tick, explicit
//! flush, or close) sends it again. A permanent error drops the batch and
//! counts its requests as failed. A retained batch that grows to twice the
//! thresholds stops its worker with [`BulkError::Stalled`].

pub mod backoff;
pub mod processor;
pub mod request;
pub mod stats;
mod worker;

pub use backoff::Backoff;
pub use processor::{BulkProcessor, BulkProcessorBuilder};
pub use request::{BulkableRequest, build_body};
pub use stats::{BulkProcessorStats, WorkerStats};

use crate::elastic::{BulkResponse, ElasticError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BulkError {
    #[error("invalid bulk processor configuration: {0}")]
    Config(String),
    #[error("bulk processor must be started inside a tokio runtime")]
    NoRuntime,
    #[error("bulk processor is closed")]
    Closed,
    #[error("bulk commit {execution_id} failed: {source}")]
    Commit {
        execution_id: u64,
        source: ElasticError,
    },
    /// A worker kept failing while its retained batch reached twice the
    /// commit thresholds; the batch was dropped and the worker stopped.
    #[error("bulk commit {execution_id} failed with {pending} requests pending, giving up: {source}")]
    Stalled {
        execution_id: u64,
        pending: usize,
        source: ElasticError,
    },
    #[error("bulk worker panicked: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Callbacks around each commit.
pub trait BulkHooks: Send + Sync {
    fn before(&self, _execution_id: u64, _requests: &[BulkableRequest]) {}

    fn after(
        &self,
        _execution_id: u64,
        _requests: &[BulkableRequest],
        _result: Result<&BulkResponse, &ElasticError>,
    ) {
    }
}

pub struct NoopHooks;

impl BulkHooks for NoopHooks {}
