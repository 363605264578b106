//! Bulk supervisor: prepares the target index, drains decoded records into
//! the bulk processor, and throttles itself while commits fail.

pub mod counters;
pub mod throttle;

pub use counters::{CallCounters, CallCountersSnapshot};
pub use throttle::Throttle;

use crate::bulk::{BulkError, BulkHooks, BulkProcessor, BulkableRequest};
use crate::elastic::{BulkResponse, ElasticError, IndexAdmin};
use crate::record::{Record, WriteOp};
use log::{info, warn};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum BulkerError {
    #[error("failed to prepare index '{index}': {source}")]
    IndexSetup { index: String, source: ElasticError },
    #[error(transparent)]
    Bulk(#[from] BulkError),
}

/// Outcome of [`setup_index`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexSetup {
    /// The index existed and was dropped before being created again.
    Recreated,
    Created,
}

/// Drop `index` if present, then create it with the optional `body`
/// (settings and mappings).
pub async fn setup_index<A: IndexAdmin>(
    admin: &A,
    index: &str,
    body: Option<&Value>,
) -> Result<IndexSetup, BulkerError> {
    let wrap = |source| BulkerError::IndexSetup {
        index: index.to_string(),
        source,
    };

    let existed = admin.index_exists(index).await.map_err(wrap)?;
    if existed {
        warn!("bulker: index '{}' exists, dropping it", index);
        admin.delete_index(index).await.map_err(wrap)?;
    }
    admin.create_index(index, body).await.map_err(wrap)?;
    info!("bulker: created index '{}'", index);

    Ok(if existed {
        IndexSetup::Recreated
    } else {
        IndexSetup::Created
    })
}

/// Commit hooks that drive the throttle and the call counters.
///
/// Only retryable failures raise the throttle; those are the ones whose
/// batch the processor keeps and resends.
#[derive(Default)]
pub struct BulkerHooks {
    throttle: Arc<Throttle>,
    counters: Arc<CallCounters>,
}

impl BulkerHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn throttle(&self) -> &Arc<Throttle> {
        &self.throttle
    }

    pub fn counters(&self) -> &Arc<CallCounters> {
        &self.counters
    }
}

impl BulkHooks for BulkerHooks {
    fn before(&self, _execution_id: u64, _requests: &[BulkableRequest]) {
        self.counters.record_before();
    }

    fn after(
        &self,
        execution_id: u64,
        requests: &[BulkableRequest],
        result: Result<&BulkResponse, &ElasticError>,
    ) {
        match result {
            Ok(_) => {
                self.counters.record_after(true);
                if self.throttle.set(false) {
                    info!("bulker: commit {} succeeded, resuming writes", execution_id);
                }
            }
            // a rejected batch is dropped by the processor, so there is
            // nothing to wait for
            Err(err) if !err.is_retryable() => {
                self.counters.record_after(false);
                warn!(
                    "bulker: commit {} of {} requests rejected: {}",
                    execution_id,
                    requests.len(),
                    err
                );
            }
            Err(err) => {
                self.counters.record_after(false);
                if !self.throttle.set(true) {
                    warn!(
                        "bulker: commit {} of {} requests failed, throttling: {}",
                        execution_id,
                        requests.len(),
                        err
                    );
                }
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct BulkerSettings {
    pub index: String,
    pub op: WriteOp,
    /// Drop records whose `decide_date` is empty.
    pub require_decide_date: bool,
    pub throttle_poll: Duration,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub forwarded: u64,
    pub filtered: u64,
    /// Set when the loop stopped on cancellation rather than a closed channel.
    pub cancelled: bool,
}

pub struct Bulker {
    processor: Arc<BulkProcessor>,
    hooks: Arc<BulkerHooks>,
    settings: BulkerSettings,
}

impl Bulker {
    /// `hooks` must be the instance the processor was built with.
    pub fn new(
        processor: Arc<BulkProcessor>,
        hooks: Arc<BulkerHooks>,
        settings: BulkerSettings,
    ) -> Self {
        Self {
            processor,
            hooks,
            settings,
        }
    }

    pub fn processor(&self) -> &Arc<BulkProcessor> {
        &self.processor
    }

    pub fn counters(&self) -> CallCountersSnapshot {
        self.hooks.counters().snapshot()
    }

    pub fn is_throttled(&self) -> bool {
        self.hooks.throttle().is_throttled()
    }

    pub fn index(&self) -> &str {
        &self.settings.index
    }

    /// Forward records until the channel closes or `cancel` fires.
    ///
    /// While throttled the channel is left alone, so a producer fills it
    /// and blocks instead of losing records.
    pub async fn run(
        &self,
        mut rx: mpsc::Receiver<Record>,
        cancel: &CancellationToken,
    ) -> Result<IngestSummary, BulkerError> {
        let mut summary = IngestSummary::default();
        let throttle = self.hooks.throttle();

        loop {
            if !throttle.wait_clear(self.settings.throttle_poll, cancel).await {
                summary.cancelled = true;
                break;
            }

            let record = tokio::select! {
                _ = cancel.cancelled() => {
                    summary.cancelled = true;
                    break;
                }
                record = rx.recv() => match record {
                    Some(record) => record,
                    None => break,
                },
            };

            if self.settings.require_decide_date && !record.has_decide_date() {
                summary.filtered += 1;
                continue;
            }

            let request = record.into_request(&self.settings.index, self.settings.op);
            self.processor.add(request).await?;
            summary.forwarded += 1;
        }

        info!(
            "bulker: ingestion loop stopped ({} forwarded, {} filtered{})",
            summary.forwarded,
            summary.filtered,
            if summary.cancelled { ", cancelled" } else { "" }
        );
        Ok(summary)
    }
}
