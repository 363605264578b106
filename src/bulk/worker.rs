use super::backoff::Backoff;
use super::request::{BulkableRequest, build_body};
use super::stats::BulkProcessorStats;
use super::{BulkError, BulkHooks};
use crate::elastic::{BulkResponse, BulkService, ElasticError};
use log::{debug, warn};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tokio::sync::{mpsc, oneshot};

pub(crate) enum WorkerCommand {
    Add(BulkableRequest),
    /// Commit whatever is buffered; the ack, when present, receives the outcome.
    Flush(Option<oneshot::Sender<Result<(), BulkError>>>),
    Close,
}

/// State shared by all workers of one processor.
pub(crate) struct Shared {
    pub(crate) stats: Mutex<BulkProcessorStats>,
    pub(crate) execution_id: AtomicU64,
}

pub(crate) struct WorkerSettings {
    pub(crate) bulk_actions: usize,
    pub(crate) bulk_size: usize,
    pub(crate) backoff: Backoff,
}

pub(crate) struct Worker<S: BulkService> {
    id: usize,
    name: String,
    service: Arc<S>,
    hooks: Arc<dyn BulkHooks>,
    shared: Arc<Shared>,
    settings: WorkerSettings,
    batch: Vec<BulkableRequest>,
    batch_bytes: usize,
}

impl<S: BulkService> Worker<S> {
    pub(crate) fn new(
        id: usize,
        name: String,
        service: Arc<S>,
        hooks: Arc<dyn BulkHooks>,
        shared: Arc<Shared>,
        settings: WorkerSettings,
    ) -> Self {
        Self {
            id,
            name,
            service,
            hooks,
            shared,
            settings,
            batch: Vec::new(),
            batch_bytes: 0,
        }
    }

    /// Process commands until closed, then commit what remains.
    pub(crate) async fn run(
        mut self,
        mut rx: mpsc::Receiver<WorkerCommand>,
    ) -> Result<(), BulkError> {
        debug!("{}: worker {} started", self.name, self.id);

        while let Some(command) = rx.recv().await {
            match command {
                WorkerCommand::Add(request) => {
                    self.batch_bytes += request.size_in_bytes();
                    self.batch.push(request);
                    self.publish_queued();

                    if self.should_commit() {
                        match self.commit().await {
                            Err(err @ BulkError::Stalled { .. }) => return Err(err),
                            Err(err) => {
                                warn!("{}: worker {} commit failed: {}", self.name, self.id, err);
                            }
                            Ok(()) => {}
                        }
                    }
                }
                WorkerCommand::Flush(ack) => {
                    self.shared.stats.lock().flushed += 1;
                    let result = self.commit().await;
                    if let Err(err @ BulkError::Stalled { .. }) = result {
                        // the worker is gone; close() reports the cause
                        if let Some(ack) = ack {
                            let _ = ack.send(Err(BulkError::Closed));
                        }
                        return Err(err);
                    }
                    match ack {
                        Some(ack) => {
                            let _ = ack.send(result);
                        }
                        None => {
                            if let Err(err) = result {
                                warn!("{}: worker {} flush failed: {}", self.name, self.id, err);
                            }
                        }
                    }
                }
                WorkerCommand::Close => break,
            }
        }

        let result = self.commit().await;
        debug!("{}: worker {} stopped", self.name, self.id);
        result
    }

    fn should_commit(&self) -> bool {
        self.batch.len() >= self.settings.bulk_actions || self.batch_bytes >= self.settings.bulk_size
    }

    fn overflowed(&self) -> bool {
        self.batch.len() >= self.settings.bulk_actions.saturating_mul(2)
            || self.batch_bytes >= self.settings.bulk_size.saturating_mul(2)
    }

    /// Forget the batch, counting every request in it as failed.
    fn drop_batch(&mut self) -> usize {
        let dropped = self.batch.len();
        {
            let mut stats = self.shared.stats.lock();
            stats.failed += dropped as u64;
            if let Some(worker) = stats.workers.get_mut(self.id) {
                worker.queued = 0;
            }
        }
        self.batch.clear();
        self.batch_bytes = 0;
        dropped
    }

    fn publish_queued(&self) {
        let mut stats = self.shared.stats.lock();
        if let Some(worker) = stats.workers.get_mut(self.id) {
            worker.queued = self.batch.len() as u64;
        }
    }

    async fn commit(&mut self) -> Result<(), BulkError> {
        if self.batch.is_empty() {
            return Ok(());
        }

        let execution_id = self.shared.execution_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.hooks.before(execution_id, &self.batch);

        let started = Instant::now();
        let body = build_body(&self.batch);
        let result = self.send_with_backoff(execution_id, body).await;
        let elapsed = started.elapsed();

        match result {
            Ok(response) => {
                {
                    let mut stats = self.shared.stats.lock();
                    stats.committed += 1;
                    for (action, item) in response.iter_items() {
                        stats.record_item(action, item.is_success());
                    }
                    if let Some(worker) = stats.workers.get_mut(self.id) {
                        worker.queued = 0;
                        worker.last_duration = elapsed;
                    }
                }

                debug!(
                    "{}: commit {} sent {} requests in {:?} (errors: {})",
                    self.name,
                    execution_id,
                    self.batch.len(),
                    elapsed,
                    response.errors
                );
                self.hooks.after(execution_id, &self.batch, Ok(&response));
                self.batch.clear();
                self.batch_bytes = 0;
                Ok(())
            }
            Err(err) => {
                {
                    let mut stats = self.shared.stats.lock();
                    stats.commit_errors += 1;
                    if let Some(worker) = stats.workers.get_mut(self.id) {
                        worker.last_duration = elapsed;
                    }
                }

                self.hooks.after(execution_id, &self.batch, Err(&err));

                if !err.is_retryable() {
                    let dropped = self.drop_batch();
                    warn!(
                        "{}: commit {} rejected, dropping {} requests: {}",
                        self.name, execution_id, dropped, err
                    );
                } else if self.overflowed() {
                    let pending = self.drop_batch();
                    return Err(BulkError::Stalled {
                        execution_id,
                        pending,
                        source: err,
                    });
                }
                Err(BulkError::Commit {
                    execution_id,
                    source: err,
                })
            }
        }
    }

    async fn send_with_backoff(
        &self,
        execution_id: u64,
        body: String,
    ) -> Result<BulkResponse, ElasticError> {
        let mut attempt: u32 = 0;
        loop {
            match self.service.bulk(body.clone()).await {
                Ok(response) => return Ok(response),
                Err(err) => {
                    attempt += 1;
                    let delay = if err.is_retryable() {
                        self.settings.backoff.delay(attempt)
                    } else {
                        None
                    };
                    match delay {
                        Some(delay) => {
                            warn!(
                                "{}: commit {} attempt {} failed: {}; retrying in {:?}",
                                self.name, execution_id, attempt, err, delay
                            );
                            tokio::time::sleep(delay).await;
                        }
                        None => return Err(err),
                    }
                }
            }
        }
    }
}
