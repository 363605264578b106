use super::backoff::Backoff;
use super::request::BulkableRequest;
use super::stats::BulkProcessorStats;
use super::worker::{Shared, Worker, WorkerCommand, WorkerSettings};
use super::{BulkError, BulkHooks, NoopHooks};
use crate::elastic::BulkService;
use log::{debug, info};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const DEFAULT_BULK_ACTIONS: usize = 1_000;
const DEFAULT_BULK_SIZE: usize = 5 * 1024 * 1024;
const DEFAULT_QUEUE_CAPACITY: usize = 1_024;

pub struct BulkProcessorBuilder<S: BulkService> {
    service: Arc<S>,
    name: String,
    workers: usize,
    bulk_actions: usize,
    bulk_size: usize,
    flush_interval: Option<Duration>,
    backoff: Backoff,
    queue_capacity: usize,
    hooks: Arc<dyn BulkHooks>,
}

impl<S: BulkService> BulkProcessorBuilder<S> {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Number of concurrent workers; `0` keeps the default of one.
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Commit once a worker buffers this many requests.
    pub fn bulk_actions(mut self, bulk_actions: usize) -> Self {
        self.bulk_actions = bulk_actions;
        self
    }

    /// Commit once a worker's body would reach this many bytes.
    pub fn bulk_size(mut self, bulk_size: usize) -> Self {
        self.bulk_size = bulk_size;
        self
    }

    pub fn flush_interval(mut self, interval: Option<Duration>) -> Self {
        self.flush_interval = interval.filter(|interval| !interval.is_zero());
        self
    }

    pub fn backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn hooks(mut self, hooks: Arc<dyn BulkHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    /// Spawn the workers (and flusher, if configured) on the current runtime.
    pub fn start(self) -> Result<BulkProcessor, BulkError> {
        if self.bulk_actions == 0 {
            return Err(BulkError::Config("bulk_actions must be positive".into()));
        }
        if self.bulk_size == 0 {
            return Err(BulkError::Config("bulk_size must be positive".into()));
        }
        if self.queue_capacity == 0 {
            return Err(BulkError::Config("queue_capacity must be positive".into()));
        }
        tokio::runtime::Handle::try_current().map_err(|_| BulkError::NoRuntime)?;

        let shared = Arc::new(Shared {
            stats: Mutex::new(BulkProcessorStats::with_workers(self.workers)),
            execution_id: AtomicU64::new(0),
        });

        let mut senders = Vec::with_capacity(self.workers);
        let mut handles = Vec::with_capacity(self.workers);
        for id in 0..self.workers {
            let (tx, rx) = mpsc::channel(self.queue_capacity);
            let worker = Worker::new(
                id,
                self.name.clone(),
                Arc::clone(&self.service),
                Arc::clone(&self.hooks),
                Arc::clone(&shared),
                WorkerSettings {
                    bulk_actions: self.bulk_actions,
                    bulk_size: self.bulk_size,
                    backoff: self.backoff,
                },
            );
            senders.push(tx);
            handles.push(tokio::spawn(worker.run(rx)));
        }

        let flusher = self.flush_interval.map(|interval| {
            let cancel = CancellationToken::new();
            let handle = tokio::spawn(run_flusher(interval, senders.clone(), cancel.clone()));
            (cancel, handle)
        });

        info!(
            "{}: bulk processor started ({} workers, {} actions, {} bytes, flush {:?})",
            self.name, self.workers, self.bulk_actions, self.bulk_size, self.flush_interval
        );

        Ok(BulkProcessor {
            name: self.name,
            senders,
            next: AtomicUsize::new(0),
            shared,
            handles: Mutex::new(handles),
            flusher: Mutex::new(flusher),
        })
    }
}

/// Batches bulkable requests over a pool of workers and commits them
/// through a [`BulkService`].
pub struct BulkProcessor {
    name: String,
    senders: Vec<mpsc::Sender<WorkerCommand>>,
    next: AtomicUsize,
    shared: Arc<Shared>,
    handles: Mutex<Vec<JoinHandle<Result<(), BulkError>>>>,
    flusher: Mutex<Option<(CancellationToken, JoinHandle<()>)>>,
}

impl BulkProcessor {
    pub fn builder<S: BulkService>(service: Arc<S>) -> BulkProcessorBuilder<S> {
        BulkProcessorBuilder {
            service,
            name: "bulk".to_string(),
            workers: 1,
            bulk_actions: DEFAULT_BULK_ACTIONS,
            bulk_size: DEFAULT_BULK_SIZE,
            flush_interval: None,
            backoff: Backoff::default(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            hooks: Arc::new(NoopHooks),
        }
    }

    pub fn workers(&self) -> usize {
        self.senders.len()
    }

    /// Queue a request on the next worker, waiting if its queue is full.
    pub async fn add(&self, request: BulkableRequest) -> Result<(), BulkError> {
        let slot = self.next.fetch_add(1, Ordering::Relaxed) % self.senders.len();
        self.senders[slot]
            .send(WorkerCommand::Add(request))
            .await
            .map_err(|_| BulkError::Closed)
    }

    /// Make every worker commit its buffer and wait for all of them.
    pub async fn flush(&self) -> Result<(), BulkError> {
        let mut acks = Vec::with_capacity(self.senders.len());
        for sender in &self.senders {
            let (tx, rx) = oneshot::channel();
            sender
                .send(WorkerCommand::Flush(Some(tx)))
                .await
                .map_err(|_| BulkError::Closed)?;
            acks.push(rx);
        }

        let mut first_error = None;
        for ack in acks {
            let result = ack.await.map_err(|_| BulkError::Closed).and_then(|r| r);
            if let Err(err) = result {
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    pub fn stats(&self) -> BulkProcessorStats {
        self.shared.stats.lock().clone()
    }

    /// Stop the flusher, commit every remaining buffer, and join the workers.
    ///
    /// Calling it again is a no-op.
    pub async fn close(&self) -> Result<(), BulkError> {
        let flusher = self.flusher.lock().take();
        if let Some((cancel, handle)) = flusher {
            cancel.cancel();
            let _ = handle.await;
        }

        for sender in &self.senders {
            let _ = sender.send(WorkerCommand::Close).await;
        }

        let handles: Vec<_> = std::mem::take(&mut *self.handles.lock());
        let mut first_error = None;
        for handle in handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(err) => Err(BulkError::Join(err)),
            };
            if let Err(err) = result {
                first_error.get_or_insert(err);
            }
        }

        debug!("{}: bulk processor closed", self.name);
        first_error.map_or(Ok(()), Err)
    }
}

async fn run_flusher(
    interval: Duration,
    senders: Vec<mpsc::Sender<WorkerCommand>>,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    // first tick completes immediately
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                for sender in &senders {
                    // a busy worker will commit on its own thresholds
                    let _ = sender.try_send(WorkerCommand::Flush(None));
                }
            }
        }
    }
}
