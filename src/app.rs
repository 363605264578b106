//! End-to-end wiring: index setup, processor, reader, supervisor, and stats.
//!
//! [`run`] ingests one file into one index. [`run_all`] fans several files
//! out concurrently, each into the index named after its file.

use crate::bulk::{Backoff, BulkProcessor, BulkProcessorStats};
use crate::bulker::{Bulker, BulkerHooks, BulkerSettings, CallCountersSnapshot, IngestSummary, setup_index};
use crate::config::BulkConfig;
use crate::elastic::{BulkService, IndexAdmin};
use crate::error::AppError;
use crate::reader::{DecodePolicy, LineReader, ReadSummary};
use crate::record::WriteOp;
use crate::stats::StatsPrinter;
use log::{debug, info, warn};
use serde_json::Value;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub input: PathBuf,
    pub index: String,
    pub mapping: Option<PathBuf>,
    pub op: WriteOp,
    pub decode_policy: DecodePolicy,
    pub require_decide_date: bool,
    /// `0` means the configured default.
    pub workers: usize,
    pub print_stats: bool,
    /// Refresh the index once everything is committed.
    pub refresh: bool,
    pub bulk: BulkConfig,
}

impl RunOptions {
    pub fn new(input: impl Into<PathBuf>, index: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            index: index.into(),
            mapping: None,
            op: WriteOp::default(),
            decode_policy: DecodePolicy::default(),
            require_decide_date: false,
            workers: 0,
            print_stats: true,
            refresh: false,
            bulk: BulkConfig::from_env(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub read: ReadSummary,
    pub ingest: IngestSummary,
    pub stats: BulkProcessorStats,
    pub calls: CallCountersSnapshot,
}

impl RunReport {
    pub fn interrupted(&self) -> bool {
        self.ingest.cancelled || self.read.interrupted
    }
}

/// Index name derived from a file name: everything before the first dot,
/// lowercased.
pub fn index_name_for(path: &Path) -> Result<String, AppError> {
    path.file_name()
        .and_then(|name| name.to_str())
        .and_then(|name| name.split('.').next())
        .map(str::trim)
        .filter(|stem| !stem.is_empty())
        .map(str::to_lowercase)
        .ok_or_else(|| AppError::IndexName(path.to_path_buf()))
}

pub fn load_mapping(path: &Path) -> Result<Value, AppError> {
    let raw = std::fs::read(path).map_err(|source| AppError::MappingIo {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_slice(&raw).map_err(|source| AppError::MappingJson {
        path: path.to_path_buf(),
        source,
    })
}

/// Stream `options.input` into `options.index` until end of input or
/// until `cancel` fires.
pub async fn run<C>(
    client: Arc<C>,
    options: RunOptions,
    cancel: CancellationToken,
) -> Result<RunReport, AppError>
where
    C: IndexAdmin + BulkService,
{
    let mapping = options.mapping.as_deref().map(load_mapping).transpose()?;
    setup_index(&*client, &options.index, mapping.as_ref()).await?;

    let bulk = &options.bulk;
    let hooks = Arc::new(BulkerHooks::new());
    let processor = BulkProcessor::builder(Arc::clone(&client))
        .name(format!("bulk[{}]", options.index))
        .workers(bulk.resolve_workers(options.workers))
        .bulk_actions(bulk.bulk_actions)
        .bulk_size(bulk.bulk_size)
        .flush_interval(bulk.flush_interval)
        .backoff(Backoff::exponential(
            bulk.backoff_initial,
            bulk.backoff_max,
            bulk.backoff_retries,
        ))
        .hooks(hooks.clone())
        .start()?;

    let settings = BulkerSettings {
        index: options.index.clone(),
        op: options.op,
        require_decide_date: options.require_decide_date,
        throttle_poll: bulk.throttle_poll,
    };
    let bulker = Arc::new(Bulker::new(Arc::new(processor), hooks, settings));

    let printer_cancel = cancel.child_token();
    let printer = options.print_stats.then(|| {
        StatsPrinter::spawn(bulk.stats_interval, Arc::clone(&bulker), printer_cancel.clone())
    });

    let (tx, rx) = mpsc::channel(bulk.channel_capacity);
    let reader = LineReader::new(options.input.clone()).decode_policy(options.decode_policy);
    let reader_task = tokio::task::spawn_blocking(move || reader.read_into(&tx));

    // the supervisor returns once the reader drops its sender, on
    // cancellation, or on a processor error; either way `rx` is dropped so
    // a blocked reader wakes up
    let ingest = bulker.run(rx, &cancel).await;
    let read = reader_task.await;

    printer_cancel.cancel();
    if let Some(printer) = printer {
        let _ = printer.await;
    }

    let processor = bulker.processor();
    if let Err(err) = processor.flush().await {
        warn!("final flush failed: {}", err);
    }
    let closed = processor.close().await;

    // a stalled worker also surfaces as a closed channel in the supervisor;
    // the close error carries the cause
    let read = read??;
    closed?;
    let report = RunReport {
        read,
        ingest: ingest?,
        stats: processor.stats(),
        calls: bulker.counters(),
    };

    if options.refresh {
        client.refresh_index(&options.index).await?;
        debug!("refreshed index '{}'", options.index);
    }

    if options.print_stats {
        println!("{}", StatsPrinter::line(&bulker));
    }
    info!(
        "run finished: {} lines read, {} records forwarded, {} succeeded, {} failed",
        report.read.lines, report.ingest.forwarded, report.stats.succeeded, report.stats.failed
    );
    Ok(report)
}

/// Expand `paths` into input files. A directory contributes its regular,
/// non-hidden files in name order.
pub fn collect_inputs(paths: &[PathBuf]) -> Result<Vec<PathBuf>, AppError> {
    let mut inputs = Vec::new();
    for path in paths {
        if !path.is_dir() {
            inputs.push(path.clone());
            continue;
        }

        let dir_error = |source| AppError::InputDir {
            path: path.clone(),
            source,
        };
        let mut files = Vec::new();
        for entry in std::fs::read_dir(path).map_err(dir_error)? {
            let entry = entry.map_err(dir_error)?;
            let hidden = entry.file_name().to_string_lossy().starts_with('.');
            let file = entry.path();
            if !hidden && file.is_file() {
                files.push(file);
            }
        }
        files.sort();
        inputs.extend(files);
    }

    if inputs.is_empty() {
        return Err(AppError::NoInputs);
    }
    Ok(inputs)
}

/// Result of one file's run within [`run_all`].
#[derive(Debug)]
pub struct FileOutcome {
    pub input: PathBuf,
    pub index: String,
    pub result: Result<RunReport, AppError>,
}

/// Ingest every file in `inputs` into the index named after it (see
/// [`index_name_for`]), with at most `parallel` files in flight.
///
/// `template` supplies every other option. Outcomes come back in input
/// order; one file failing does not stop the others.
pub async fn run_all<C>(
    client: Arc<C>,
    inputs: Vec<PathBuf>,
    template: RunOptions,
    parallel: usize,
    cancel: CancellationToken,
) -> Result<Vec<FileOutcome>, AppError>
where
    C: IndexAdmin + BulkService,
{
    let mut planned = Vec::with_capacity(inputs.len());
    let mut seen = HashSet::new();
    for input in inputs {
        let index = index_name_for(&input)?;
        if !seen.insert(index.clone()) {
            return Err(AppError::DuplicateIndex { index, path: input });
        }
        planned.push((input, index));
    }
    info!(
        "ingesting {} files, {} at a time",
        planned.len(),
        parallel.max(1)
    );

    let permits = Arc::new(Semaphore::new(parallel.max(1)));
    let mut tasks = JoinSet::new();
    for (position, (input, index)) in planned.into_iter().enumerate() {
        let mut options = template.clone();
        options.input = input.clone();
        options.index = index.clone();
        let client = Arc::clone(&client);
        let permits = Arc::clone(&permits);
        let cancel = cancel.clone();

        tasks.spawn(async move {
            let _permit = permits.acquire_owned().await;
            let result = if cancel.is_cancelled() {
                // never started, so the index was left untouched
                Ok(RunReport {
                    ingest: IngestSummary {
                        cancelled: true,
                        ..IngestSummary::default()
                    },
                    ..RunReport::default()
                })
            } else {
                run(client, options, cancel).await
            };
            (position, FileOutcome { input, index, result })
        });
    }

    let mut outcomes = Vec::with_capacity(tasks.len());
    while let Some(joined) = tasks.join_next().await {
        outcomes.push(joined?);
    }
    outcomes.sort_by_key(|(position, _)| *position);
    Ok(outcomes.into_iter().map(|(_, outcome)| outcome).collect())
}
