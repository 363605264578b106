//! Periodic console report of processor and supervisor counters.

use crate::bulk::BulkProcessorStats;
use crate::bulker::{Bulker, CallCountersSnapshot};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Render one report line.
pub fn format_stats_line(
    stats: &BulkProcessorStats,
    calls: &CallCountersSnapshot,
    throttled: bool,
) -> String {
    let queued: Vec<String> = stats
        .workers
        .iter()
        .map(|worker| worker.queued.to_string())
        .collect();

    format!(
        "queued=[{}] indexed={} created={} updated={} deleted={} succeeded={} failed={} \
         committed={} commit_errors={} flushed={} | before={} after={} success={} failure={} \
         throttled={}",
        queued.join(" "),
        stats.indexed,
        stats.created,
        stats.updated,
        stats.deleted,
        stats.succeeded,
        stats.failed,
        stats.committed,
        stats.commit_errors,
        stats.flushed,
        calls.before_calls,
        calls.after_calls,
        calls.success_calls,
        calls.failure_calls,
        throttled
    )
}

pub struct StatsPrinter;

impl StatsPrinter {
    /// Print a report line every `interval` until `cancel` fires.
    pub fn spawn(
        interval: Duration,
        bulker: Arc<Bulker>,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        println!("{}", Self::line(&bulker));
                    }
                }
            }
        })
    }

    /// The report line for `bulker`, prefixed with its index.
    pub fn line(bulker: &Bulker) -> String {
        let line = format_stats_line(
            &bulker.processor().stats(),
            &bulker.counters(),
            bulker.is_throttled(),
        );
        format!("{}: {}", bulker.index(), line)
    }
}
