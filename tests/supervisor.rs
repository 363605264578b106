use esbulk::bulk::BulkProcessor;
use esbulk::bulker::{Bulker, BulkerHooks, BulkerSettings};
use esbulk::record::{Record, WriteOp};
use esbulk::test_support::FakeCluster;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

fn record(id: usize) -> Record {
    Record {
        case_id: format!("case-{id}"),
        decide_date: "2019-01-25".into(),
        ..Record::default()
    }
}

fn supervisor(cluster: &Arc<FakeCluster>) -> (Arc<Bulker>, Arc<BulkerHooks>) {
    let hooks = Arc::new(BulkerHooks::new());
    let processor = BulkProcessor::builder(Arc::clone(cluster))
        .hooks(hooks.clone())
        .start()
        .unwrap();
    let settings = BulkerSettings {
        index: "cases".into(),
        op: WriteOp::Index,
        require_decide_date: false,
        throttle_poll: Duration::from_millis(5),
    };
    let bulker = Arc::new(Bulker::new(Arc::new(processor), hooks.clone(), settings));
    (bulker, hooks)
}

#[tokio::test]
async fn throttled_supervisor_leaves_records_in_the_channel() {
    let cluster = Arc::new(FakeCluster::new());
    let (bulker, hooks) = supervisor(&cluster);
    hooks.throttle().set(true);

    let (tx, rx) = mpsc::channel(4);
    let cancel = CancellationToken::new();
    let task = {
        let bulker = Arc::clone(&bulker);
        let cancel = cancel.clone();
        tokio::spawn(async move { bulker.run(rx, &cancel).await })
    };

    for id in 0..3 {
        tx.send(record(id)).await.unwrap();
    }
    // several poll intervals pass without anything being taken
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(tx.capacity(), 1);
    assert_eq!(bulker.processor().stats().total_queued(), 0);

    // a full channel blocks the producer
    tx.send(record(3)).await.unwrap();
    assert!(tx.try_send(record(4)).is_err());

    hooks.throttle().set(false);
    drop(tx);
    let summary = task.await.unwrap().unwrap();

    assert_eq!(summary.forwarded, 4);
    assert!(!summary.cancelled);
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while bulker.processor().stats().total_queued() < 4 {
        assert!(tokio::time::Instant::now() < deadline, "records never reached the worker");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    bulker.processor().close().await.unwrap();
    assert_eq!(cluster.documents(), 4);
}

#[tokio::test]
async fn cancellation_wakes_a_throttled_supervisor() {
    let cluster = Arc::new(FakeCluster::new());
    let (bulker, hooks) = supervisor(&cluster);
    hooks.throttle().set(true);

    let (tx, rx) = mpsc::channel(4);
    tx.send(record(0)).await.unwrap();
    let cancel = CancellationToken::new();
    let task = {
        let bulker = Arc::clone(&bulker);
        let cancel = cancel.clone();
        tokio::spawn(async move { bulker.run(rx, &cancel).await })
    };

    tokio::time::sleep(Duration::from_millis(20)).await;
    cancel.cancel();
    let summary = task.await.unwrap().unwrap();

    assert!(summary.cancelled);
    assert_eq!(summary.forwarded, 0);
    // the receiver went away with the supervisor
    assert!(tx.send(record(1)).await.is_err());

    bulker.processor().close().await.unwrap();
    assert_eq!(cluster.bulk_calls(), 0);
}
