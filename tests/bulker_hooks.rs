use esbulk::bulk::{BulkHooks, BulkableRequest};
use esbulk::bulker::{BulkerHooks, CallCountersSnapshot};
use esbulk::elastic::{BulkResponse, ElasticError};
use reqwest::StatusCode;
use serde_json::json;

fn batch() -> Vec<BulkableRequest> {
    vec![BulkableRequest::Index {
        index: "cases".into(),
        id: Some("1".into()),
        doc: json!({"title": "t"}),
    }]
}

fn unavailable() -> ElasticError {
    ElasticError::status(StatusCode::SERVICE_UNAVAILABLE, "no master".into())
}

#[test]
fn failed_commit_throttles_and_next_success_clears() {
    let hooks = BulkerHooks::new();
    let requests = batch();
    assert!(!hooks.throttle().is_throttled());

    hooks.before(1, &requests);
    hooks.after(1, &requests, Err(&unavailable()));
    assert!(hooks.throttle().is_throttled());

    // a second failure keeps it raised
    hooks.before(2, &requests);
    hooks.after(2, &requests, Err(&unavailable()));
    assert!(hooks.throttle().is_throttled());

    hooks.before(3, &requests);
    hooks.after(3, &requests, Ok(&BulkResponse::default()));
    assert!(!hooks.throttle().is_throttled());
}

#[test]
fn rejected_commit_counts_but_does_not_throttle() {
    let hooks = BulkerHooks::new();
    let requests = batch();
    let rejected = ElasticError::status(StatusCode::BAD_REQUEST, "mapper_parsing_exception".into());

    hooks.before(1, &requests);
    hooks.after(1, &requests, Err(&rejected));

    assert!(!hooks.throttle().is_throttled());
    let calls = hooks.counters().snapshot();
    assert_eq!(calls.after_calls, 1);
    assert_eq!(calls.failure_calls, 1);
}

#[test]
fn counters_move_once_per_callback() {
    let hooks = BulkerHooks::new();
    let requests = batch();
    let response = BulkResponse::default();

    hooks.before(1, &requests);
    assert_eq!(
        hooks.counters().snapshot(),
        CallCountersSnapshot {
            before_calls: 1,
            ..CallCountersSnapshot::default()
        }
    );

    hooks.after(1, &requests, Ok(&response));
    hooks.before(2, &requests);
    hooks.after(2, &requests, Err(&unavailable()));
    hooks.before(3, &requests);
    hooks.after(3, &requests, Ok(&response));

    assert_eq!(
        hooks.counters().snapshot(),
        CallCountersSnapshot {
            before_calls: 3,
            after_calls: 3,
            success_calls: 2,
            failure_calls: 1,
        }
    );
}

#[test]
fn counters_are_monotonic_across_threads() {
    let hooks = std::sync::Arc::new(BulkerHooks::new());
    let requests = batch();

    let handles: Vec<_> = (0..4)
        .map(|worker| {
            let hooks = std::sync::Arc::clone(&hooks);
            let requests = requests.clone();
            std::thread::spawn(move || {
                for n in 0..250u64 {
                    hooks.before(n, &requests);
                    if (n + worker) % 5 == 0 {
                        hooks.after(n, &requests, Err(&unavailable()));
                    } else {
                        hooks.after(n, &requests, Ok(&BulkResponse::default()));
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let snapshot = hooks.counters().snapshot();
    assert_eq!(snapshot.before_calls, 1_000);
    assert_eq!(snapshot.after_calls, 1_000);
    assert_eq!(snapshot.failure_calls, 200);
    assert_eq!(snapshot.success_calls + snapshot.failure_calls, snapshot.after_calls);
}
