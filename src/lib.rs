pub mod app;
pub mod bulk;
pub mod bulker;
pub mod config;
pub mod elastic;
pub mod error;
pub mod reader;
pub mod record;
pub mod shutdown;
pub mod stats;

use env_logger::Env;
use std::sync::Once;

static LOGGER: Once = Once::new();

pub fn init_logger() {
    LOGGER.call_once(|| {
        env_logger::Builder::from_env(
            Env::default().default_filter_or("info,reqwest=warn,hyper=warn"),
        )
        .init();
    });
}

#[cfg_attr(not(test), allow(dead_code))]
pub mod test_support {
    //! In-memory stand-ins for the cluster, shared by unit and integration tests.

    use crate::elastic::{BulkResponse, BulkResponseItem, BulkService, ElasticError, IndexAdmin};
    use parking_lot::Mutex;
    use reqwest::StatusCode;
    use serde_json::Value;
    use std::collections::{HashMap, HashSet};
    use std::time::Duration;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum AdminCall {
        Exists(String),
        Delete(String),
        Create(String),
        Refresh(String),
    }

    #[derive(Default)]
    struct FakeState {
        indices: HashSet<String>,
        admin_calls: Vec<AdminCall>,
        bulk_bodies: Vec<String>,
        documents: usize,
        failing_bulks: usize,
        failing_status: Option<StatusCode>,
        indexed_into: HashMap<String, usize>,
        create_bodies: HashMap<String, Option<Value>>,
    }

    /// Records every call and accepts every bulk item, unless told to fail.
    #[derive(Default)]
    pub struct FakeCluster {
        state: Mutex<FakeState>,
        bulk_latency: Option<Duration>,
    }

    impl FakeCluster {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_index(index: &str) -> Self {
            let cluster = Self::default();
            cluster.state.lock().indices.insert(index.to_string());
            cluster
        }

        pub fn with_bulk_latency(mut self, latency: Duration) -> Self {
            self.bulk_latency = Some(latency);
            self
        }

        /// Fail the next `count` bulk requests with a 503.
        pub fn fail_next_bulks(&self, count: usize) {
            self.fail_next_bulks_with(count, StatusCode::SERVICE_UNAVAILABLE);
        }

        pub fn fail_next_bulks_with(&self, count: usize, status: StatusCode) {
            let mut state = self.state.lock();
            state.failing_bulks = count;
            state.failing_status = Some(status);
        }

        pub fn admin_calls(&self) -> Vec<AdminCall> {
            self.state.lock().admin_calls.clone()
        }

        pub fn bulk_bodies(&self) -> Vec<String> {
            self.state.lock().bulk_bodies.clone()
        }

        /// Bulk attempts received, failed ones included.
        pub fn bulk_calls(&self) -> usize {
            self.state.lock().bulk_bodies.len()
        }

        /// Items accepted by successful bulk requests.
        pub fn documents(&self) -> usize {
            self.state.lock().documents
        }

        /// Items accepted into `index`.
        pub fn documents_in(&self, index: &str) -> usize {
            self.state.lock().indexed_into.get(index).copied().unwrap_or(0)
        }

        pub fn create_body(&self, index: &str) -> Option<Value> {
            self.state.lock().create_bodies.get(index).cloned().flatten()
        }
    }

    impl IndexAdmin for FakeCluster {
        async fn index_exists(&self, index: &str) -> Result<bool, ElasticError> {
            let mut state = self.state.lock();
            state.admin_calls.push(AdminCall::Exists(index.to_string()));
            Ok(state.indices.contains(index))
        }

        async fn delete_index(&self, index: &str) -> Result<(), ElasticError> {
            let mut state = self.state.lock();
            state.admin_calls.push(AdminCall::Delete(index.to_string()));
            if state.indices.remove(index) {
                Ok(())
            } else {
                Err(ElasticError::status(StatusCode::NOT_FOUND, "index_not_found_exception".into()))
            }
        }

        async fn create_index(&self, index: &str, body: Option<&Value>) -> Result<(), ElasticError> {
            let mut state = self.state.lock();
            state.admin_calls.push(AdminCall::Create(index.to_string()));
            if !state.indices.insert(index.to_string()) {
                return Err(ElasticError::status(
                    StatusCode::BAD_REQUEST,
                    "resource_already_exists_exception".into(),
                ));
            }
            state.create_bodies.insert(index.to_string(), body.cloned());
            Ok(())
        }

        async fn refresh_index(&self, index: &str) -> Result<(), ElasticError> {
            let mut state = self.state.lock();
            state.admin_calls.push(AdminCall::Refresh(index.to_string()));
            if state.indices.contains(index) {
                Ok(())
            } else {
                Err(ElasticError::status(StatusCode::NOT_FOUND, "index_not_found_exception".into()))
            }
        }
    }

    impl BulkService for FakeCluster {
        async fn bulk(&self, body: String) -> Result<BulkResponse, ElasticError> {
            if let Some(latency) = self.bulk_latency {
                tokio::time::sleep(latency).await;
            }

            let mut state = self.state.lock();
            state.bulk_bodies.push(body.clone());
            if state.failing_bulks > 0 {
                state.failing_bulks -= 1;
                let status = state.failing_status.unwrap_or(StatusCode::SERVICE_UNAVAILABLE);
                return Err(ElasticError::status(status, "bulk rejected".into()));
            }

            let items = parse_actions(&body)?;
            state.documents += items.len();
            for item in items.iter().flat_map(HashMap::values) {
                *state.indexed_into.entry(item.index.clone()).or_default() += 1;
            }
            Ok(BulkResponse {
                took: 1,
                errors: false,
                items,
            })
        }
    }

    fn parse_actions(body: &str) -> Result<Vec<HashMap<String, BulkResponseItem>>, ElasticError> {
        let mut items = Vec::new();
        let mut lines = body.lines();

        while let Some(line) = lines.next() {
            let meta: HashMap<String, Value> = serde_json::from_str(line)?;
            for (action, target) in meta {
                if action != "delete" {
                    lines.next();
                }
                let item = BulkResponseItem {
                    index: target
                        .get("_index")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    id: target.get("_id").and_then(Value::as_str).map(str::to_string),
                    result: Some(if action == "delete" { "deleted" } else { "created" }.to_string()),
                    status: if action == "index" { 201 } else { 200 },
                    error: None,
                };
                items.push(HashMap::from([(action, item)]));
            }
        }
        Ok(items)
    }
}
