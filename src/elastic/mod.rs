//! Elasticsearch access: HTTP client, configuration, response models, and the
//! trait seams the bulk processor and supervisor are written against.

pub mod client;
pub mod config;
pub mod error;
pub mod models;

pub use client::ElasticClient;
pub use config::ElasticConfig;
pub use error::ElasticError;
pub use models::{BulkResponse, BulkResponseItem};

use serde_json::Value;
use std::future::Future;

/// Index lifecycle operations used during setup.
pub trait IndexAdmin: Send + Sync {
    fn index_exists(&self, index: &str) -> impl Future<Output = Result<bool, ElasticError>> + Send;

    fn delete_index(&self, index: &str) -> impl Future<Output = Result<(), ElasticError>> + Send;

    fn create_index(
        &self,
        index: &str,
        body: Option<&Value>,
    ) -> impl Future<Output = Result<(), ElasticError>> + Send;

    /// Make everything indexed so far visible to search.
    fn refresh_index(&self, index: &str) -> impl Future<Output = Result<(), ElasticError>> + Send;
}

/// Executes one `_bulk` request with an NDJSON body.
pub trait BulkService: Send + Sync + 'static {
    fn bulk(&self, body: String)
    -> impl Future<Output = Result<BulkResponse, ElasticError>> + Send;
}
