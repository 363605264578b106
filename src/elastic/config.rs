use crate::config::{env_duration_millis, env_string};
use std::env;
use std::time::Duration;

/// Connection settings for the Elasticsearch cluster.
#[derive(Debug, Clone)]
pub struct ElasticConfig {
    pub base_url: String,
    pub request_timeout: Duration,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl ElasticConfig {
    pub fn from_env() -> Self {
        Self {
            base_url: env_string("ELASTICSEARCH_URL", "http://127.0.0.1:9200"),
            request_timeout: env_duration_millis("ELASTICSEARCH_TIMEOUT_MS", 30_000),
            username: env::var("ELASTICSEARCH_USERNAME").ok(),
            password: env::var("ELASTICSEARCH_PASSWORD").ok(),
        }
    }

    pub fn with_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

impl Default for ElasticConfig {
    fn default() -> Self {
        Self::from_env()
    }
}
