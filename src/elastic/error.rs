use reqwest::StatusCode;
use thiserror::Error;

/// Errors that occur while talking to the Elasticsearch cluster.
#[derive(Debug, Error)]
pub enum ElasticError {
    #[error("elasticsearch HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("elasticsearch returned status {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("failed to decode elasticsearch response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ElasticError {
    pub fn status(status: StatusCode, body: String) -> Self {
        ElasticError::Status { status, body }
    }

    /// Whether a retry of the same request could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ElasticError::Http(err) => err.is_timeout() || err.is_connect() || err.is_request(),
            ElasticError::Status { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            ElasticError::Decode(_) => false,
        }
    }
}
