use crate::bulk::BulkError;
use crate::bulker::BulkerError;
use crate::elastic::ElasticError;
use crate::reader::ReaderError;
use std::path::PathBuf;
use thiserror::Error;

/// Anything that ends a run with a non-zero exit code.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("elasticsearch client error: {0}")]
    Elastic(#[from] ElasticError),
    #[error(transparent)]
    Bulk(#[from] BulkError),
    #[error(transparent)]
    Bulker(#[from] BulkerError),
    #[error(transparent)]
    Reader(#[from] ReaderError),
    #[error("failed to read index mapping {path}: {source}")]
    MappingIo {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid index mapping {path}: {source}")]
    MappingJson {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("cannot derive an index name from {0}")]
    IndexName(PathBuf),
    #[error("failed to list input directory {path}: {source}")]
    InputDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("no input files found")]
    NoInputs,
    #[error("{path} maps to index '{index}', which another input already uses")]
    DuplicateIndex { index: String, path: PathBuf },
    #[error("{0}")]
    Usage(String),
    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
