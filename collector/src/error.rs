use thiserror::Error;

/// Collector-level failures. Ingestion rejections are distinct from storage
/// failures (§7): a malformed submission never touches the database, a
/// storage failure never corrupts the record it was about to write.
#[derive(Debug, Error)]
pub enum CollectorError {
    #[error("rejected report: {0}")]
    Rejected(String),
    #[error("record {0} not found")]
    NotFound(String),
    #[error("storage failure: {0}")]
    Storage(#[from] sqlx::Error),
}
