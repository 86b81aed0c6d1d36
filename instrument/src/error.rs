use thiserror::Error;

#[derive(Debug, Error)]
pub enum InstrumentError {
    #[error("failed to parse IR module: {0}")]
    ParseFailed(String),
    #[error("failed to write IR module to {path}: {message}")]
    WriteFailed { path: String, message: String },
    #[error("module verification failed: {0}")]
    VerificationFailed(String),
}
