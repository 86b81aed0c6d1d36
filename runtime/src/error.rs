use thiserror::Error;

/// Locally-recoverable runtime conditions.
///
/// Every variant here is absorbed internally (logged, then the report is
/// dropped) — none of them ever propagate into the instrumented program.
/// The type exists so the internal logic is checked, not so callers branch
/// on it (§7 "runtime errors are absorbed locally").
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("sample rate {0} outside [0,1]")]
    InvalidSampleRate(f64),
    #[error("collector endpoint {0:?} is not a valid URL")]
    InvalidEndpoint(String),
    #[error("emission queue is full, dropping report")]
    QueueFull,
}
