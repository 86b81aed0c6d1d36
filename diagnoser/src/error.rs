use thiserror::Error;

/// The "Diagnoser infrastructure error" taxonomy (§7): failures that belong
/// to the harness around a bisector or detector, not to the bug it found.
#[derive(Debug, Error)]
pub enum DiagnoserError {
    #[error("required toolchain not found: {0}")]
    ToolchainMissing(String),
    #[error("subprocess failed to launch: {0}")]
    SubprocessFailed(String),
    #[error("malformed pass pipeline description: {0}")]
    InvalidPipeline(String),
}
