use thiserror::Error;

/// Failure reported by a transaction source. Cloneable so a single failure can
/// be broadcast to every subscriber of a shared source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    #[error("transaction source failed: {0}")]
    Upstream(String),
}

impl SourceError {
    pub fn upstream(reason: impl Into<String>) -> Self {
        SourceError::Upstream(reason.into())
    }
}
