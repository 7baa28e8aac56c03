use std::time::Duration;

/// Infrastructure failure while beginning, committing or rolling back a transaction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct InfraError {
    message: String,
}

impl InfraError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<sea_orm::DbErr> for InfraError {
    fn from(e: sea_orm::DbErr) -> Self {
        Self::new(e.to_string())
    }
}

/// Outcome of a failed unit of work.
///
/// `Domain` carries the error returned by the work itself. Every other variant
/// originates in the transaction machinery, so callers can distinguish
/// business-logic failures from infrastructure ones.
#[derive(Debug, thiserror::Error)]
pub enum TxError<E> {
    #[error(transparent)]
    Domain(E),

    #[error("database BeginTransaction failed: {0}")]
    Begin(InfraError),

    #[error("database transaction commit failed: {0}")]
    Commit(InfraError),

    #[error("database transaction timeout after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("unknown error: {0}")]
    Panicked(String),

    #[error("unit of work was cancelled")]
    Cancelled,
}

impl<E> TxError<E> {
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// Collapses the error into the domain type, mapping non-domain failures with `map`.
    #[must_use]
    pub fn into_domain_with<F>(self, map: F) -> E
    where
        F: FnOnce(TxError<E>) -> E,
    {
        match self {
            Self::Domain(e) => e,
            other => map(other),
        }
    }
}
