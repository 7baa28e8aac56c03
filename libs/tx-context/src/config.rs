use std::time::Duration;

/// Default wall-clock budget for one outermost unit of work.
pub const DEFAULT_TRANSACTION_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Transaction configuration.
///
/// The timeout is measured from the moment the transaction has begun, not from
/// the moment `execute_in_transaction` was called.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxConfig {
    pub timeout: Duration,
}

impl TxConfig {
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for TxConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TRANSACTION_TIMEOUT,
        }
    }
}
