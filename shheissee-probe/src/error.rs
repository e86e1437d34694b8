use std::time::Duration;
use thiserror::Error;

/// Why a domain produced no snapshot this cycle.
///
/// None of these are fatal: the engine logs them and retries on the next cycle.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SourceError {
    /// The discovery utility is not installed or not on PATH
    #[error("{0} not available")]
    Unavailable(String),
    /// The utility ran but failed
    #[error("scan failed: {0}")]
    ScanFailed(String),
    /// The call did not finish before its deadline
    #[error("scan timed out after {}s", .0.as_secs())]
    Timeout(Duration),
}

impl SourceError {
    pub fn scan_failed(reason: impl Into<String>) -> Self {
        Self::ScanFailed(reason.into())
    }
}
