//! Conversion gateway error types.

use std::time::Duration;

use fundsline_common::{CurrencyPair, LedgerError};
use thiserror::Error;

/// Errors that can occur while converting an amount.
#[derive(Debug, Error)]
pub enum FxError {
    /// No rate is available for the pair.
    #[error("Rate not available for {0}")]
    RateUnavailable(CurrencyPair),

    /// The transport failed (connect, send, receive).
    #[error("Transport error: {0}")]
    Transport(String),

    /// The conversion call did not complete in time.
    #[error("Conversion timed out after {0:?}")]
    Timeout(Duration),

    /// The authentication collaborator rejected the credentials.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// The remote side answered with something unusable.
    #[error("Protocol error: {0}")]
    Protocol(String),
}

/// Result type for conversion operations.
pub type FxResult<T> = Result<T, FxError>;

impl From<FxError> for LedgerError {
    fn from(err: FxError) -> Self {
        match err {
            FxError::RateUnavailable(pair) => LedgerError::RateUnavailable(pair),
            other => LedgerError::Gateway(other.to_string()),
        }
    }
}
