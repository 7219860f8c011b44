//! Error types for ledger operations.

use crate::{AccountId, Currency, CurrencyPair, CustomerId};
use rust_decimal::Decimal;
use thiserror::Error;

/// Taxonomy class of a [`LedgerError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Missing or invalid input.
    Validation,
    /// Referenced entity is absent.
    NotFound,
    /// Uniqueness violation.
    Conflict,
    /// Business rule rejected the operation.
    BusinessRule,
    /// Conversion dependency failed.
    Gateway,
    /// No rate for the requested pair.
    RateUnavailable,
    /// Notification sink failed.
    Delivery,
    /// Storage backend failed.
    Storage,
    /// Invalid configuration.
    Configuration,
}

/// Main error type for ledger operations.
#[derive(Error, Debug, Clone)]
pub enum LedgerError {
    /// Missing or invalid input.
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    /// Customer does not exist.
    #[error("Customer not found: {0}")]
    CustomerNotFound(CustomerId),

    /// Account does not exist.
    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    /// An account in this currency already exists for the customer.
    #[error("Account already exists for customer {customer_id} in {currency}")]
    AccountExists {
        customer_id: CustomerId,
        currency: Currency,
    },

    /// Sender balance does not cover the amount.
    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds {
        required: Decimal,
        available: Decimal,
    },

    /// Conversion gateway failure (network, timeout, auth, protocol).
    #[error("Conversion gateway error: {0}")]
    Gateway(String),

    /// No conversion rate for the pair.
    #[error("Rate unavailable for {0}")]
    RateUnavailable(CurrencyPair),

    /// Notification sink failure.
    #[error("Notification delivery failed: {0}")]
    Delivery(String),

    /// Storage failure.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl LedgerError {
    /// Build a validation error for a field.
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        LedgerError::Validation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Build a validation error for a missing required field.
    pub fn missing_field(field: &str) -> Self {
        Self::validation(format!("Missing required field: {field}"), field)
    }

    /// Get the taxonomy class.
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::Validation { .. } => ErrorKind::Validation,
            LedgerError::CustomerNotFound(_) | LedgerError::AccountNotFound(_) => {
                ErrorKind::NotFound
            }
            LedgerError::AccountExists { .. } => ErrorKind::Conflict,
            LedgerError::InsufficientFunds { .. } => ErrorKind::BusinessRule,
            LedgerError::Gateway(_) => ErrorKind::Gateway,
            LedgerError::RateUnavailable(_) => ErrorKind::RateUnavailable,
            LedgerError::Delivery(_) => ErrorKind::Delivery,
            LedgerError::Storage(_) => ErrorKind::Storage,
            LedgerError::Configuration(_) => ErrorKind::Configuration,
        }
    }

    /// Check if a caller may reasonably retry this error.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Gateway | ErrorKind::Delivery | ErrorKind::Storage
        )
    }

    /// Get a stable error code.
    pub fn error_code(&self) -> &'static str {
        match self {
            LedgerError::Validation { .. } => "VALIDATION_FAILED",
            LedgerError::CustomerNotFound(_) => "CUSTOMER_NOT_FOUND",
            LedgerError::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            LedgerError::AccountExists { .. } => "ACCOUNT_EXISTS",
            LedgerError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            LedgerError::Gateway(_) => "GATEWAY_ERROR",
            LedgerError::RateUnavailable(_) => "RATE_UNAVAILABLE",
            LedgerError::Delivery(_) => "DELIVERY_FAILED",
            LedgerError::Storage(_) => "STORAGE_ERROR",
            LedgerError::Configuration(_) => "CONFIGURATION_ERROR",
        }
    }
}

/// Result type alias for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;
