//! Request and result values for ledger operations.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{AccountId, Currency, CustomerId, LedgerError, Result};

/// Request to open an account.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateAccountRequest {
    pub customer_id: Option<CustomerId>,
    pub currency: Option<Currency>,
}

impl CreateAccountRequest {
    pub fn new(customer_id: CustomerId, currency: Currency) -> Self {
        Self {
            customer_id: Some(customer_id),
            currency: Some(currency),
        }
    }
}

/// Request to deposit into an account.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TopUpRequest {
    pub amount: Option<Decimal>,
}

impl TopUpRequest {
    pub fn new(amount: Decimal) -> Self {
        Self {
            amount: Some(amount),
        }
    }
}

/// Request to move funds between two accounts.
/// The amount is expressed in the sender's currency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferRequest {
    pub sender_account: AccountId,
    pub receiver_account: AccountId,
    pub amount_in_sender_currency: Option<Decimal>,
}

impl TransferRequest {
    pub fn new(sender_account: AccountId, receiver_account: AccountId, amount: Decimal) -> Self {
        Self {
            sender_account,
            receiver_account,
            amount_in_sender_currency: Some(amount),
        }
    }
}

/// Outcome of a committed transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferReceipt {
    pub sender_account: AccountId,
    pub receiver_account: AccountId,
    /// Amount taken from the sender, in the sender's currency.
    pub debited: Decimal,
    /// Amount given to the receiver, in the receiver's currency.
    pub credited: Decimal,
}

/// Require a present, strictly positive amount.
pub fn require_positive(amount: Option<Decimal>, field: &str) -> Result<Decimal> {
    let amount = amount.ok_or_else(|| LedgerError::missing_field(field))?;
    if amount <= Decimal::ZERO {
        return Err(LedgerError::validation(
            "Amount must be greater than zero",
            field,
        ));
    }
    Ok(amount)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use rust_decimal_macros::dec;

    #[test]
    fn test_require_positive() {
        assert_eq!(require_positive(Some(dec!(0.01)), "amount").unwrap(), dec!(0.01));
        assert_eq!(
            require_positive(None, "amount").unwrap_err().kind(),
            ErrorKind::Validation
        );
        assert!(require_positive(Some(Decimal::ZERO), "amount").is_err());
        assert!(require_positive(Some(dec!(-1)), "amount").is_err());
    }

    #[test]
    fn test_deserialize_transfer_request() {
        let json = r#"{"sender_account":1,"receiver_account":2,"amount_in_sender_currency":"12.50"}"#;
        let request: TransferRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.sender_account, AccountId::new(1));
        assert_eq!(request.amount_in_sender_currency, Some(dec!(12.50)));

        let missing: TopUpRequest = serde_json::from_str("{}").unwrap();
        assert!(missing.amount.is_none());
    }
}
