//! Balance change notifications and outbox records.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{reporting_balance, Account, AccountId, Currency, OutboxEntryId};

/// Notification describing an account's balance after a change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountChangeEvent {
    /// Account that changed.
    pub account_id: AccountId,
    /// Account currency.
    pub currency: Currency,
    /// Resulting balance, 2 places, half-to-even.
    pub balance: Decimal,
}

impl AccountChangeEvent {
    /// Build an event from an account's current state.
    pub fn from_account(account: &Account) -> Self {
        Self {
            account_id: account.id,
            currency: account.currency.clone(),
            balance: reporting_balance(account.balance),
        }
    }
}

/// Outbox entry dispatch status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutboxStatus {
    /// Waiting for (re)delivery.
    Pending,
    /// Delivered downstream.
    Dispatched,
}

/// Durable record of a non-zero balance delta.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboxEntry {
    /// Entry identifier.
    pub id: OutboxEntryId,
    /// Account the delta applies to.
    pub account_id: AccountId,
    /// Currency of the delta.
    pub currency: Currency,
    /// Signed balance change.
    pub delta: Decimal,
    /// Dispatch status.
    pub status: OutboxStatus,
    /// Number of failed delivery attempts.
    pub attempts: u32,
    /// Last delivery error, if any.
    pub last_error: Option<String>,
    /// When the entry was recorded.
    pub created_at: DateTime<Utc>,
    /// When the entry was delivered.
    pub dispatched_at: Option<DateTime<Utc>>,
}

impl OutboxEntry {
    /// Create a pending entry for an account delta.
    pub fn new(account: &Account, delta: Decimal) -> Self {
        Self {
            id: OutboxEntryId::new(),
            account_id: account.id,
            currency: account.currency.clone(),
            delta,
            status: OutboxStatus::Pending,
            attempts: 0,
            last_error: None,
            created_at: Utc::now(),
            dispatched_at: None,
        }
    }

    /// Check if the entry still needs delivery.
    pub fn is_pending(&self) -> bool {
        self.status == OutboxStatus::Pending
    }

    /// Mark the entry as delivered.
    pub fn mark_dispatched(&mut self) {
        self.status = OutboxStatus::Dispatched;
        self.dispatched_at = Some(Utc::now());
    }

    /// Record a failed delivery attempt.
    pub fn record_failure(&mut self, error: impl Into<String>) {
        self.attempts += 1;
        self.last_error = Some(error.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CustomerId;
    use rust_decimal_macros::dec;

    fn account_with(balance: Decimal) -> Account {
        let mut account = Account::open(AccountId::new(3), CustomerId::new(1), Currency::eur());
        account.balance = balance;
        account
    }

    #[test]
    fn test_event_rounds_half_even() {
        assert_eq!(
            AccountChangeEvent::from_account(&account_with(dec!(2.005))).balance,
            dec!(2.00)
        );
        assert_eq!(
            AccountChangeEvent::from_account(&account_with(dec!(2.015))).balance,
            dec!(2.02)
        );
        let event = AccountChangeEvent::from_account(&account_with(dec!(12.345)));
        assert_eq!(event.balance, dec!(12.34));
        assert_eq!(event.currency, Currency::eur());
    }

    #[test]
    fn test_outbox_entry_lifecycle() {
        let mut entry = OutboxEntry::new(&account_with(dec!(10)), dec!(-4.5));
        assert!(entry.is_pending());
        assert_eq!(entry.delta, dec!(-4.5));

        entry.record_failure("broker down");
        assert_eq!(entry.attempts, 1);
        assert_eq!(entry.last_error.as_deref(), Some("broker down"));

        entry.mark_dispatched();
        assert!(!entry.is_pending());
        assert!(entry.dispatched_at.is_some());
    }
}
