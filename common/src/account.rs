//! Account and customer records.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{display_scale, AccountId, Currency, CustomerId, LedgerError, Result};

/// A customer account holding a single-currency balance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// Account identifier.
    pub id: AccountId,
    /// Owning customer.
    pub customer_id: CustomerId,
    /// Account currency.
    pub currency: Currency,
    /// Current balance, never negative.
    pub balance: Decimal,
    /// When the account was created.
    pub created_at: DateTime<Utc>,
    /// When the balance last changed.
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Open a new zero-balance account.
    pub fn open(id: AccountId, customer_id: CustomerId, currency: Currency) -> Self {
        let now = Utc::now();
        Self {
            id,
            customer_id,
            currency,
            balance: Decimal::ZERO,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check if the account can cover a debit.
    pub fn has_sufficient_funds(&self, amount: Decimal) -> bool {
        self.balance >= amount
    }

    /// Increase the balance.
    pub fn credit(&mut self, amount: Decimal) -> Result<()> {
        self.balance = self
            .balance
            .checked_add(amount)
            .ok_or_else(|| LedgerError::validation("Amount overflows the account balance", "amount"))?;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Decrease the balance. Callers check funds first.
    pub fn debit(&mut self, amount: Decimal) -> Result<()> {
        self.balance = self
            .balance
            .checked_sub(amount)
            .ok_or_else(|| LedgerError::validation("Amount overflows the account balance", "amount"))?;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Balance view returned to callers.
    pub fn balance_view(&self) -> AccountBalance {
        AccountBalance {
            balance: display_scale(self.balance),
            currency: self.currency.clone(),
        }
    }
}

/// A customer known to the ledger. Profile data is not interpreted here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    /// Customer identifier.
    pub id: CustomerId,
    /// Display name.
    pub name: String,
    /// When the customer was registered.
    pub created_at: DateTime<Utc>,
}

impl Customer {
    /// Create a new customer record.
    pub fn new(id: CustomerId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            created_at: Utc::now(),
        }
    }
}

/// Balance of an account as reported by a query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountBalance {
    /// Balance padded to at least two decimal places.
    pub balance: Decimal,
    /// Account currency.
    pub currency: Currency,
}
