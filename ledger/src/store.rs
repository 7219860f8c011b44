//! Account and customer storage interfaces with in-memory implementations.

use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use fundsline_common::{Account, AccountId, Currency, Customer, CustomerId, LedgerError, Result};
use rust_decimal::Decimal;

/// Lookup of customers. Absence is `Ok(None)`.
#[async_trait]
pub trait CustomerStore: Send + Sync {
    async fn find_by_id(&self, id: CustomerId) -> Result<Option<Customer>>;
}

/// Lookup and persistence of accounts. Absence is `Ok(None)`.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn find_by_id(&self, id: AccountId) -> Result<Option<Account>>;

    async fn find_by_customer_and_currency(
        &self,
        customer_id: CustomerId,
        currency: &Currency,
    ) -> Result<Option<Account>>;

    /// Reserve an id for a new account.
    async fn next_id(&self) -> Result<AccountId>;

    /// Insert or update an account.
    ///
    /// Fails with a conflict if another account already holds the same
    /// (customer, currency) pair.
    async fn save(&self, account: &Account) -> Result<()>;
}

/// Customers kept in process memory.
pub struct InMemoryCustomerStore {
    customers: DashMap<CustomerId, Customer>,
    next_id: AtomicI64,
}

impl InMemoryCustomerStore {
    pub fn new() -> Self {
        Self {
            customers: DashMap::new(),
            next_id: AtomicI64::new(1),
        }
    }

    /// Register a new customer.
    pub fn register(&self, name: impl Into<String>) -> Customer {
        let id = CustomerId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let customer = Customer::new(id, name);
        self.customers.insert(id, customer.clone());
        customer
    }

    pub fn len(&self) -> usize {
        self.customers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.customers.is_empty()
    }
}

impl Default for InMemoryCustomerStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CustomerStore for InMemoryCustomerStore {
    async fn find_by_id(&self, id: CustomerId) -> Result<Option<Customer>> {
        Ok(self.customers.get(&id).map(|c| c.clone()))
    }
}

/// Accounts kept in process memory.
pub struct InMemoryAccountStore {
    accounts: DashMap<AccountId, Account>,
    by_owner: DashMap<(CustomerId, Currency), AccountId>,
    next_id: AtomicI64,
}

impl InMemoryAccountStore {
    pub fn new() -> Self {
        Self {
            accounts: DashMap::new(),
            by_owner: DashMap::new(),
            next_id: AtomicI64::new(1),
        }
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

impl Default for InMemoryAccountStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AccountStore for InMemoryAccountStore {
    async fn find_by_id(&self, id: AccountId) -> Result<Option<Account>> {
        Ok(self.accounts.get(&id).map(|a| a.clone()))
    }

    async fn find_by_customer_and_currency(
        &self,
        customer_id: CustomerId,
        currency: &Currency,
    ) -> Result<Option<Account>> {
        let id = match self.by_owner.get(&(customer_id, currency.clone())) {
            Some(id) => *id,
            None => return Ok(None),
        };
        self.find_by_id(id).await
    }

    async fn next_id(&self) -> Result<AccountId> {
        Ok(AccountId::new(self.next_id.fetch_add(1, Ordering::Relaxed)))
    }

    async fn save(&self, account: &Account) -> Result<()> {
        if account.balance < Decimal::ZERO {
            return Err(LedgerError::Storage(format!(
                "refusing negative balance for account {}",
                account.id
            )));
        }

        match self
            .by_owner
            .entry((account.customer_id, account.currency.clone()))
        {
            Entry::Occupied(owner) if *owner.get() != account.id => {
                return Err(LedgerError::AccountExists {
                    customer_id: account.customer_id,
                    currency: account.currency.clone(),
                });
            }
            Entry::Occupied(_) => {}
            Entry::Vacant(slot) => {
                slot.insert(account.id);
            }
        }

        self.accounts.insert(account.id, account.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fundsline_common::ErrorKind;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_save_and_lookup() {
        let store = InMemoryAccountStore::new();
        let id = store.next_id().await.unwrap();
        let mut account = Account::open(id, CustomerId::new(1), Currency::usd());
        store.save(&account).await.unwrap();

        account.credit(dec!(5)).unwrap();
        store.save(&account).await.unwrap();

        let found = store
            .find_by_customer_and_currency(CustomerId::new(1), &Currency::usd())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.balance, dec!(5));
        assert!(store.find_by_id(AccountId::new(99)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unique_customer_currency() {
        let store = InMemoryAccountStore::new();
        let first = Account::open(store.next_id().await.unwrap(), CustomerId::new(1), Currency::eur());
        let second = Account::open(store.next_id().await.unwrap(), CustomerId::new(1), Currency::eur());

        store.save(&first).await.unwrap();
        let err = store.save(&second).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_negative_balance_refused() {
        let store = InMemoryAccountStore::new();
        let mut account = Account::open(AccountId::new(1), CustomerId::new(1), Currency::usd());
        account.debit(dec!(1)).unwrap();
        assert!(store.save(&account).await.is_err());
    }

    #[tokio::test]
    async fn test_customer_registry() {
        let customers = InMemoryCustomerStore::new();
        let alice = customers.register("Alice");
        let found = customers.find_by_id(alice.id).await.unwrap().unwrap();
        assert_eq!(found.name, "Alice");
        assert!(customers.find_by_id(CustomerId::new(42)).await.unwrap().is_none());
    }
}
