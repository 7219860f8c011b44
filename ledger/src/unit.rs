//! Atomic units of work over accounts and the outbox.
//!
//! A unit holds per-key async locks for its whole lifetime. Reads go through
//! the unit, writes are staged, and nothing reaches the stores before
//! [`AtomicUnit::commit`]. Dropping a unit without committing discards it.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use dashmap::DashMap;
use fundsline_common::{Account, AccountId, Currency, CustomerId, LedgerError, Result};
use fundsline_notify::{OutboxBatch, OutboxStore};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, error, warn};

use crate::store::AccountStore;

/// A lockable resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LockKey {
    /// An existing account.
    Account(AccountId),
    /// The (customer, currency) slot an account is created in.
    Registration(CustomerId, Currency),
}

/// Registry of per-key async mutexes.
#[derive(Default)]
pub struct LockRegistry {
    locks: DashMap<LockKey, Arc<Mutex<()>>>,
}

impl LockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire every key, in sorted order.
    ///
    /// Duplicate keys are acquired once. Guards release on drop.
    pub async fn acquire(&self, keys: impl IntoIterator<Item = LockKey>) -> Vec<OwnedMutexGuard<()>> {
        let mut keys: Vec<LockKey> = keys.into_iter().collect();
        keys.sort();
        keys.dedup();

        let mut guards = Vec::with_capacity(keys.len());
        for key in keys {
            let lock = self
                .locks
                .entry(key)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone();
            guards.push(lock.lock_owned().await);
        }
        guards
    }

    /// Number of keys ever locked.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

/// One serializable unit of work.
pub struct AtomicUnit {
    accounts: Arc<dyn AccountStore>,
    outbox_store: Arc<dyn OutboxStore>,
    held: Vec<LockKey>,
    _guards: Vec<OwnedMutexGuard<()>>,
    pre_images: HashMap<AccountId, Option<Account>>,
    staged: BTreeMap<AccountId, Account>,
    outbox: OutboxBatch,
}

impl AtomicUnit {
    /// Open a unit holding `keys`.
    pub async fn begin(
        locks: &LockRegistry,
        accounts: Arc<dyn AccountStore>,
        outbox_store: Arc<dyn OutboxStore>,
        keys: Vec<LockKey>,
    ) -> Self {
        let guards = locks.acquire(keys.iter().cloned()).await;
        debug!(keys = keys.len(), "Atomic unit opened");

        Self {
            accounts,
            outbox_store,
            held: keys,
            _guards: guards,
            pre_images: HashMap::new(),
            staged: BTreeMap::new(),
            outbox: OutboxBatch::new(),
        }
    }

    fn holds(&self, id: AccountId) -> bool {
        self.held.contains(&LockKey::Account(id))
    }

    /// Read an account, preferring state staged by this unit.
    pub async fn load(&mut self, id: AccountId) -> Result<Option<Account>> {
        if let Some(account) = self.staged.get(&id) {
            return Ok(Some(account.clone()));
        }

        let account = self.accounts.find_by_id(id).await?;
        self.pre_images.entry(id).or_insert_with(|| account.clone());
        Ok(account)
    }

    /// Read an account that must exist.
    pub async fn require(&mut self, id: AccountId) -> Result<Account> {
        self.load(id).await?.ok_or(LedgerError::AccountNotFound(id))
    }

    /// Stage an updated account. The account must be locked by this unit.
    pub fn stage(&mut self, account: Account) -> Result<()> {
        if !self.holds(account.id) {
            return Err(LedgerError::Storage(format!(
                "account {} is not locked by this unit",
                account.id
            )));
        }
        if !self.pre_images.contains_key(&account.id) {
            return Err(LedgerError::Storage(format!(
                "account {} staged without being read",
                account.id
            )));
        }
        self.staged.insert(account.id, account);
        Ok(())
    }

    /// Stage a newly opened account under a freshly reserved id.
    pub fn insert(&mut self, account: Account) {
        self.pre_images.insert(account.id, None);
        self.staged.insert(account.id, account);
    }

    /// Outbox entries staged by this unit.
    pub fn outbox(&mut self) -> &mut OutboxBatch {
        &mut self.outbox
    }

    /// Flush staged accounts and outbox entries, then release the locks.
    pub async fn commit(mut self) -> Result<()> {
        let staged = std::mem::take(&mut self.staged);
        let mut written = Vec::with_capacity(staged.len());

        for account in staged.values() {
            if let Err(e) = self.accounts.save(account).await {
                warn!(account = %account.id, error = %e, "Account write failed, rolling back");
                self.restore(&written).await;
                return Err(e);
            }
            written.push(account.id);
        }

        let entries = std::mem::take(&mut self.outbox).into_entries();
        let staged_entries = entries.len();
        if !entries.is_empty() {
            if let Err(e) = self.outbox_store.append(entries).await {
                warn!(error = %e, "Outbox append failed, rolling back");
                self.restore(&written).await;
                return Err(e);
            }
        }

        debug!(
            accounts = written.len(),
            outbox_entries = staged_entries,
            "Atomic unit committed"
        );
        Ok(())
    }

    async fn restore(&self, written: &[AccountId]) {
        for id in written {
            let Some(Some(previous)) = self.pre_images.get(id) else {
                continue;
            };
            if let Err(e) = self.accounts.save(previous).await {
                error!(account = %id, error = %e, "Failed to restore account pre-image");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryAccountStore;
    use async_trait::async_trait;
    use fundsline_common::{Currency, CustomerId, OutboxEntry};
    use fundsline_notify::InMemoryOutboxStore;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    async fn seeded() -> (Arc<InMemoryAccountStore>, Arc<InMemoryOutboxStore>) {
        let accounts = Arc::new(InMemoryAccountStore::new());
        for (id, customer) in [(1, 1), (2, 2)] {
            let mut account = Account::open(AccountId::new(id), CustomerId::new(customer), Currency::usd());
            account.credit(dec!(10)).unwrap();
            accounts.save(&account).await.unwrap();
        }
        (accounts, Arc::new(InMemoryOutboxStore::new()))
    }

    #[tokio::test]
    async fn test_drop_discards_staged_state() {
        let (accounts, outbox) = seeded().await;
        let locks = LockRegistry::new();

        let mut unit = AtomicUnit::begin(
            &locks,
            accounts.clone(),
            outbox.clone(),
            vec![LockKey::Account(AccountId::new(1))],
        )
        .await;
        let mut account = unit.require(AccountId::new(1)).await.unwrap();
        account.credit(dec!(5)).unwrap();
        unit.stage(account.clone()).unwrap();
        unit.outbox().push(OutboxEntry::new(&account, dec!(5)));

        assert_eq!(unit.require(AccountId::new(1)).await.unwrap().balance, dec!(15));
        drop(unit);

        let stored = accounts.find_by_id(AccountId::new(1)).await.unwrap().unwrap();
        assert_eq!(stored.balance, dec!(10));
        assert!(outbox.is_empty());
    }

    #[tokio::test]
    async fn test_stage_requires_lock() {
        let (accounts, outbox) = seeded().await;
        let locks = LockRegistry::new();

        let mut unit = AtomicUnit::begin(
            &locks,
            accounts,
            outbox,
            vec![LockKey::Account(AccountId::new(1))],
        )
        .await;
        let other = unit.require(AccountId::new(2)).await.unwrap();
        assert!(unit.stage(other).is_err());
    }

    #[tokio::test]
    async fn test_locks_serialize_units() {
        let locks = Arc::new(LockRegistry::new());
        let active = Arc::new(AtomicUsize::new(0));
        let mut handles = Vec::new();

        for _ in 0..8 {
            let locks = locks.clone();
            let active = active.clone();
            handles.push(tokio::spawn(async move {
                let _guards = locks
                    .acquire(vec![
                        LockKey::Account(AccountId::new(2)),
                        LockKey::Account(AccountId::new(1)),
                    ])
                    .await;
                assert_eq!(active.fetch_add(1, Ordering::SeqCst), 0);
                tokio::time::sleep(Duration::from_millis(2)).await;
                active.fetch_sub(1, Ordering::SeqCst);
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(locks.len(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_keys_acquired_once() {
        let locks = LockRegistry::new();
        let key = LockKey::Account(AccountId::new(7));
        let guards = locks.acquire(vec![key.clone(), key]).await;
        assert_eq!(guards.len(), 1);
    }

    struct FailingOutbox;

    #[async_trait]
    impl OutboxStore for FailingOutbox {
        async fn append(&self, _entries: Vec<OutboxEntry>) -> Result<()> {
            Err(LedgerError::Storage("outbox offline".to_string()))
        }

        async fn pending(&self, _limit: usize) -> Result<Vec<OutboxEntry>> {
            Ok(Vec::new())
        }

        async fn mark_dispatched(&self, _id: fundsline_common::OutboxEntryId) -> Result<()> {
            Ok(())
        }

        async fn record_failure(&self, _id: fundsline_common::OutboxEntryId, _error: &str) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_failed_outbox_append_restores_accounts() {
        let (accounts, _) = seeded().await;
        let locks = LockRegistry::new();
        let keys = vec![
            LockKey::Account(AccountId::new(1)),
            LockKey::Account(AccountId::new(2)),
        ];

        let mut unit = AtomicUnit::begin(&locks, accounts.clone(), Arc::new(FailingOutbox), keys).await;
        let mut sender = unit.require(AccountId::new(1)).await.unwrap();
        let mut receiver = unit.require(AccountId::new(2)).await.unwrap();
        sender.debit(dec!(4)).unwrap();
        receiver.credit(dec!(4)).unwrap();
        unit.stage(sender.clone()).unwrap();
        unit.stage(receiver.clone()).unwrap();
        unit.outbox().push(OutboxEntry::new(&sender, dec!(-4)));

        assert!(unit.commit().await.is_err());

        for id in [1, 2] {
            let stored = accounts.find_by_id(AccountId::new(id)).await.unwrap().unwrap();
            assert_eq!(stored.balance, dec!(10));
        }
    }
}
