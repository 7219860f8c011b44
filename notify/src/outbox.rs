//! Outbox storage for balance deltas awaiting redelivery.

use std::collections::HashMap;

use async_trait::async_trait;
use fundsline_common::{AccountId, LedgerError, OutboxEntry, OutboxEntryId, Result};
use parking_lot::RwLock;

/// Durable store of outbox entries.
#[async_trait]
pub trait OutboxStore: Send + Sync {
    /// Append entries as one unit. Either all are stored or none.
    async fn append(&self, entries: Vec<OutboxEntry>) -> Result<()>;

    /// Oldest pending entries, in append order.
    async fn pending(&self, limit: usize) -> Result<Vec<OutboxEntry>>;

    /// Mark an entry as delivered.
    async fn mark_dispatched(&self, id: OutboxEntryId) -> Result<()>;

    /// Record a failed delivery attempt.
    async fn record_failure(&self, id: OutboxEntryId, error: &str) -> Result<()>;
}

/// Entries staged by one atomic unit, appended together on commit.
#[derive(Debug, Default)]
pub struct OutboxBatch {
    entries: Vec<OutboxEntry>,
}

impl OutboxBatch {
    /// Create an empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage an entry.
    pub fn push(&mut self, entry: OutboxEntry) {
        self.entries.push(entry);
    }

    /// Number of staged entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if nothing is staged.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Staged entries.
    pub fn entries(&self) -> &[OutboxEntry] {
        &self.entries
    }

    /// Take the staged entries.
    pub fn into_entries(self) -> Vec<OutboxEntry> {
        self.entries
    }
}

#[derive(Default)]
struct OutboxState {
    entries: Vec<OutboxEntry>,
    index: HashMap<OutboxEntryId, usize>,
}

/// Outbox kept in process memory.
#[derive(Default)]
pub struct InMemoryOutboxStore {
    state: RwLock<OutboxState>,
}

impl InMemoryOutboxStore {
    /// Create an empty outbox.
    pub fn new() -> Self {
        Self::default()
    }

    /// All entries in append order.
    pub fn entries(&self) -> Vec<OutboxEntry> {
        self.state.read().entries.clone()
    }

    /// Entries recorded for one account.
    pub fn entries_for(&self, account_id: AccountId) -> Vec<OutboxEntry> {
        self.state
            .read()
            .entries
            .iter()
            .filter(|e| e.account_id == account_id)
            .cloned()
            .collect()
    }

    /// Total number of entries.
    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    /// Check if the outbox is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of entries still waiting for delivery.
    pub fn pending_count(&self) -> usize {
        self.state
            .read()
            .entries
            .iter()
            .filter(|e| e.is_pending())
            .count()
    }

    fn update(&self, id: OutboxEntryId, apply: impl FnOnce(&mut OutboxEntry)) -> Result<()> {
        let mut state = self.state.write();
        let position = *state
            .index
            .get(&id)
            .ok_or_else(|| LedgerError::Storage(format!("unknown outbox entry {id}")))?;
        apply(&mut state.entries[position]);
        Ok(())
    }
}

#[async_trait]
impl OutboxStore for InMemoryOutboxStore {
    async fn append(&self, entries: Vec<OutboxEntry>) -> Result<()> {
        let mut state = self.state.write();
        if let Some(dup) = entries.iter().find(|e| state.index.contains_key(&e.id)) {
            return Err(LedgerError::Storage(format!(
                "duplicate outbox entry {}",
                dup.id
            )));
        }

        for entry in entries {
            let position = state.entries.len();
            state.index.insert(entry.id, position);
            state.entries.push(entry);
        }
        Ok(())
    }

    async fn pending(&self, limit: usize) -> Result<Vec<OutboxEntry>> {
        Ok(self
            .state
            .read()
            .entries
            .iter()
            .filter(|e| e.is_pending())
            .take(limit)
            .cloned()
            .collect())
    }

    async fn mark_dispatched(&self, id: OutboxEntryId) -> Result<()> {
        self.update(id, |entry| entry.mark_dispatched())
    }

    async fn record_failure(&self, id: OutboxEntryId, error: &str) -> Result<()> {
        self.update(id, |entry| entry.record_failure(error))
    }
}
