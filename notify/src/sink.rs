//! Synchronous notification sinks.

use async_trait::async_trait;
use fundsline_common::{AccountChangeEvent, LedgerError, Result};
use tokio::sync::mpsc;

/// Receiver of balance change notifications.
///
/// Delivery is synchronous with the ledger operation: an error aborts it.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Deliver one event.
    async fn deliver(&self, event: &AccountChangeEvent) -> Result<()>;
}

/// Sink that only logs events.
pub struct LoggingSink;

#[async_trait]
impl NotificationSink for LoggingSink {
    async fn deliver(&self, event: &AccountChangeEvent) -> Result<()> {
        tracing::info!(
            account = %event.account_id,
            currency = %event.currency,
            balance = %event.balance,
            "Account changed"
        );
        Ok(())
    }
}

/// Sink forwarding events to an in-process consumer over a bounded channel.
pub struct ChannelSink {
    tx: mpsc::Sender<AccountChangeEvent>,
}

impl ChannelSink {
    /// Create a sink and the receiver its events arrive on.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<AccountChangeEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

#[async_trait]
impl NotificationSink for ChannelSink {
    async fn deliver(&self, event: &AccountChangeEvent) -> Result<()> {
        self.tx
            .send(event.clone())
            .await
            .map_err(|_| LedgerError::Delivery("notification consumer is gone".to_string()))
    }
}
