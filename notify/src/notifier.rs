//! Account change notification.

use std::sync::Arc;

use fundsline_common::{Account, AccountChangeEvent, OutboxEntry, Result};
use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::outbox::OutboxBatch;
use crate::sink::NotificationSink;

/// Emits change notifications and stages outbox entries.
#[derive(Clone)]
pub struct AccountNotifier {
    sink: Arc<dyn NotificationSink>,
}

impl AccountNotifier {
    /// Create a notifier delivering to `sink`.
    pub fn new(sink: Arc<dyn NotificationSink>) -> Self {
        Self { sink }
    }

    /// Notify that `account` changed by `delta`.
    ///
    /// The event is built from the account as passed in, which must already
    /// carry the post-mutation balance. A zero delta produces no outbox entry.
    pub async fn notify_account_change(
        &self,
        account: &Account,
        delta: Decimal,
        batch: &mut OutboxBatch,
    ) -> Result<()> {
        let event = AccountChangeEvent::from_account(account);

        if let Err(e) = self.sink.deliver(&event).await {
            warn!(account = %account.id, error = %e, "Change notification failed");
            return Err(e);
        }

        if !delta.is_zero() {
            debug!(account = %account.id, delta = %delta, "Staging outbox entry");
            batch.push(OutboxEntry::new(account, delta));
        }

        Ok(())
    }
}
