//! Asynchronous redelivery of outbox entries.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use fundsline_common::{LedgerError, OutboxEntry, Result};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::outbox::OutboxStore;

/// Downstream transport for outbox entries.
#[async_trait]
pub trait DeltaPublisher: Send + Sync {
    /// Get the publisher name.
    fn name(&self) -> &str;

    /// Publish one entry. May be called more than once for the same entry.
    async fn publish(&self, entry: &OutboxEntry) -> Result<()>;
}

/// Publisher that writes entries to the log as JSON.
pub struct LoggingPublisher;

#[async_trait]
impl DeltaPublisher for LoggingPublisher {
    fn name(&self) -> &str {
        "log"
    }

    async fn publish(&self, entry: &OutboxEntry) -> Result<()> {
        let payload = serde_json::to_string(entry)
            .map_err(|e| LedgerError::Delivery(e.to_string()))?;
        info!(entry_id = %entry.id, payload = %payload, "Balance delta published");
        Ok(())
    }
}

/// Dispatcher configuration.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Delay between polls of the outbox.
    pub poll_interval: Duration,
    /// Maximum entries handled per poll.
    pub batch_size: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            batch_size: 100,
        }
    }
}

impl DispatcherConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(ms) = std::env::var("OUTBOX_POLL_INTERVAL_MS") {
            if let Ok(ms) = ms.parse() {
                config.poll_interval = Duration::from_millis(ms);
            }
        }

        if let Ok(size) = std::env::var("OUTBOX_BATCH_SIZE") {
            if let Ok(size) = size.parse() {
                config.batch_size = size;
            }
        }

        config
    }

    /// Validate configuration.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.poll_interval.is_zero() {
            return Err("Outbox poll interval cannot be zero".to_string());
        }
        if self.batch_size == 0 {
            return Err("Outbox batch size cannot be zero".to_string());
        }
        Ok(())
    }
}

/// Outcome of one dispatch pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Entries delivered.
    pub published: usize,
    /// Entries whose delivery failed.
    pub failed: usize,
    /// Entries held back behind a failed entry of the same account.
    pub deferred: usize,
}

/// Lifetime dispatcher counters.
#[derive(Debug, Default)]
pub struct DispatchStats {
    pub published: AtomicU64,
    pub failed: AtomicU64,
    pub passes: AtomicU64,
}

/// Drains pending outbox entries into a publisher, at least once.
pub struct OutboxDispatcher {
    store: Arc<dyn OutboxStore>,
    publisher: Arc<dyn DeltaPublisher>,
    config: DispatcherConfig,
    stats: DispatchStats,
}

impl OutboxDispatcher {
    /// Create a new dispatcher.
    pub fn new(
        store: Arc<dyn OutboxStore>,
        publisher: Arc<dyn DeltaPublisher>,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            store,
            publisher,
            config,
            stats: DispatchStats::default(),
        }
    }

    /// Get lifetime counters.
    pub fn stats(&self) -> &DispatchStats {
        &self.stats
    }

    /// Run one pass over the pending entries.
    ///
    /// Once an entry fails, later entries of the same account wait for the
    /// next pass so each account's deltas are published in order.
    pub async fn dispatch_once(&self) -> Result<DispatchReport> {
        let pending = self.store.pending(self.config.batch_size).await?;
        let mut report = DispatchReport::default();
        let mut blocked = HashSet::new();

        for entry in pending {
            if blocked.contains(&entry.account_id) {
                report.deferred += 1;
                continue;
            }

            match self.publisher.publish(&entry).await {
                Ok(()) => {
                    self.store.mark_dispatched(entry.id).await?;
                    report.published += 1;
                }
                Err(e) => {
                    warn!(
                        entry_id = %entry.id,
                        account = %entry.account_id,
                        attempts = entry.attempts + 1,
                        error = %e,
                        "Outbox delivery failed"
                    );
                    self.store.record_failure(entry.id, &e.to_string()).await?;
                    blocked.insert(entry.account_id);
                    report.failed += 1;
                }
            }
        }

        self.stats.passes.fetch_add(1, Ordering::Relaxed);
        self.stats
            .published
            .fetch_add(report.published as u64, Ordering::Relaxed);
        self.stats
            .failed
            .fetch_add(report.failed as u64, Ordering::Relaxed);

        if report.published > 0 || report.failed > 0 {
            debug!(
                published = report.published,
                failed = report.failed,
                deferred = report.deferred,
                "Outbox pass complete"
            );
        }

        Ok(report)
    }

    /// Poll the outbox until `shutdown` becomes true, then drain the backlog.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            publisher = self.publisher.name(),
            interval_ms = self.config.poll_interval.as_millis() as u64,
            "Outbox dispatcher started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            if let Err(e) = self.dispatch_once().await {
                warn!(error = %e, "Outbox pass aborted");
            }

            tokio::select! {
                _ = tokio::time::sleep(self.config.poll_interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        // Drain the backlog until a pass makes no clean progress.
        loop {
            match self.dispatch_once().await {
                Ok(report) if report.published > 0 && report.failed == 0 => continue,
                Ok(_) => break,
                Err(e) => {
                    warn!(error = %e, "Final outbox pass aborted");
                    break;
                }
            }
        }
        info!("Outbox dispatcher stopped");
    }
}
