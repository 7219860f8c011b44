//! Fundsline Notification & Outbox
//!
//! Every committed balance change is announced twice:
//!
//! - synchronously, through a [`NotificationSink`], as part of the ledger
//!   operation itself
//! - asynchronously, through an [`OutboxEntry`](fundsline_common::OutboxEntry)
//!   written with the balance change and later drained by the
//!   [`OutboxDispatcher`]

pub mod dispatcher;
pub mod notifier;
pub mod outbox;
pub mod sink;

pub use dispatcher::{
    DeltaPublisher, DispatchReport, DispatchStats, DispatcherConfig, LoggingPublisher,
    OutboxDispatcher,
};
pub use notifier::AccountNotifier;
pub use outbox::{InMemoryOutboxStore, OutboxBatch, OutboxStore};
pub use sink::{ChannelSink, LoggingSink, NotificationSink};
