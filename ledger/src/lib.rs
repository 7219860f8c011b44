//! Fundsline Ledger Engine
//!
//! Customer accounts with single-currency balances and the operations that
//! change them: creation, top-up and transfer.
//!
//! # Example
//!
//! ```rust,ignore
//! use fundsline_ledger::{LedgerEngine, LedgerStores};
//! use fundsline_common::{Currency, CreateAccountRequest, TopUpRequest};
//!
//! let engine = LedgerEngine::new(stores, gateway, notifier);
//! let id = engine
//!     .create_account(CreateAccountRequest::new(customer, Currency::usd()))
//!     .await?;
//! engine.top_up(id, TopUpRequest::new(dec!(25))).await?;
//! ```

pub mod config;
pub mod engine;
pub mod store;
pub mod unit;

pub use config::{ConversionScope, LedgerConfig};
pub use engine::{LedgerEngine, LedgerStores};
pub use store::{AccountStore, CustomerStore, InMemoryAccountStore, InMemoryCustomerStore};
pub use unit::{AtomicUnit, LockKey, LockRegistry};
