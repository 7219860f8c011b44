//! Fundsline Common Types
//!
//! Shared types for the Fundsline ledger: identifiers, currencies and
//! rounding rules, account records, change events and the error taxonomy.

pub mod account;
pub mod error;
pub mod events;
pub mod identifiers;
pub mod monetary;
pub mod requests;

pub use account::*;
pub use error::*;
pub use events::*;
pub use identifiers::*;
pub use monetary::*;
pub use requests::*;
