//! Conversion transport trait.

use async_trait::async_trait;
use fundsline_common::CurrencyPair;
use rust_decimal::Decimal;

use crate::error::FxResult;

/// A transport able to convert an amount between two currencies.
///
/// Implementations return the raw converted amount; rounding to the target
/// currency's minor units is done by [`crate::ConversionGateway`].
#[async_trait]
pub trait CurrencyConverter: Send + Sync {
    /// Get the transport name.
    fn name(&self) -> &str;

    /// Convert `amount` of `pair.base` into `pair.quote`.
    async fn convert(&self, pair: &CurrencyPair, amount: Decimal) -> FxResult<Decimal>;
}
