//! Frames exchanged on the conversion stream.
//!
//! Each frame is one JSON document terminated by a newline. Replies carry the
//! request id of the frame they answer and may arrive in any order.

use fundsline_common::{Currency, CurrencyPair};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{FxError, FxResult};

/// Conversion request frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvertFrame {
    /// Correlation id, unique per connection.
    pub request_id: u64,
    /// Source currency.
    pub from: Currency,
    /// Target currency.
    pub to: Currency,
    /// Amount in the source currency.
    pub amount: Decimal,
}

impl ConvertFrame {
    /// Get the currency pair of this request.
    pub fn pair(&self) -> CurrencyPair {
        CurrencyPair::new(self.from.clone(), self.to.clone())
    }
}

/// Result carried by a reply frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ConvertOutcome {
    /// Amount converted into the target currency.
    Converted { amount: Decimal },
    /// The service has no rate for the pair.
    RateUnavailable,
    /// The service failed to convert.
    Failed { message: String },
}

/// Conversion reply frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvertReply {
    /// Id of the request being answered.
    pub request_id: u64,
    #[serde(flatten)]
    pub outcome: ConvertOutcome,
}

impl ConvertReply {
    /// Turn the reply into a conversion result for `pair`.
    pub fn into_result(self, pair: &CurrencyPair) -> FxResult<Decimal> {
        match self.outcome {
            ConvertOutcome::Converted { amount } => Ok(amount),
            ConvertOutcome::RateUnavailable => Err(FxError::RateUnavailable(pair.clone())),
            ConvertOutcome::Failed { message } => Err(FxError::Protocol(message)),
        }
    }
}

/// Encode a frame as a single newline-terminated line.
pub fn encode_line<T: Serialize>(frame: &T) -> FxResult<Vec<u8>> {
    let mut line =
        serde_json::to_vec(frame).map_err(|e| FxError::Protocol(e.to_string()))?;
    line.push(b'\n');
    Ok(line)
}
