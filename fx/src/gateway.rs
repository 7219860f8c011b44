//! Conversion gateway: strategy selection, rounding and result checks.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use fundsline_common::{Currency, CurrencyPair};
use rust_decimal::Decimal;
use tracing::{info, instrument, warn};

use crate::config::{ConverterStrategy, GatewayConfig};
use crate::converter::CurrencyConverter;
use crate::error::{FxError, FxResult};
use crate::http::{HttpConverter, OAuthTokenClient};
use crate::stream::StreamConverter;

/// Single entry point for currency conversion.
///
/// The transport is chosen once, when the gateway is built.
pub struct ConversionGateway {
    converter: Arc<dyn CurrencyConverter>,
    stats: GatewayStats,
}

impl ConversionGateway {
    /// Build the gateway for the configured strategy.
    pub async fn connect(config: &GatewayConfig) -> FxResult<Self> {
        let converter: Arc<dyn CurrencyConverter> = match config.strategy {
            ConverterStrategy::Stream => Arc::new(
                StreamConverter::connect(&config.stream_addr, config.request_timeout).await?,
            ),
            ConverterStrategy::RequestResponse => {
                let tokens = Arc::new(OAuthTokenClient::new(
                    config.token_url.clone(),
                    config.request_timeout,
                )?);
                Arc::new(HttpConverter::new(
                    config.converter_url.clone(),
                    config.resource_id.clone(),
                    config.client_secret.clone(),
                    config.request_timeout,
                    tokens,
                )?)
            }
        };

        info!(strategy = converter.name(), "Conversion gateway ready");
        Ok(Self::with_converter(converter))
    }

    /// Build the gateway around an existing converter.
    pub fn with_converter(converter: Arc<dyn CurrencyConverter>) -> Self {
        Self {
            converter,
            stats: GatewayStats::default(),
        }
    }

    /// Name of the active transport.
    pub fn strategy(&self) -> &str {
        self.converter.name()
    }

    /// Convert `amount` from one currency into another.
    ///
    /// The result is rounded half-to-even to the target currency's minor units.
    #[instrument(skip(self), fields(strategy = self.converter.name()))]
    pub async fn convert(&self, from: &Currency, to: &Currency, amount: Decimal) -> FxResult<Decimal> {
        let pair = CurrencyPair::new(from.clone(), to.clone());
        if pair.is_identity() {
            return Ok(amount);
        }

        self.stats.requested.fetch_add(1, Ordering::Relaxed);

        let raw = match self.converter.convert(&pair, amount).await {
            Ok(raw) => raw,
            Err(e) => {
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                warn!(pair = %pair, error = %e, "Conversion failed");
                return Err(e);
            }
        };

        if raw < Decimal::ZERO {
            self.stats.failed.fetch_add(1, Ordering::Relaxed);
            return Err(FxError::Protocol(format!(
                "negative conversion result {raw} for {pair}"
            )));
        }

        let converted = to.round(raw);
        info!(pair = %pair, amount = %amount, converted = %converted, "Conversion completed");
        Ok(converted)
    }

    /// Get gateway counters.
    pub fn stats(&self) -> GatewayStatsSnapshot {
        GatewayStatsSnapshot {
            requested: self.stats.requested.load(Ordering::Relaxed),
            failed: self.stats.failed.load(Ordering::Relaxed),
        }
    }
}

#[derive(Default)]
struct GatewayStats {
    requested: AtomicU64,
    failed: AtomicU64,
}

/// Point-in-time copy of gateway counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GatewayStatsSnapshot {
    pub requested: u64,
    pub failed: u64,
}
