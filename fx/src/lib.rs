//! Fundsline Conversion Gateway
//!
//! Converts amounts between currencies through an external rate service.
//!
//! # Strategies
//!
//! - [`StreamConverter`]: one long-lived connection, requests multiplexed
//!   by id over newline-delimited JSON frames
//! - [`HttpConverter`]: fetches a bearer token, then performs a blocking
//!   request/response call
//!
//! The strategy is picked once from [`GatewayConfig`].
//!
//! # Example
//!
//! ```rust,ignore
//! use fundsline_fx::{ConversionGateway, GatewayConfig};
//! use fundsline_common::Currency;
//!
//! let gateway = ConversionGateway::connect(&GatewayConfig::from_env()).await?;
//! let eur = gateway.convert(&Currency::usd(), &Currency::eur(), amount).await?;
//! ```

pub mod config;
pub mod converter;
pub mod desk;
pub mod error;
pub mod gateway;
pub mod http;
pub mod stream;
pub mod wire;

pub use config::{ConverterStrategy, GatewayConfig};
pub use converter::CurrencyConverter;
pub use desk::RateDesk;
pub use error::{FxError, FxResult};
pub use gateway::{ConversionGateway, GatewayStatsSnapshot};
pub use http::{HttpConverter, OAuthTokenClient, TokenProvider};
pub use stream::StreamConverter;
