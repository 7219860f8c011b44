//! Conversion gateway configuration.

use std::time::Duration;

/// Transport strategy used to reach the conversion service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConverterStrategy {
    /// Long-lived bidirectional stream.
    Stream,
    /// Token-authenticated request/response calls.
    RequestResponse,
}

/// Configuration for the conversion gateway.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Which transport to use. Fixed for the lifetime of the gateway.
    pub strategy: ConverterStrategy,
    /// Address of the streaming conversion endpoint.
    pub stream_addr: String,
    /// Base URL of the request/response conversion service.
    pub converter_url: String,
    /// Token endpoint of the authentication collaborator.
    pub token_url: String,
    /// Client id presented to the authentication collaborator.
    pub resource_id: String,
    /// Client secret presented to the authentication collaborator.
    pub client_secret: String,
    /// Timeout for a single conversion call.
    pub request_timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            strategy: ConverterStrategy::RequestResponse,
            stream_addr: "127.0.0.1:9401".to_string(),
            converter_url: "http://127.0.0.1:8081".to_string(),
            token_url: "http://127.0.0.1:8080/realms/fundsline/protocol/openid-connect/token"
                .to_string(),
            resource_id: "fundsline-accounts".to_string(),
            client_secret: String::new(),
            request_timeout: Duration::from_secs(5),
        }
    }
}

impl GatewayConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(flag) = std::env::var("FX_KEEP_STREAM_CONNECT") {
            config.strategy = if parse_flag(&flag) {
                ConverterStrategy::Stream
            } else {
                ConverterStrategy::RequestResponse
            };
        }

        if let Ok(addr) = std::env::var("FX_STREAM_ADDR") {
            config.stream_addr = addr;
        }

        if let Ok(url) = std::env::var("FX_CONVERTER_URL") {
            config.converter_url = url;
        }

        if let Ok(url) = std::env::var("FX_TOKEN_URL") {
            config.token_url = url;
        }

        if let Ok(id) = std::env::var("FX_RESOURCE_ID") {
            config.resource_id = id;
        }

        if let Ok(secret) = std::env::var("FX_CLIENT_SECRET") {
            config.client_secret = secret;
        }

        if let Ok(ms) = std::env::var("FX_REQUEST_TIMEOUT_MS") {
            if let Ok(ms) = ms.parse() {
                config.request_timeout = Duration::from_millis(ms);
            }
        }

        config
    }

    /// Use the streaming transport against the given address.
    pub fn stream(addr: impl Into<String>) -> Self {
        Self {
            strategy: ConverterStrategy::Stream,
            stream_addr: addr.into(),
            ..Default::default()
        }
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.request_timeout.is_zero() {
            return Err("Conversion timeout cannot be zero".to_string());
        }

        match self.strategy {
            ConverterStrategy::Stream => {
                if self.stream_addr.is_empty() {
                    return Err("Stream address cannot be empty".to_string());
                }
            }
            ConverterStrategy::RequestResponse => {
                if self.converter_url.is_empty() || self.token_url.is_empty() {
                    return Err("Converter and token URLs are required".to_string());
                }
                if self.resource_id.is_empty() || self.client_secret.is_empty() {
                    return Err("Resource id and client secret are required".to_string());
                }
            }
        }

        Ok(())
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
