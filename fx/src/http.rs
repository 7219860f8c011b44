//! Request/response conversion transport with bearer authentication.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use fundsline_common::CurrencyPair;
use reqwest::StatusCode;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::converter::CurrencyConverter;
use crate::error::{FxError, FxResult};

/// Authentication collaborator issuing bearer tokens.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Obtain an access token for the given client credentials.
    async fn obtain_token(&self, resource_id: &str, secret: &str) -> FxResult<String>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Token provider using the OAuth2 client-credentials grant.
pub struct OAuthTokenClient {
    client: reqwest::Client,
    token_url: String,
    timeout: Duration,
}

impl OAuthTokenClient {
    /// Create a client for the given token endpoint.
    pub fn new(token_url: impl Into<String>, timeout: Duration) -> FxResult<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            token_url: token_url.into(),
            timeout,
        })
    }
}

#[async_trait]
impl TokenProvider for OAuthTokenClient {
    #[instrument(skip(self, secret))]
    async fn obtain_token(&self, resource_id: &str, secret: &str) -> FxResult<String> {
        let response = self
            .client
            .post(&self.token_url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", resource_id),
                ("client_secret", secret),
            ])
            .send()
            .await
            .map_err(|e| transport_error(e, &self.timeout))?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = %status, "Token request rejected");
            return Err(FxError::Auth(format!("token endpoint returned {status}")));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| FxError::Auth(format!("unreadable token response: {e}")))?;

        Ok(token.access_token)
    }
}

#[derive(Debug, Deserialize)]
struct ConvertedAmount {
    amount: Decimal,
}

/// Converter issuing one authenticated HTTP call per conversion.
pub struct HttpConverter {
    client: reqwest::Client,
    converter_url: String,
    resource_id: String,
    client_secret: String,
    timeout: Duration,
    tokens: Arc<dyn TokenProvider>,
}

impl HttpConverter {
    /// Create a new request/response converter.
    pub fn new(
        converter_url: impl Into<String>,
        resource_id: impl Into<String>,
        client_secret: impl Into<String>,
        timeout: Duration,
        tokens: Arc<dyn TokenProvider>,
    ) -> FxResult<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            converter_url: converter_url.into().trim_end_matches('/').to_string(),
            resource_id: resource_id.into(),
            client_secret: client_secret.into(),
            timeout,
            tokens,
        })
    }
}

#[async_trait]
impl CurrencyConverter for HttpConverter {
    fn name(&self) -> &str {
        "request-response"
    }

    async fn convert(&self, pair: &CurrencyPair, amount: Decimal) -> FxResult<Decimal> {
        let token = self
            .tokens
            .obtain_token(&self.resource_id, &self.client_secret)
            .await?;

        let amount_param = amount.to_string();
        let response = self
            .client
            .get(format!("{}/api/v1/convert", self.converter_url))
            .bearer_auth(token)
            .query(&[
                ("from", pair.base.code()),
                ("to", pair.quote.code()),
                ("amount", amount_param.as_str()),
            ])
            .send()
            .await
            .map_err(|e| transport_error(e, &self.timeout))?;

        let status = response.status();
        debug!(status = %status, pair = %pair, "Conversion response received");

        match status {
            StatusCode::NOT_FOUND => return Err(FxError::RateUnavailable(pair.clone())),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(FxError::Auth(format!("converter returned {status}")))
            }
            s if !s.is_success() => {
                return Err(FxError::Transport(format!("converter returned {status}")))
            }
            _ => {}
        }

        let body: ConvertedAmount = response
            .json()
            .await
            .map_err(|e| FxError::Protocol(format!("unreadable conversion response: {e}")))?;

        Ok(body.amount)
    }
}

fn build_client(timeout: Duration) -> FxResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| FxError::Transport(e.to_string()))
}

fn transport_error(err: reqwest::Error, timeout: &Duration) -> FxError {
    if err.is_timeout() {
        FxError::Timeout(*timeout)
    } else {
        FxError::Transport(err.to_string())
    }
}
