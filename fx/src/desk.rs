//! Reference rate desk serving the conversion stream protocol.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use dashmap::DashMap;
use fundsline_common::{Currency, CurrencyPair};
use rust_decimal::Decimal;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use crate::error::{FxError, FxResult};
use crate::wire::{encode_line, ConvertFrame, ConvertOutcome, ConvertReply};

/// In-memory rate table answering conversion frames.
#[derive(Default)]
pub struct RateDesk {
    rates: DashMap<CurrencyPair, Decimal>,
}

impl RateDesk {
    /// Create an empty desk.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the rate for converting one unit of `from` into `to`.
    pub fn set_rate(&self, from: Currency, to: Currency, rate: Decimal) {
        self.rates.insert(CurrencyPair::new(from, to), rate);
    }

    /// Remove a quoted rate.
    pub fn remove_rate(&self, from: Currency, to: Currency) {
        self.rates.remove(&CurrencyPair::new(from, to));
    }

    /// Get the rate for a pair, falling back to the inverse quote.
    pub fn rate(&self, pair: &CurrencyPair) -> Option<Decimal> {
        if pair.is_identity() {
            return Some(Decimal::ONE);
        }
        if let Some(rate) = self.rates.get(pair) {
            return Some(*rate);
        }
        self.rates
            .get(&pair.inverse())
            .filter(|inverse| !inverse.is_zero())
            .map(|inverse| Decimal::ONE / *inverse)
    }

    /// Answer a single conversion frame.
    pub fn answer(&self, frame: &ConvertFrame) -> ConvertReply {
        let outcome = match self.rate(&frame.pair()) {
            Some(rate) => match frame.amount.checked_mul(rate) {
                Some(amount) => ConvertOutcome::Converted { amount },
                None => ConvertOutcome::Failed {
                    message: "amount overflow".to_string(),
                },
            },
            None => ConvertOutcome::RateUnavailable,
        };

        ConvertReply {
            request_id: frame.request_id,
            outcome,
        }
    }

    /// Bind a listener and serve in the background. Returns the bound address.
    pub async fn spawn(self: Arc<Self>, addr: &str) -> io::Result<SocketAddr> {
        let listener = TcpListener::bind(addr).await?;
        let local = listener.local_addr()?;
        tokio::spawn(async move {
            if let Err(e) = self.serve(listener).await {
                warn!(error = %e, "Rate desk stopped");
            }
        });
        Ok(local)
    }

    /// Accept connections until the listener fails.
    pub async fn serve(self: Arc<Self>, listener: TcpListener) -> io::Result<()> {
        info!(addr = %listener.local_addr()?, "Rate desk listening");
        loop {
            let (socket, peer) = listener.accept().await?;
            let desk = self.clone();
            tokio::spawn(async move {
                if let Err(e) = desk.handle_connection(socket).await {
                    warn!(peer = %peer, error = %e, "Rate desk connection failed");
                }
            });
        }
    }

    async fn handle_connection(&self, socket: TcpStream) -> FxResult<()> {
        let (read_half, mut write_half) = socket.into_split();
        let mut lines = BufReader::new(read_half).lines();

        while let Some(line) = lines
            .next_line()
            .await
            .map_err(|e| FxError::Transport(e.to_string()))?
        {
            let frame: ConvertFrame = match serde_json::from_str(&line) {
                Ok(frame) => frame,
                Err(e) => {
                    warn!(error = %e, "Ignoring malformed conversion frame");
                    continue;
                }
            };

            let reply = self.answer(&frame);
            debug!(request_id = frame.request_id, pair = %frame.pair(), "Answered conversion");
            write_half
                .write_all(&encode_line(&reply)?)
                .await
                .map_err(|e| FxError::Transport(e.to_string()))?;
        }

        Ok(())
    }
}
