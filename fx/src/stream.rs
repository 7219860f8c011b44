//! Long-lived streaming conversion transport.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use fundsline_common::CurrencyPair;
use rust_decimal::Decimal;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::converter::CurrencyConverter;
use crate::error::{FxError, FxResult};
use crate::wire::{encode_line, ConvertFrame, ConvertReply};

type PendingReplies = Arc<DashMap<u64, oneshot::Sender<ConvertReply>>>;

/// Converter multiplexing requests over one persistent connection.
pub struct StreamConverter {
    addr: String,
    outbound: mpsc::Sender<ConvertFrame>,
    pending: PendingReplies,
    next_request_id: AtomicU64,
    connected: Arc<AtomicBool>,
    timeout: Duration,
    tasks: Vec<JoinHandle<()>>,
}

impl StreamConverter {
    /// Connect to a streaming conversion endpoint.
    #[instrument(skip(timeout))]
    pub async fn connect(addr: &str, timeout: Duration) -> FxResult<Self> {
        let stream = tokio::time::timeout(timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| FxError::Timeout(timeout))?
            .map_err(|e| FxError::Transport(format!("connect {addr}: {e}")))?;
        stream
            .set_nodelay(true)
            .map_err(|e| FxError::Transport(e.to_string()))?;

        let (read_half, write_half) = stream.into_split();
        let (outbound, outbound_rx) = mpsc::channel(256);
        let pending: PendingReplies = Arc::new(DashMap::new());
        let connected = Arc::new(AtomicBool::new(true));

        let writer = tokio::spawn(write_loop(write_half, outbound_rx, connected.clone()));
        let reader = tokio::spawn(read_loop(read_half, pending.clone(), connected.clone()));

        info!(addr = %addr, "Conversion stream connected");

        Ok(Self {
            addr: addr.to_string(),
            outbound,
            pending,
            next_request_id: AtomicU64::new(1),
            connected,
            timeout,
            tasks: vec![writer, reader],
        })
    }

    /// Check if the stream is still open.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Number of requests waiting for a reply.
    pub fn in_flight(&self) -> usize {
        self.pending.len()
    }
}

#[async_trait]
impl CurrencyConverter for StreamConverter {
    fn name(&self) -> &str {
        "stream"
    }

    async fn convert(&self, pair: &CurrencyPair, amount: Decimal) -> FxResult<Decimal> {
        if !self.is_connected() {
            return Err(FxError::Transport(format!(
                "conversion stream to {} is closed",
                self.addr
            )));
        }

        let request_id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        let (reply_tx, reply_rx) = oneshot::channel();
        self.pending.insert(request_id, reply_tx);
        if !self.is_connected() {
            self.pending.remove(&request_id);
            return Err(FxError::Transport(format!(
                "conversion stream to {} is closed",
                self.addr
            )));
        }

        let frame = ConvertFrame {
            request_id,
            from: pair.base.clone(),
            to: pair.quote.clone(),
            amount,
        };

        if self.outbound.send(frame).await.is_err() {
            self.pending.remove(&request_id);
            return Err(FxError::Transport("conversion stream writer stopped".to_string()));
        }

        match tokio::time::timeout(self.timeout, reply_rx).await {
            Ok(Ok(reply)) => reply.into_result(pair),
            Ok(Err(_)) => Err(FxError::Transport(
                "conversion stream closed before reply".to_string(),
            )),
            Err(_) => {
                self.pending.remove(&request_id);
                warn!(request_id, pair = %pair, "Conversion reply timed out");
                Err(FxError::Timeout(self.timeout))
            }
        }
    }
}

impl Drop for StreamConverter {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

async fn write_loop(
    mut writer: OwnedWriteHalf,
    mut frames: mpsc::Receiver<ConvertFrame>,
    connected: Arc<AtomicBool>,
) {
    while let Some(frame) = frames.recv().await {
        let line = match encode_line(&frame) {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, "Dropping unencodable conversion frame");
                continue;
            }
        };

        if let Err(e) = writer.write_all(&line).await {
            warn!(error = %e, "Conversion stream write failed");
            break;
        }
    }
    connected.store(false, Ordering::Release);
}

async fn read_loop(reader: OwnedReadHalf, pending: PendingReplies, connected: Arc<AtomicBool>) {
    let mut lines = BufReader::new(reader).lines();

    loop {
        match lines.next_line().await {
            Ok(Some(line)) => match serde_json::from_str::<ConvertReply>(&line) {
                Ok(reply) => match pending.remove(&reply.request_id) {
                    Some((_, waiter)) => {
                        let _ = waiter.send(reply);
                    }
                    None => debug!(request_id = reply.request_id, "Late conversion reply"),
                },
                Err(e) => warn!(error = %e, "Malformed conversion reply"),
            },
            Ok(None) => {
                info!("Conversion stream closed by peer");
                break;
            }
            Err(e) => {
                warn!(error = %e, "Conversion stream read failed");
                break;
            }
        }
    }

    connected.store(false, Ordering::Release);
    // Dropping the senders wakes every waiter with a closed-channel error.
    pending.clear();
}
