//! Binance diff-depth WebSocket feed.

use std::time::Duration;

use connector_core::{ConnectorConfig, DepthFeed, DepthStream, DepthStreamSender, FeedError};
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

use crate::parser::{parse_message, ParsedMessage};

/// Timeout for WebSocket connection attempts.
const CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Opens one `<symbol>@depth@<speed>ms` connection per stream.
///
/// The feed never reconnects. When the socket drops the stream ends and
/// the subscriber is expected to start over from a fresh snapshot.
#[derive(Debug, Clone)]
pub struct BinanceDepthFeed {
    ws_base_url: String,
    update_speed_ms: u32,
    channel_capacity: usize,
}

impl BinanceDepthFeed {
    pub fn new(config: &ConnectorConfig) -> Self {
        Self::with_base_url(
            config.environment.ws_base_url(),
            config.depth_update_speed_ms,
            config.channel_capacity,
        )
    }

    pub fn with_base_url(ws_base_url: &str, update_speed_ms: u32, channel_capacity: usize) -> Self {
        Self {
            ws_base_url: ws_base_url.trim_end_matches('/').to_string(),
            update_speed_ms,
            channel_capacity,
        }
    }

    /// Raw stream URL for `symbol`.
    ///
    /// Binance only publishes `100ms` and `1000ms` cadences; anything else
    /// is rounded to the nearer of the two.
    pub fn stream_url(&self, symbol: &str) -> String {
        let speed = if self.update_speed_ms >= 550 { 1000 } else { 100 };
        format!(
            "{}/ws/{}@depth@{}ms",
            self.ws_base_url,
            symbol.to_lowercase(),
            speed
        )
    }
}

impl DepthFeed for BinanceDepthFeed {
    /// Spawns the socket task; must be called inside a tokio runtime.
    fn open(&self, symbol: &str) -> DepthStream {
        let (sender, stream) = DepthStream::channel(self.channel_capacity);
        tokio::spawn(run_session(
            self.stream_url(symbol),
            symbol.to_uppercase(),
            sender,
        ));
        stream
    }
}

/// Result of a connection attempt.
enum ConnectResult {
    Connected(Box<WsStream>),
    Cancelled,
    Error(String),
}

/// Connect with timeout, giving up early if the consumer cancels.
async fn connect_with_timeout(url: &str, sender: &mut DepthStreamSender) -> ConnectResult {
    tokio::select! {
        biased;

        _ = sender.cancelled() => ConnectResult::Cancelled,

        result = tokio::time::timeout(CONNECTION_TIMEOUT, connect_async(url)) => match result {
            Ok(Ok((stream, _))) => ConnectResult::Connected(Box::new(stream)),
            Ok(Err(e)) => ConnectResult::Error(format!("websocket connect failed: {e}")),
            Err(_) => ConnectResult::Error("websocket connection timeout".to_string()),
        },
    }
}

/// Run one WebSocket connection for the lifetime of a [`DepthStream`].
///
/// Returning drops `sender`, which ends the consumer's stream.
async fn run_session(url: String, symbol: String, mut sender: DepthStreamSender) {
    info!(url = %url, symbol = %symbol, "Connecting to Binance depth stream");

    let ws_stream = match connect_with_timeout(&url, &mut sender).await {
        ConnectResult::Connected(stream) => stream,
        ConnectResult::Cancelled => return,
        ConnectResult::Error(message) => {
            warn!(symbol = %symbol, error = %message, "Failed to connect depth stream");
            sender.send(Err(FeedError::Transport(message))).await;
            return;
        }
    };

    info!(symbol = %symbol, "Connected to Binance depth stream");
    let connected_at = std::time::Instant::now();
    let (mut write, mut read) = (*ws_stream).split();

    loop {
        tokio::select! {
            biased;

            _ = sender.cancelled() => {
                debug!(symbol = %symbol, "Depth stream cancelled, closing connection");
                let _ = write.close().await;
                return;
            }

            msg_opt = read.next() => {
                let msg = match msg_opt {
                    Some(Ok(m)) => m,
                    Some(Err(e)) => {
                        warn!(symbol = %symbol, error = %e, "WebSocket error, ending depth stream");
                        return;
                    }
                    None => {
                        info!(
                            symbol = %symbol,
                            connected_secs = connected_at.elapsed().as_secs(),
                            "WebSocket stream ended"
                        );
                        return;
                    }
                };

                match msg {
                    Message::Text(text) => match parse_message(&text) {
                        Ok(ParsedMessage::DepthUpdate(update)) => {
                            if !sender.send(Ok(update)).await {
                                debug!(symbol = %symbol, "Receiver gone, stopping depth stream");
                                let _ = write.close().await;
                                return;
                            }
                        }
                        Ok(ParsedMessage::Unknown) => {}
                        Err(e) => {
                            error!(symbol = %symbol, error = %e, "Failed to decode depth message");
                            sender.send(Err(e.into())).await;
                            let _ = write.close().await;
                            return;
                        }
                    },
                    Message::Ping(data) => {
                        debug!("Received Ping, sending Pong");
                        if let Err(e) = write.send(Message::Pong(data)).await {
                            warn!(symbol = %symbol, error = %e, "Failed to send Pong");
                            return;
                        }
                    }
                    Message::Close(_) => {
                        info!(symbol = %symbol, "WebSocket closed by server");
                        return;
                    }
                    _ => {}
                }
            }
        }
    }
}
