//! Polygon crypto WebSocket connector.
//!
//! Exposes the provider as a lazy, pull-based stream of bars. Nothing
//! happens until the stream is first polled; the first poll connects,
//! authenticates and subscribes. Each item is either a bar or a terminal
//! error, after which the stream ends.

use crate::error::{FeedError, FeedResult};
use crate::message::{parse_frame, ClientAction, PolygonEvent, StatusEvent};
use barstream_core::BarRecord;
use futures_util::stream::{self, BoxStream};
use futures_util::{SinkExt, StreamExt};
use std::collections::VecDeque;
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async_tls_with_config, tungstenite::Message, MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, info, warn};

/// Polygon crypto cluster endpoint.
pub const DEFAULT_WS_URL: &str = "wss://socket.polygon.io/crypto";

/// Environment variable holding the Polygon API key.
pub const DEFAULT_API_KEY_ENV: &str = "POLYGON_API_KEY";

/// Quote currencies recognised when splitting a compact symbol into a pair.
const QUOTE_CURRENCIES: [&str; 7] = ["USDT", "USDC", "USD", "EUR", "GBP", "BTC", "ETH"];

/// Lazy stream of bars. An `Err` item is terminal.
pub type BarStream = BoxStream<'static, FeedResult<BarRecord>>;

/// Source of minute bars.
pub trait BarSource: Send + Sync {
    /// Open a lazy stream of minute bars for `symbol`.
    fn stream_minute_bars(&self, symbol: &str) -> BarStream;
}

/// Connector configuration.
#[derive(Clone)]
pub struct ConnectorConfig {
    /// WebSocket URL.
    pub url: String,
    /// Polygon API key.
    pub api_key: String,
}

impl std::fmt::Debug for ConnectorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectorConfig")
            .field("url", &self.url)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

/// Polygon.io crypto minute-aggregate connector.
#[derive(Debug, Clone)]
pub struct PolygonConnector {
    config: ConnectorConfig,
}

impl PolygonConnector {
    pub fn new(config: ConnectorConfig) -> Self {
        Self { config }
    }

    /// Build a connector reading the API key from `api_key_env`.
    pub fn from_env(url: &str, api_key_env: &str) -> FeedResult<Self> {
        let api_key = std::env::var(api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| FeedError::MissingApiKey(api_key_env.to_string()))?;

        Ok(Self::new(ConnectorConfig {
            url: url.to_string(),
            api_key,
        }))
    }

    pub fn url(&self) -> &str {
        &self.config.url
    }
}

impl BarSource for PolygonConnector {
    fn stream_minute_bars(&self, symbol: &str) -> BarStream {
        let state = StreamState::Pending {
            config: self.config.clone(),
            symbol: symbol.to_string(),
        };
        stream::unfold(state, next_bar).boxed()
    }
}

/// Map a compact symbol ("BTCUSD") to Polygon's pair notation ("BTC-USD").
///
/// Symbols already containing a dash, or with no recognised quote
/// currency, are returned unchanged.
pub fn pair_for_symbol(symbol: &str) -> String {
    let upper = symbol.to_ascii_uppercase();
    if upper.contains('-') {
        return upper;
    }

    QUOTE_CURRENCIES
        .iter()
        .find(|quote| upper.len() > quote.len() && upper.ends_with(*quote))
        .map(|quote| {
            let base = &upper[..upper.len() - quote.len()];
            format!("{base}-{quote}")
        })
        .unwrap_or(upper)
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

enum StreamState {
    /// Not connected yet (first poll connects).
    Pending {
        config: ConnectorConfig,
        symbol: String,
    },
    /// Subscribed; `pending` holds bars from a frame not yet yielded.
    Open {
        ws: Box<WsStream>,
        symbol: String,
        pending: VecDeque<BarRecord>,
    },
    Done,
}

async fn next_bar(mut state: StreamState) -> Option<(FeedResult<BarRecord>, StreamState)> {
    loop {
        state = match state {
            StreamState::Done => return None,
            StreamState::Pending { config, symbol } => {
                match open_session(&config, &symbol).await {
                    Ok(ws) => StreamState::Open {
                        ws: Box::new(ws),
                        symbol,
                        pending: VecDeque::new(),
                    },
                    Err(e) => return Some((Err(e), StreamState::Done)),
                }
            }
            StreamState::Open {
                mut ws,
                symbol,
                mut pending,
            } => {
                if let Some(bar) = pending.pop_front() {
                    return Some((Ok(bar), StreamState::Open { ws, symbol, pending }));
                }

                match read_bars(&mut ws, &symbol).await {
                    Ok(Some(bars)) => {
                        pending.extend(bars);
                        StreamState::Open { ws, symbol, pending }
                    }
                    Ok(None) => {
                        warn!("WebSocket stream ended");
                        return None;
                    }
                    Err(e) => return Some((Err(e), StreamState::Done)),
                }
            }
        };
    }
}

/// Connect, authenticate and subscribe to minute aggregates.
async fn open_session(config: &ConnectorConfig, symbol: &str) -> FeedResult<WsStream> {
    info!(url = %config.url, symbol, "Connecting to WebSocket");

    let (mut ws, _response) = connect_async_tls_with_config(&config.url, None, true, None)
        .await
        .map_err(|e| FeedError::ConnectionFailed(e.to_string()))?;

    wait_for_status(&mut ws, StatusEvent::is_connected).await?;
    debug!("WebSocket connected, authenticating");

    let auth = serde_json::to_string(&ClientAction::auth(&config.api_key))?;
    ws.send(Message::Text(auth)).await?;
    wait_for_status(&mut ws, StatusEvent::is_auth_success).await?;
    info!("Authenticated");

    let pair = pair_for_symbol(symbol);
    let subscribe = serde_json::to_string(&ClientAction::subscribe_minute_aggregates(&pair))?;
    ws.send(Message::Text(subscribe)).await?;
    info!(%pair, "Subscribed to minute aggregates");

    Ok(ws)
}

/// Read frames until a status event matching `expected` arrives.
async fn wait_for_status(
    ws: &mut WsStream,
    expected: fn(&StatusEvent) -> bool,
) -> FeedResult<()> {
    loop {
        let text = match ws.next().await {
            Some(Ok(Message::Text(text))) => text,
            Some(Ok(Message::Ping(data))) => {
                ws.send(Message::Pong(data)).await?;
                continue;
            }
            Some(Ok(Message::Close(frame))) => {
                let (code, reason) = frame
                    .map(|f| (f.code.into(), f.reason.to_string()))
                    .unwrap_or((1000, "Close during handshake".to_string()));
                warn!(code, %reason, "WebSocket closed during handshake");
                return Err(FeedError::ConnectionClosed { code, reason });
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(e.into()),
            None => {
                return Err(FeedError::ConnectionClosed {
                    code: 1006,
                    reason: "Stream ended during handshake".to_string(),
                })
            }
        };

        for value in parse_frame(&text)? {
            if let PolygonEvent::Status(status) = PolygonEvent::from_value(value)? {
                if status.is_auth_failed() {
                    return Err(FeedError::AuthFailed(status.message));
                }
                if expected(&status) {
                    return Ok(());
                }
                debug!(status = %status.status, message = %status.message, "Handshake status");
            }
        }
    }
}

/// Read one frame and convert its aggregates.
///
/// Returns `Ok(None)` when the stream ends, `Ok(Some(vec![]))` for frames
/// without bars. Malformed events are logged and skipped.
async fn read_bars(ws: &mut WsStream, symbol: &str) -> FeedResult<Option<Vec<BarRecord>>> {
    match ws.next().await {
        Some(Ok(Message::Text(text))) => Ok(Some(bars_from_frame(&text, symbol))),
        Some(Ok(Message::Ping(data))) => {
            debug!("Received ping, sending pong");
            ws.send(Message::Pong(data)).await?;
            Ok(Some(Vec::new()))
        }
        Some(Ok(Message::Close(frame))) => {
            let (code, reason) = frame
                .map(|f| (f.code.into(), f.reason.to_string()))
                .unwrap_or((1000, "Normal close".to_string()));
            warn!(code, %reason, "WebSocket closed by server");
            Err(FeedError::ConnectionClosed { code, reason })
        }
        Some(Ok(_)) => Ok(Some(Vec::new())),
        Some(Err(e)) => Err(e.into()),
        None => Ok(None),
    }
}

fn bars_from_frame(text: &str, symbol: &str) -> Vec<BarRecord> {
    let events = match parse_frame(text) {
        Ok(events) => events,
        Err(e) => {
            warn!(?e, "Dropping unparseable frame");
            return Vec::new();
        }
    };

    let mut bars = Vec::new();
    for value in events {
        match PolygonEvent::from_value(value) {
            Ok(PolygonEvent::Aggregate(agg)) => bars.push(agg.to_bar_record(symbol)),
            Ok(PolygonEvent::Status(status)) => {
                info!(status = %status.status, message = %status.message, "Status event");
            }
            Ok(PolygonEvent::Other(ev)) => debug!(%ev, "Ignoring event"),
            Err(e) => warn!(?e, "Skipping malformed event"),
        }
    }
    bars
}
