//! Polygon WebSocket message types.
//!
//! Server frames are JSON arrays of events tagged by `ev`:
//! - `status`: connection/auth/subscription lifecycle
//! - `XA`: crypto per-minute aggregate
//!
//! Client messages are `{"action": ..., "params": ...}` objects.

use crate::error::{FeedError, FeedResult};
use barstream_core::BarRecord;
use chrono::{DateTime, SecondsFormat};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// Client actions (Outgoing)
// ============================================================================

/// Client action sent to the Polygon socket.
#[derive(Debug, Clone, Serialize)]
pub struct ClientAction {
    pub action: String,
    pub params: String,
}

impl ClientAction {
    /// Authenticate with an API key.
    pub fn auth(api_key: &str) -> Self {
        Self {
            action: "auth".to_string(),
            params: api_key.to_string(),
        }
    }

    /// Subscribe to per-minute aggregates for a crypto pair (e.g. "BTC-USD").
    pub fn subscribe_minute_aggregates(pair: &str) -> Self {
        Self {
            action: "subscribe".to_string(),
            params: format!("XA.{pair}"),
        }
    }
}

// ============================================================================
// Server events (Incoming)
// ============================================================================

/// Status event (`ev: "status"`).
#[derive(Debug, Clone, Deserialize)]
pub struct StatusEvent {
    /// e.g. "connected", "auth_success", "auth_failed", "success".
    pub status: String,
    #[serde(default)]
    pub message: String,
}

impl StatusEvent {
    pub fn is_connected(&self) -> bool {
        self.status == "connected"
    }

    pub fn is_auth_success(&self) -> bool {
        self.status == "auth_success"
    }

    pub fn is_auth_failed(&self) -> bool {
        self.status == "auth_failed"
    }
}

/// Crypto per-minute aggregate (`ev: "XA"`).
#[derive(Debug, Clone, Deserialize)]
pub struct CryptoAggregate {
    /// Crypto pair, e.g. "BTC-USD".
    pub pair: String,
    #[serde(rename = "o")]
    pub open: f64,
    #[serde(rename = "h")]
    pub high: f64,
    #[serde(rename = "l")]
    pub low: f64,
    #[serde(rename = "c")]
    pub close: f64,
    #[serde(rename = "v")]
    pub volume: f64,
    /// Volume weighted average price.
    #[serde(rename = "vw", default)]
    pub vwap: Option<f64>,
    /// Number of trades in the window.
    #[serde(rename = "z", default)]
    pub trades: Option<u64>,
    /// Window start (Unix ms).
    #[serde(rename = "s")]
    pub start_ms: i64,
    /// Window end (Unix ms).
    #[serde(rename = "e")]
    pub end_ms: i64,
}

impl CryptoAggregate {
    /// Convert to a bar record for `symbol`.
    ///
    /// Field order: symbol, timestamp, open, high, low, close, volume,
    /// vwap, trades (when present), start_ms, end_ms.
    pub fn to_bar_record(&self, symbol: &str) -> BarRecord {
        let timestamp = DateTime::from_timestamp_millis(self.start_ms)
            .map(|t| Value::String(t.to_rfc3339_opts(SecondsFormat::Secs, true)))
            .unwrap_or(Value::Null);

        let mut bar = BarRecord::new()
            .with("symbol", symbol)
            .with("timestamp", timestamp)
            .with("open", self.open)
            .with("high", self.high)
            .with("low", self.low)
            .with("close", self.close)
            .with("volume", self.volume)
            .with("vwap", self.vwap);

        if let Some(trades) = self.trades {
            bar.insert("trades", trades);
        }

        bar.with("start_ms", self.start_ms)
            .with("end_ms", self.end_ms)
    }
}

/// A single server event.
#[derive(Debug, Clone)]
pub enum PolygonEvent {
    Status(StatusEvent),
    Aggregate(CryptoAggregate),
    /// Any other event type, by its `ev` tag.
    Other(String),
}

impl PolygonEvent {
    /// Classify one event object by its `ev` tag.
    pub fn from_value(value: Value) -> FeedResult<Self> {
        let ev = value
            .get("ev")
            .and_then(Value::as_str)
            .ok_or_else(|| FeedError::ParseError(format!("event without ev tag: {value}")))?
            .to_string();

        match ev.as_str() {
            "status" => Ok(Self::Status(serde_json::from_value(value)?)),
            "XA" => Ok(Self::Aggregate(serde_json::from_value(value)?)),
            _ => Ok(Self::Other(ev)),
        }
    }
}

/// Split a text frame into its event objects.
///
/// Polygon sends arrays; a bare object is accepted as a one-event frame.
pub fn parse_frame(text: &str) -> FeedResult<Vec<Value>> {
    match serde_json::from_str::<Value>(text)? {
        Value::Array(events) => Ok(events),
        obj @ Value::Object(_) => Ok(vec![obj]),
        other => Err(FeedError::ParseError(format!(
            "unexpected frame shape: {other}"
        ))),
    }
}
