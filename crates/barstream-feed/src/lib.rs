//! Market-data connector for the BTCUSD bar recorder.
//!
//! Provides:
//! - `BarSource`: the seam the recorder pulls bars through
//! - `PolygonConnector`: Polygon.io crypto WebSocket (auth, subscribe, `XA` minute aggregates)
//! - Polygon message types and frame parsing

pub mod connector;
pub mod error;
pub mod message;

pub use connector::{
    pair_for_symbol, BarSource, BarStream, ConnectorConfig, PolygonConnector, DEFAULT_API_KEY_ENV,
    DEFAULT_WS_URL,
};
pub use error::{FeedError, FeedResult};
pub use message::{ClientAction, CryptoAggregate, PolygonEvent, StatusEvent};

use std::sync::Once;

static INIT_CRYPTO: Once = Once::new();

/// Install ring as the process-wide rustls crypto provider used for `wss://`.
/// Must be called before any WebSocket connections are made.
pub fn init_crypto() {
    INIT_CRYPTO.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}
