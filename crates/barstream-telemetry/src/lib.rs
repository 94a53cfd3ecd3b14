//! Structured logging for the BTCUSD bar recorder.
//!
//! - Timestamped human-readable lines in development
//! - JSON lines when `RUST_ENV=production`
//! - `RUST_LOG` overrides the default `info` filter

pub mod error;
pub mod logging;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{init_logging, DEFAULT_FILTER};
