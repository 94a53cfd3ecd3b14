//! BTCUSD minute-bar streaming recorder.
//!
//! Wires the components together:
//! - Polygon crypto WebSocket feed (`barstream-feed`)
//! - Stream consumer feeding the bar buffer
//! - Buffered daily CSV files (`barstream-persistence`)
//! - Fixed-delay reconnect loop
//! - Shutdown flush on Ctrl-C or fatal error

pub mod app;
pub mod config;
pub mod consumer;
pub mod error;
pub mod reconnect;

#[cfg(test)]
pub(crate) mod testing;

pub use app::Application;
pub use config::AppConfig;
pub use consumer::{consume, ConsumeOutcome};
pub use error::{AppError, AppResult};
pub use reconnect::{LoopState, ReconnectLoop, RECONNECT_DELAY};
