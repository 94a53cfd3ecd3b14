//! Core domain types for the BTCUSD bar recorder.
//!
//! - `BarRecord`: one streamed bar, kept as an ordered field map
//! - `SYMBOL`: the single symbol this service records

pub mod bar;

pub use bar::{BarRecord, SYMBOL};
