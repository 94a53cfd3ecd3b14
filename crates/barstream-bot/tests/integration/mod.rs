//! Integration tests for barstream-bot.
//!
//! These tests verify the interaction between components:
//! - Polygon handshake and bar streaming
//! - Reconnection after server-side disconnects
//! - Shutdown flush to the daily CSV file

pub mod common;
