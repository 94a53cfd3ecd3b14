//! Fixed-delay reconnect loop.
//!
//! Two states:
//! - `Running`: a consumption attempt is in progress
//! - `Waiting`: sleeping for the fixed delay before the next attempt
//!
//! Every attempt end (stream error or clean close) moves to `Waiting`; the
//! delay always moves back to `Running`. No backoff, no attempt cap.

use crate::consumer::consume;
use crate::error::AppResult;
use barstream_feed::BarSource;
use barstream_persistence::CsvBarWriter;
use parking_lot::RwLock;
use std::convert::Infallible;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Delay between a failed attempt and the next one.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Reconnect loop state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Waiting,
}

/// Retries the stream consumer forever with a fixed delay.
#[derive(Debug, Clone)]
pub struct ReconnectLoop {
    delay: Duration,
    state: Arc<RwLock<LoopState>>,
    attempts: Arc<AtomicU64>,
}

impl Default for ReconnectLoop {
    fn default() -> Self {
        Self::new(RECONNECT_DELAY)
    }
}

impl ReconnectLoop {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            state: Arc::new(RwLock::new(LoopState::Waiting)),
            attempts: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Current state. Clones of this loop observe the same state.
    pub fn state(&self) -> LoopState {
        *self.state.read()
    }

    /// Consumption attempts started so far.
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Run forever. Only returns if the loop itself fails, which the
    /// retry guard does not allow; callers still handle it as fatal.
    pub async fn run(
        &self,
        source: &dyn BarSource,
        symbol: &str,
        writer: &mut CsvBarWriter,
    ) -> AppResult<Infallible> {
        loop {
            *self.state.write() = LoopState::Running;
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
            info!(attempt, symbol, "Starting stream consumption");

            match consume(source, symbol, writer).await {
                Ok(outcome) => {
                    warn!(
                        attempt,
                        records = outcome.records,
                        flushes = outcome.flushes,
                        "Stream ended"
                    );
                }
                Err(e) => {
                    error!(?e, attempt, buffered = writer.len(), "Error in main loop");
                }
            }

            *self.state.write() = LoopState::Waiting;
            info!(delay_ms = self.delay.as_millis() as u64, "Reconnecting after delay");
            tokio::time::sleep(self.delay).await;
        }
    }
}
