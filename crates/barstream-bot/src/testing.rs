//! Scripted bar sources for unit tests.

use barstream_core::BarRecord;
use barstream_feed::{BarSource, BarStream, FeedError, FeedResult};
use futures_util::StreamExt;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

pub fn bar(seq: usize) -> BarRecord {
    BarRecord::new()
        .with("symbol", "BTCUSD")
        .with("seq", seq as u64)
        .with("close", 42000.0 + seq as f64)
}

pub fn bars(range: std::ops::Range<usize>) -> Vec<FeedResult<BarRecord>> {
    range.map(|i| Ok(bar(i))).collect()
}

pub fn disconnect() -> FeedResult<BarRecord> {
    Err(FeedError::ConnectionClosed {
        code: 1006,
        reason: "connection reset".to_string(),
    })
}

/// Plays one script per `stream_minute_bars` call; once exhausted every
/// attempt fails immediately.
#[derive(Default)]
pub struct ScriptedSource {
    scripts: Mutex<VecDeque<Vec<FeedResult<BarRecord>>>>,
    calls: AtomicUsize,
}

impl ScriptedSource {
    pub fn new(scripts: Vec<Vec<FeedResult<BarRecord>>>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl BarSource for ScriptedSource {
    fn stream_minute_bars(&self, _symbol: &str) -> BarStream {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let items = self
            .scripts
            .lock()
            .pop_front()
            .unwrap_or_else(|| vec![Err(FeedError::ConnectionFailed("refused".to_string()))]);
        futures_util::stream::iter(items).boxed()
    }
}
