//! Stream consumer.
//!
//! Pulls bars from a `BarSource` into the writer's buffer. A failure while
//! handling one bar is logged and consumption continues; a stream-level
//! failure ends the attempt and is returned to the caller.

use barstream_feed::{BarSource, FeedResult};
use barstream_persistence::CsvBarWriter;
use futures_util::StreamExt;
use tracing::{debug, error};

/// Counters for one consumption attempt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumeOutcome {
    /// Bars received.
    pub records: usize,
    /// Automatic threshold flushes that succeeded.
    pub flushes: usize,
}

/// Consume minute bars for `symbol` until the stream ends or fails.
///
/// Returns `Ok` when the provider ended the stream cleanly and the stream
/// error otherwise. Buffered bars are not flushed on either exit.
pub async fn consume(
    source: &dyn BarSource,
    symbol: &str,
    writer: &mut CsvBarWriter,
) -> FeedResult<ConsumeOutcome> {
    let mut stream = source.stream_minute_bars(symbol);
    let mut outcome = ConsumeOutcome::default();

    while let Some(item) = stream.next().await {
        let bar = match item {
            Ok(bar) => bar,
            Err(e) => {
                error!(?e, records = outcome.records, "Stream error");
                return Err(e);
            }
        };

        outcome.records += 1;

        match writer.push(bar) {
            Ok(Some(count)) => {
                outcome.flushes += 1;
                debug!(count, "Threshold flush");
            }
            Ok(None) => {}
            Err(e) => error!(?e, buffered = writer.len(), "Error processing bar"),
        }
    }

    Ok(outcome)
}
