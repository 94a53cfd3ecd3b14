//! Buffered CSV persistence for streamed bars.
//!
//! Bars are held in memory and written in batches to one CSV file per
//! local calendar day for post-analysis in Python/Polars.

pub mod error;
pub mod writer;

pub use error::{PersistenceError, PersistenceResult};
pub use writer::{CsvBarWriter, FLUSH_THRESHOLD};
