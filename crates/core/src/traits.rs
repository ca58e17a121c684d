use crate::models::*;

// ---------------------------------------------------------------------------
// Candle Source Trait
// ---------------------------------------------------------------------------

/// Read access to the candles of an instrument, ordered most-recent-last.
///
/// Implementations hold already materialized data; none of these calls block.
pub trait CandleSource {
    /// Every candle of `timeframe` whose timestamp is at or after `from`.
    fn candles_from(&self, timeframe: i64, from: Timestamp) -> Vec<Candle>;

    /// The `depth` most recent candles of `timeframe` (fewer if not available).
    fn last_candles(&self, timeframe: i64, depth: usize) -> Vec<Candle>;
}

impl<T: CandleSource + ?Sized> CandleSource for &T {
    fn candles_from(&self, timeframe: i64, from: Timestamp) -> Vec<Candle> {
        (**self).candles_from(timeframe, from)
    }

    fn last_candles(&self, timeframe: i64, depth: usize) -> Vec<Candle> {
        (**self).last_candles(timeframe, depth)
    }
}

// ---------------------------------------------------------------------------
// Data Errors
// ---------------------------------------------------------------------------

/// Errors that can occur while loading or storing market data.
#[derive(Debug, thiserror::Error)]
pub enum DataError {
    #[error("Data not found: {0}")]
    NotFound(String),
    #[error("Parse error: {0}")]
    ParseError(String),
    #[error("Out of order candle: {timestamp} is before {last}")]
    OutOfOrder { timestamp: Timestamp, last: Timestamp },
    #[error("Candle {0} is already closed")]
    CandleClosed(Timestamp),
}
