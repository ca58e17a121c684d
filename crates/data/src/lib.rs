pub mod csv_loader;

use alphabot_core::{Candle, CandleSource, DataError, Timestamp};
use std::collections::BTreeMap;

/// In-memory candle series of one instrument, one per timeframe.
///
/// Timestamps only move forward. The last candle of a series may be replaced while
/// it is still open; closed candles never change.
#[derive(Debug, Clone, Default)]
pub struct CandleStore {
    series: BTreeMap<i64, Vec<Candle>>,
    /// Candles kept per timeframe, oldest dropped first. `None` keeps everything.
    max_len: Option<usize>,
}

impl CandleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_len(max_len: usize) -> Self {
        Self {
            series: BTreeMap::new(),
            max_len: Some(max_len.max(1)),
        }
    }

    /// Append a candle, or update the open candle carrying the same timestamp.
    pub fn push(&mut self, timeframe: i64, candle: Candle) -> Result<(), DataError> {
        let series = self.series.entry(timeframe).or_default();

        if let Some(last) = series.last_mut() {
            if candle.timestamp < last.timestamp {
                return Err(DataError::OutOfOrder {
                    timestamp: candle.timestamp,
                    last: last.timestamp,
                });
            }
            if candle.timestamp == last.timestamp {
                if last.ended {
                    return Err(DataError::CandleClosed(candle.timestamp));
                }
                *last = candle;
                return Ok(());
            }
        }

        series.push(candle);
        if let Some(max_len) = self.max_len {
            if series.len() > max_len {
                let excess = series.len() - max_len;
                series.drain(..excess);
            }
        }
        Ok(())
    }

    /// Push every candle in order, stopping at the first rejected one.
    pub fn extend(
        &mut self,
        timeframe: i64,
        candles: impl IntoIterator<Item = Candle>,
    ) -> Result<(), DataError> {
        candles
            .into_iter()
            .try_for_each(|candle| self.push(timeframe, candle))
    }

    pub fn last(&self, timeframe: i64) -> Option<&Candle> {
        self.series.get(&timeframe).and_then(|s| s.last())
    }

    pub fn len(&self, timeframe: i64) -> usize {
        self.series.get(&timeframe).map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.series.values().all(Vec::is_empty)
    }

    pub fn timeframes(&self) -> impl Iterator<Item = i64> + '_ {
        self.series.keys().copied()
    }
}

impl CandleSource for CandleStore {
    fn candles_from(&self, timeframe: i64, from: Timestamp) -> Vec<Candle> {
        let Some(series) = self.series.get(&timeframe) else {
            return Vec::new();
        };
        let start = series.partition_point(|c| c.timestamp < from);
        series[start..].to_vec()
    }

    fn last_candles(&self, timeframe: i64, depth: usize) -> Vec<Candle> {
        let Some(series) = self.series.get(&timeframe) else {
            return Vec::new();
        };
        let start = series.len().saturating_sub(depth);
        series[start..].to_vec()
    }
}
