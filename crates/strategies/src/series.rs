use alphabot_core::{Candle, Timestamp, Trace};
use alphabot_indicators::{Hlc, Ohlc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Which candle value feeds the single-series indicators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceMethod {
    #[default]
    Close,
    /// (high + low) / 2
    Hl2,
    /// (high + low + close) / 3
    Hlc3,
    /// (open + high + low + close) / 4
    Ohlc4,
}

impl PriceMethod {
    pub fn price(&self, candle: &Candle) -> Decimal {
        match self {
            PriceMethod::Close => candle.close,
            PriceMethod::Hl2 => (candle.high + candle.low) / Decimal::TWO,
            PriceMethod::Hlc3 => (candle.high + candle.low + candle.close) / Decimal::from(3),
            PriceMethod::Ohlc4 => {
                (candle.open + candle.high + candle.low + candle.close) / Decimal::from(4)
            }
        }
    }
}

/// Price view of the current candle window, oldest first.
#[derive(Debug, Clone, Default)]
pub struct PriceSeries {
    method: PriceMethod,
    pub timestamp: Vec<Timestamp>,
    pub open: Vec<Decimal>,
    pub high: Vec<Decimal>,
    pub low: Vec<Decimal>,
    pub close: Vec<Decimal>,
    pub prices: Vec<Decimal>,
    last_timestamp: Option<Timestamp>,
}

impl PriceSeries {
    pub fn new(method: PriceMethod) -> Self {
        Self {
            method,
            ..Default::default()
        }
    }

    /// Rebuild the series from `candles`, keeping the ones up to `last_timestamp`.
    pub fn compute(&mut self, last_timestamp: Timestamp, candles: &[Candle]) -> &[Decimal] {
        self.timestamp.clear();
        self.open.clear();
        self.high.clear();
        self.low.clear();
        self.close.clear();
        self.prices.clear();

        for candle in candles.iter().filter(|c| c.timestamp <= last_timestamp) {
            self.timestamp.push(candle.timestamp);
            self.open.push(candle.open);
            self.high.push(candle.high);
            self.low.push(candle.low);
            self.close.push(candle.close);
            self.prices.push(self.method.price(candle));
        }
        self.last_timestamp = Some(last_timestamp);

        &self.prices
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    pub fn last_timestamp(&self) -> Option<Timestamp> {
        self.last_timestamp
    }

    pub fn last_close(&self) -> Option<Decimal> {
        self.close.last().copied()
    }

    /// `(timestamp, price)` samples for single-series indicators.
    pub fn samples(&self) -> impl Iterator<Item = (Timestamp, Decimal)> + '_ {
        self.timestamp.iter().copied().zip(self.prices.iter().copied())
    }

    pub fn hlc_samples(&self) -> impl Iterator<Item = (Timestamp, Hlc)> + '_ {
        (0..self.len()).map(|i| {
            (
                self.timestamp[i],
                Hlc {
                    high: self.high[i],
                    low: self.low[i],
                    close: self.close[i],
                },
            )
        })
    }

    pub fn ohlc_samples(&self) -> impl Iterator<Item = (Timestamp, Ohlc)> + '_ {
        (0..self.len()).map(|i| (self.timestamp[i], self.ohlc(i)))
    }

    pub fn ohlc(&self, index: usize) -> Ohlc {
        Ohlc {
            open: self.open[index],
            high: self.high[index],
            low: self.low[index],
            close: self.close[index],
        }
    }

    pub fn trace(&self) -> Trace {
        let n = self.prices.len();
        Trace {
            last: self.prices.last().copied(),
            prev: n.checked_sub(2).map(|i| self.prices[i]),
        }
    }
}

/// Volume view of the current candle window, oldest first.
#[derive(Debug, Clone, Default)]
pub struct VolumeSeries {
    pub timestamp: Vec<Timestamp>,
    pub volumes: Vec<Decimal>,
}

impl VolumeSeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn compute(&mut self, last_timestamp: Timestamp, candles: &[Candle]) -> &[Decimal] {
        self.timestamp.clear();
        self.volumes.clear();
        for candle in candles.iter().filter(|c| c.timestamp <= last_timestamp) {
            self.timestamp.push(candle.timestamp);
            self.volumes.push(candle.volume);
        }
        &self.volumes
    }

    pub fn len(&self) -> usize {
        self.volumes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.volumes.is_empty()
    }
}
