pub mod atr;
pub mod bollinger;
pub mod ema;
pub mod pivot;
pub mod rsi;
pub mod sma;
pub mod tomdemark;
pub mod tracked;

use rust_decimal::Decimal;

pub use tracked::Tracked;

/// Trait for streaming (incremental) indicators over a single value series.
/// Feed one value at a time; the indicator maintains internal state.
pub trait Indicator: Send + Sync {
    /// Process the next value and return the indicator output (if ready).
    fn next(&mut self, value: Decimal) -> Option<Decimal>;

    /// Reset the indicator to its initial state.
    fn reset(&mut self);

    /// The minimum number of data points needed before the indicator produces output.
    fn period(&self) -> usize;

    /// Whether the indicator has enough data to produce output.
    fn is_ready(&self) -> bool;
}

/// Generalized streaming unit: any input shape, any output shape.
///
/// This is what [`Tracked`] drives. Implementations must be cheap to clone since
/// the tracked state keeps a committed copy and replays the open candle on a clone.
pub trait Streaming: Clone + Send + Sync {
    type Input: Copy;
    type Output: Copy;

    /// Consume one sample.
    fn step(&mut self, input: Self::Input) -> Option<Self::Output>;
}

/// High / low / close of a candle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hlc {
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
}

/// Open / high / low / close of a candle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ohlc {
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
}

impl From<Ohlc> for Hlc {
    fn from(ohlc: Ohlc) -> Self {
        Hlc {
            high: ohlc.high,
            low: ohlc.low,
            close: ohlc.close,
        }
    }
}

/// Implements [`Streaming`] for single-series [`Indicator`]s.
macro_rules! scalar_streaming {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl $crate::Streaming for $ty {
                type Input = Decimal;
                type Output = Decimal;

                fn step(&mut self, input: Decimal) -> Option<Decimal> {
                    $crate::Indicator::next(self, input)
                }
            }
        )+
    };
}

scalar_streaming!(sma::Sma, ema::Ema, rsi::Rsi);
