use crate::{Hlc, Streaming};
use rust_decimal::Decimal;

/// Average True Range (ATR) with Wilder's smoothing.
#[derive(Debug, Clone)]
pub struct Atr {
    len: usize,
    prev_close: Option<Decimal>,
    seed_sum: Decimal,
    seen: usize,
    current: Option<Decimal>,
}

impl Atr {
    pub fn new(period: usize) -> Self {
        assert!(period > 0, "ATR period must be > 0");
        Self {
            len: period,
            prev_close: None,
            seed_sum: Decimal::ZERO,
            seen: 0,
            current: None,
        }
    }

    /// Feed high, low, close and compute ATR.
    pub fn next_hlc(&mut self, high: Decimal, low: Decimal, close: Decimal) -> Option<Decimal> {
        let range = high - low;
        let tr = match self.prev_close {
            Some(prev) => range.max((high - prev).abs()).max((low - prev).abs()),
            None => range,
        };
        self.prev_close = Some(close);

        let period = Decimal::from(self.len);
        self.current = match self.current {
            Some(prev_atr) => Some((prev_atr * (period - Decimal::ONE) + tr) / period),
            None => {
                self.seen += 1;
                self.seed_sum += tr;
                (self.seen >= self.len).then(|| self.seed_sum / period)
            }
        };
        self.current
    }

    pub fn value(&self) -> Option<Decimal> {
        self.current
    }
}

impl Streaming for Atr {
    type Input = Hlc;
    type Output = Decimal;

    fn step(&mut self, input: Hlc) -> Option<Decimal> {
        self.next_hlc(input.high, input.low, input.close)
    }
}
