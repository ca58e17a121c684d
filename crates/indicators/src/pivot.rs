use crate::{Ohlc, Streaming};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// How the pivot level is derived from the previous candle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PivotMethod {
    /// P = (H + L + C) / 3
    #[default]
    Classic,
    /// Classic pivot, supports/resistances at 0.382 / 0.618 / 1.0 of the range.
    Fibonacci,
    /// P = (H + L + 2 * O) / 4, with O the open of the current candle.
    Woodie,
}

/// Support and resistance levels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PivotLevels {
    pub pivot: Decimal,
    pub s1: Decimal,
    pub s2: Decimal,
    pub s3: Decimal,
    pub r1: Decimal,
    pub r2: Decimal,
    pub r3: Decimal,
}

/// Pivot points computed from the previous candle of the series.
#[derive(Debug, Clone)]
pub struct PivotPoint {
    method: PivotMethod,
    prev: Option<Ohlc>,
    current: Option<PivotLevels>,
}

impl PivotPoint {
    pub fn new(method: PivotMethod) -> Self {
        Self {
            method,
            prev: None,
            current: None,
        }
    }

    pub fn levels(&self) -> Option<PivotLevels> {
        self.current
    }

    pub fn next_ohlc(&mut self, candle: Ohlc) -> Option<PivotLevels> {
        self.current = self
            .prev
            .map(|prev| levels_for(self.method, prev, candle.open));
        self.prev = Some(candle);
        self.current
    }
}

fn levels_for(method: PivotMethod, prev: Ohlc, open: Decimal) -> PivotLevels {
    let (high, low, close) = (prev.high, prev.low, prev.close);
    let range = high - low;
    let three = Decimal::from(3);

    match method {
        PivotMethod::Classic => {
            let pivot = (high + low + close) / three;
            PivotLevels {
                pivot,
                s1: Decimal::TWO * pivot - high,
                s2: pivot - range,
                s3: low - Decimal::TWO * (high - pivot),
                r1: Decimal::TWO * pivot - low,
                r2: pivot + range,
                r3: high + Decimal::TWO * (pivot - low),
            }
        }
        PivotMethod::Fibonacci => {
            let pivot = (high + low + close) / three;
            let near = Decimal::new(382, 3) * range;
            let mid = Decimal::new(618, 3) * range;
            PivotLevels {
                pivot,
                s1: pivot - near,
                s2: pivot - mid,
                s3: pivot - range,
                r1: pivot + near,
                r2: pivot + mid,
                r3: pivot + range,
            }
        }
        PivotMethod::Woodie => {
            let pivot = (high + low + Decimal::TWO * open) / Decimal::from(4);
            PivotLevels {
                pivot,
                s1: Decimal::TWO * pivot - high,
                s2: pivot - range,
                s3: low - Decimal::TWO * (high - pivot),
                r1: Decimal::TWO * pivot - low,
                r2: pivot + range,
                r3: high + Decimal::TWO * (pivot - low),
            }
        }
    }
}

impl Streaming for PivotPoint {
    type Input = Ohlc;
    type Output = PivotLevels;

    fn step(&mut self, input: Ohlc) -> Option<PivotLevels> {
        self.next_ohlc(input)
    }
}
