use crate::Indicator;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Relative Strength Index (RSI), normalized to `[0, 1]`.
///
/// Wilder's smoothing for the average gain/loss. A window without any loss
/// reads 1, a perfectly flat window reads 0.5.
#[derive(Debug, Clone)]
pub struct Rsi {
    len: usize,
    prev_value: Option<Decimal>,
    seed_gain: Decimal,
    seed_loss: Decimal,
    averages: Option<(Decimal, Decimal)>,
    changes: usize,
}

impl Rsi {
    pub fn new(period: usize) -> Self {
        assert!(period > 0, "RSI period must be > 0");
        Self {
            len: period,
            prev_value: None,
            seed_gain: Decimal::ZERO,
            seed_loss: Decimal::ZERO,
            averages: None,
            changes: 0,
        }
    }

    pub fn value(&self) -> Option<Decimal> {
        let (gain, loss) = self.averages?;
        if loss.is_zero() {
            return Some(if gain.is_zero() { dec!(0.5) } else { Decimal::ONE });
        }
        Some(gain / (gain + loss))
    }
}

impl Indicator for Rsi {
    fn next(&mut self, value: Decimal) -> Option<Decimal> {
        if let Some(prev) = self.prev_value {
            let change = value - prev;
            let gain = change.max(Decimal::ZERO);
            let loss = (-change).max(Decimal::ZERO);
            let period = Decimal::from(self.len);

            self.averages = match self.averages {
                Some((avg_gain, avg_loss)) => Some((
                    (avg_gain * (period - Decimal::ONE) + gain) / period,
                    (avg_loss * (period - Decimal::ONE) + loss) / period,
                )),
                None => {
                    self.changes += 1;
                    self.seed_gain += gain;
                    self.seed_loss += loss;
                    (self.changes >= self.len)
                        .then(|| (self.seed_gain / period, self.seed_loss / period))
                }
            };
        }

        self.prev_value = Some(value);
        self.value()
    }

    fn reset(&mut self) {
        self.prev_value = None;
        self.seed_gain = Decimal::ZERO;
        self.seed_loss = Decimal::ZERO;
        self.averages = None;
        self.changes = 0;
    }

    fn period(&self) -> usize {
        self.len + 1 // one extra data point for the first change
    }

    fn is_ready(&self) -> bool {
        self.averages.is_some()
    }
}
