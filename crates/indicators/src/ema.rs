use crate::Indicator;
use rust_decimal::Decimal;

/// Exponential Moving Average (EMA), seeded with the SMA of the first `period` values.
#[derive(Debug, Clone)]
pub struct Ema {
    len: usize,
    alpha: Decimal,
    current: Option<Decimal>,
    seen: usize,
    seed_sum: Decimal,
}

impl Ema {
    pub fn new(period: usize) -> Self {
        assert!(period > 0, "EMA period must be > 0");
        Self {
            len: period,
            alpha: Decimal::TWO / (Decimal::from(period) + Decimal::ONE),
            current: None,
            seen: 0,
            seed_sum: Decimal::ZERO,
        }
    }

    pub fn value(&self) -> Option<Decimal> {
        self.current
    }
}

impl Indicator for Ema {
    fn next(&mut self, value: Decimal) -> Option<Decimal> {
        self.current = match self.current {
            Some(prev) => Some(prev + (value - prev) * self.alpha),
            None => {
                self.seen += 1;
                self.seed_sum += value;
                (self.seen >= self.len).then(|| self.seed_sum / Decimal::from(self.len))
            }
        };
        self.current
    }

    fn reset(&mut self) {
        self.current = None;
        self.seen = 0;
        self.seed_sum = Decimal::ZERO;
    }

    fn period(&self) -> usize {
        self.len
    }

    fn is_ready(&self) -> bool {
        self.current.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_ema_seed_then_smooth() {
        let mut ema = Ema::new(3);
        assert_eq!(ema.next(dec!(2)), None);
        assert_eq!(ema.next(dec!(4)), None);
        // seed = (2 + 4 + 6) / 3
        assert_eq!(ema.next(dec!(6)), Some(dec!(4)));
        // alpha = 0.5: 4 + (8 - 4) * 0.5
        assert_eq!(ema.next(dec!(8)), Some(dec!(6)));
    }

    #[test]
    fn test_ema_reset_reseeds() {
        let mut ema = Ema::new(2);
        ema.next(dec!(1));
        ema.next(dec!(3));
        ema.reset();
        assert_eq!(ema.next(dec!(10)), None);
        assert_eq!(ema.next(dec!(20)), Some(dec!(15)));
    }
}
