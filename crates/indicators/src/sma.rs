use crate::Indicator;
use rust_decimal::Decimal;
use std::collections::VecDeque;

/// Rolling mean of the last `period` values.
///
/// Also exposes the window variance for dispersion based indicators.
#[derive(Debug, Clone)]
pub struct Sma {
    period: usize,
    window: VecDeque<Decimal>,
    total: Decimal,
}

impl Sma {
    pub fn new(period: usize) -> Self {
        assert!(period > 0, "SMA period must be > 0");
        Self {
            period,
            window: VecDeque::with_capacity(period + 1),
            total: Decimal::ZERO,
        }
    }

    /// Mean of the window, `None` until it is full.
    pub fn mean(&self) -> Option<Decimal> {
        self.is_ready()
            .then(|| self.total / Decimal::from(self.period))
    }

    /// Population variance of the window, `None` until it is full.
    pub fn variance(&self) -> Option<Decimal> {
        let mean = self.mean()?;
        let squares: Decimal = self.window.iter().map(|v| (*v - mean) * (*v - mean)).sum();
        Some(squares / Decimal::from(self.period))
    }
}

impl Indicator for Sma {
    fn next(&mut self, value: Decimal) -> Option<Decimal> {
        self.total += value;
        self.window.push_back(value);
        while self.window.len() > self.period {
            match self.window.pop_front() {
                Some(evicted) => self.total -= evicted,
                None => break,
            }
        }
        self.mean()
    }

    fn reset(&mut self) {
        self.window.clear();
        self.total = Decimal::ZERO;
    }

    fn period(&self) -> usize {
        self.period
    }

    fn is_ready(&self) -> bool {
        self.window.len() == self.period
    }
}
