use crate::sma::Sma;
use crate::{Indicator, Streaming};
use rust_decimal::Decimal;

/// Bollinger Bands (population standard deviation around an SMA).
///
/// As an [`Indicator`] it yields the middle band; [`Streaming`] yields all three.
#[derive(Debug, Clone)]
pub struct BollingerBands {
    sma: Sma,
    num_std: Decimal,
    current: Option<BollingerOutput>,
}

/// Bollinger Bands output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BollingerOutput {
    pub upper: Decimal,
    pub middle: Decimal,
    pub lower: Decimal,
}

impl BollingerBands {
    pub fn new(period: usize, num_std_dev: Decimal) -> Self {
        assert!(period > 0, "Bollinger period must be > 0");
        Self {
            sma: Sma::new(period),
            num_std: num_std_dev,
            current: None,
        }
    }

    pub fn output(&self) -> Option<BollingerOutput> {
        self.current
    }

    pub fn next_output(&mut self, value: Decimal) -> Option<BollingerOutput> {
        let middle = self.sma.next(value)?;
        let variance = self.sma.variance()?;
        let width = self.num_std * decimal_sqrt(variance);

        self.current = Some(BollingerOutput {
            upper: middle + width,
            middle,
            lower: middle - width,
        });
        self.current
    }
}

impl Indicator for BollingerBands {
    fn next(&mut self, value: Decimal) -> Option<Decimal> {
        self.next_output(value).map(|o| o.middle)
    }

    fn reset(&mut self) {
        self.sma.reset();
        self.current = None;
    }

    fn period(&self) -> usize {
        self.sma.period()
    }

    fn is_ready(&self) -> bool {
        self.current.is_some()
    }
}

impl Streaming for BollingerBands {
    type Input = Decimal;
    type Output = BollingerOutput;

    fn step(&mut self, input: Decimal) -> Option<BollingerOutput> {
        self.next_output(input)
    }
}

/// Newton's method square root for Decimal.
pub fn decimal_sqrt(value: Decimal) -> Decimal {
    if value <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    let epsilon = Decimal::new(1, 10);
    let mut guess = value / Decimal::TWO;
    for _ in 0..100 {
        let next_guess = (guess + value / guess) / Decimal::TWO;
        let done = (next_guess - guess).abs() < epsilon;
        guess = next_guess;
        if done {
            break;
        }
    }
    guess
}
