//! Decision rules of the trend-setup sub-processor.
//!
//! Rules run in order and each may replace the direction chosen by the previous
//! one. Nothing is combined: the last rule that fires decides the exit.

use crate::config::TrendThresholds;
use alphabot_core::Direction;
use alphabot_indicators::tomdemark::TdSetup;
use rust_decimal::Decimal;

/// Indicator values read by the rules for one tick.
#[derive(Debug, Clone, Copy, Default)]
pub struct CascadeInput {
    pub rsi: Option<Decimal>,
    pub sma: Option<Decimal>,
    pub ema: Option<Decimal>,
    pub setup: Option<TdSetup>,
}

/// Result of the rules for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    /// -1 bearish tilt, 1 bullish tilt, 0 none.
    pub level1: i8,
    /// Trend following the classification, same encoding as `level1`.
    pub trend: i8,
    /// Direction of the position to exit, if any rule fired.
    pub exit: Option<Direction>,
}

impl Decision {
    pub fn can_long(&self) -> bool {
        self.trend >= 0
    }

    pub fn can_short(&self) -> bool {
        self.trend <= 0
    }
}

/// Trend classification from the EMA/SMA position and branch RSI levels.
///
/// EMA under SMA is the bear branch.
pub fn classify_trend(
    ema: Decimal,
    sma: Decimal,
    rsi: Decimal,
    thresholds: &TrendThresholds,
) -> i8 {
    let (high, low) = if ema < sma {
        (thresholds.bear_high, thresholds.bear_low)
    } else {
        (thresholds.bull_high, thresholds.bull_low)
    };

    if rsi > high {
        -1
    } else if rsi < low {
        1
    } else {
        0
    }
}

/// Exit proposed by the trend tilt: a bearish tilt leaves longs, a bullish one
/// leaves shorts.
pub fn trend_exit(level1: i8) -> Option<Direction> {
    match level1.signum() {
        -1 => Some(Direction::Long),
        1 => Some(Direction::Short),
        _ => None,
    }
}

/// Exit proposed by the Tom DeMark setup: a completed setup or a fresh one in its
/// cancelation zone. Buy setups leave longs, sell setups leave shorts.
pub fn tomdemark_exit(setup: TdSetup) -> Option<Direction> {
    if !(setup.is_complete() || setup.in_cancelation_zone()) {
        return None;
    }
    match setup.direction.signum() {
        -1 => Some(Direction::Long),
        1 => Some(Direction::Short),
        _ => None,
    }
}

/// Run every rule in order.
pub fn run(input: &CascadeInput, thresholds: &TrendThresholds) -> Decision {
    let level1 = match (input.ema, input.sma, input.rsi) {
        (Some(ema), Some(sma), Some(rsi)) => classify_trend(ema, sma, rsi, thresholds),
        _ => 0,
    };

    let mut exit = trend_exit(level1);
    let trend = level1.signum();

    if let Some(td_exit) = input.setup.and_then(tomdemark_exit) {
        exit = Some(td_exit);
    }

    Decision {
        level1,
        trend,
        exit,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn thresholds() -> TrendThresholds {
        TrendThresholds::default()
    }

    fn setup(count: u8, direction: i8) -> TdSetup {
        TdSetup {
            count,
            direction,
            perfect: false,
        }
    }

    #[test]
    fn test_bear_branch_levels() {
        let t = thresholds();
        assert_eq!(classify_trend(dec!(9), dec!(10), dec!(0.51), &t), -1);
        assert_eq!(classify_trend(dec!(9), dec!(10), dec!(0.15), &t), 1);
        assert_eq!(classify_trend(dec!(9), dec!(10), dec!(0.3), &t), 0);
        assert_eq!(classify_trend(dec!(9), dec!(10), dec!(0.5), &t), 0);
    }

    #[test]
    fn test_bull_branch_levels() {
        let t = thresholds();
        assert_eq!(classify_trend(dec!(11), dec!(10), dec!(0.85), &t), -1);
        assert_eq!(classify_trend(dec!(11), dec!(10), dec!(0.55), &t), 1);
        assert_eq!(classify_trend(dec!(11), dec!(10), dec!(0.7), &t), 0);
        // equal averages fall in the bull branch
        assert_eq!(classify_trend(dec!(10), dec!(10), dec!(0.7), &t), 0);
        assert_eq!(classify_trend(dec!(10), dec!(10), dec!(0.3), &t), 1);
    }

    #[test]
    fn test_tomdemark_exits() {
        assert_eq!(tomdemark_exit(setup(9, -1)), Some(Direction::Long));
        assert_eq!(tomdemark_exit(setup(9, 1)), Some(Direction::Short));
        assert_eq!(tomdemark_exit(setup(3, -1)), Some(Direction::Long));
        assert_eq!(tomdemark_exit(setup(5, 1)), Some(Direction::Short));
        assert_eq!(tomdemark_exit(setup(2, 1)), None);
        assert_eq!(tomdemark_exit(setup(6, -1)), None);
        assert_eq!(tomdemark_exit(setup(0, 0)), None);
    }

    #[test]
    fn test_tomdemark_overrides_trend() {
        // bull branch with RSI above 0.8: trend exit of longs
        let input = CascadeInput {
            rsi: Some(dec!(0.9)),
            sma: Some(dec!(10)),
            ema: Some(dec!(11)),
            setup: Some(setup(9, 1)),
        };
        let decision = run(&input, &thresholds());
        assert_eq!(decision.level1, -1);
        assert_eq!(decision.trend, -1);
        assert_eq!(decision.exit, Some(Direction::Short));
        assert!(!decision.can_long());
        assert!(decision.can_short());

        let without_setup = run(
            &CascadeInput {
                setup: None,
                ..input
            },
            &thresholds(),
        );
        assert_eq!(without_setup.exit, Some(Direction::Long));
    }

    #[test]
    fn test_unready_indicators_suppress_trend() {
        let decision = run(
            &CascadeInput {
                rsi: None,
                sma: Some(dec!(10)),
                ema: Some(dec!(11)),
                setup: None,
            },
            &thresholds(),
        );
        assert_eq!(decision.level1, 0);
        assert_eq!(decision.exit, None);
        assert!(decision.can_long() && decision.can_short());
    }
}
