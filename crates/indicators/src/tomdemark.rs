use crate::{Hlc, Streaming};
use std::collections::VecDeque;

/// Bars between the compared closes of a setup.
const LOOKBACK: usize = 4;
/// Count at which a setup is complete.
pub const SETUP_COMPLETE: u8 = 9;

/// State of the Tom DeMark sequential setup after the last candle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TdSetup {
    /// Consecutive qualifying candles, 0 when no setup is running (`c`).
    pub count: u8,
    /// -1 buy setup (closes below the close 4 bars earlier), +1 sell setup, 0 none (`d`).
    pub direction: i8,
    /// Set on a completed setup whose last two bars extend past bars 6 and 7.
    pub perfect: bool,
}

impl TdSetup {
    pub fn is_complete(&self) -> bool {
        self.count == SETUP_COMPLETE
    }

    /// Count within the 3..=5 zone where a fresh setup cancels the previous move.
    pub fn in_cancelation_zone(&self) -> bool {
        (3..=5).contains(&self.count)
    }
}

/// Tom DeMark sequential setup counter.
///
/// A buy setup counts candles closing below the close four candles earlier, a sell
/// setup candles closing above it. A flip of direction or an equal close restarts
/// the count; a completed setup restarts at 1 on the next qualifying candle.
#[derive(Debug, Clone, Default)]
pub struct TomDemark {
    bars: VecDeque<Hlc>,
    setup: TdSetup,
}

impl TomDemark {
    pub fn new() -> Self {
        Self {
            bars: VecDeque::with_capacity(LOOKBACK + 1),
            setup: TdSetup::default(),
        }
    }

    pub fn setup(&self) -> TdSetup {
        self.setup
    }

    pub fn next_hlc(&mut self, bar: Hlc) -> Option<TdSetup> {
        self.bars.push_back(bar);
        if self.bars.len() > LOOKBACK + 1 {
            self.bars.pop_front();
        }
        if self.bars.len() <= LOOKBACK {
            return None;
        }

        let reference = self.bars[0].close;
        let direction = match bar.close.cmp(&reference) {
            std::cmp::Ordering::Less => -1,
            std::cmp::Ordering::Greater => 1,
            std::cmp::Ordering::Equal => 0,
        };

        let count = if direction == 0 {
            0
        } else if direction == self.setup.direction && self.setup.count < SETUP_COMPLETE {
            self.setup.count + 1
        } else {
            1
        };

        self.setup = TdSetup {
            count,
            direction,
            perfect: count == SETUP_COMPLETE && self.is_perfect(direction),
        };
        Some(self.setup)
    }

    /// Bars 6..9 of the setup are the last four stored bars.
    fn is_perfect(&self, direction: i8) -> bool {
        let (b6, b7, b8, b9) = (self.bars[1], self.bars[2], self.bars[3], self.bars[4]);
        if direction < 0 {
            b8.low.min(b9.low) <= b6.low.min(b7.low)
        } else {
            b8.high.max(b9.high) >= b6.high.max(b7.high)
        }
    }
}

impl Streaming for TomDemark {
    type Input = Hlc;
    type Output = TdSetup;

    fn step(&mut self, input: Hlc) -> Option<TdSetup> {
        self.next_hlc(input)
    }
}
