use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Unix timestamp in seconds.
pub type Timestamp = i64;

// ---------------------------------------------------------------------------
// Timeframe
// ---------------------------------------------------------------------------

const MINUTE: i64 = 60;
const HOUR: i64 = 60 * MINUTE;
const DAY: i64 = 24 * HOUR;
const WEEK: i64 = 7 * DAY;

/// Floor a timestamp to the start of its timeframe bucket.
///
/// A non-positive timeframe leaves the timestamp untouched.
pub fn base_time(timestamp: Timestamp, timeframe: i64) -> Timestamp {
    if timeframe <= 0 {
        return timestamp;
    }
    timestamp - timestamp.rem_euclid(timeframe)
}

/// Short label for a timeframe in seconds (`"1m"`, `"4h"`, `"1d"`...).
pub fn timeframe_to_str(timeframe: i64) -> String {
    match timeframe {
        tf if tf <= 0 => "t".to_string(),
        tf if tf % WEEK == 0 => format!("{}w", tf / WEEK),
        tf if tf % DAY == 0 => format!("{}d", tf / DAY),
        tf if tf % HOUR == 0 => format!("{}h", tf / HOUR),
        tf if tf % MINUTE == 0 => format!("{}m", tf / MINUTE),
        tf => format!("{}s", tf),
    }
}

/// Parse a timeframe label back to seconds. `"t"` maps to 0.
pub fn timeframe_from_str(label: &str) -> Option<i64> {
    let label = label.trim();
    if label == "t" {
        return Some(0);
    }
    let unit = label.chars().last()?;
    let count: i64 = label[..label.len() - unit.len_utf8()].parse().ok()?;
    let scale = match unit {
        's' => 1,
        'm' => MINUTE,
        'h' => HOUR,
        'd' => DAY,
        'w' => WEEK,
        _ => return None,
    };
    count.checked_mul(scale)
}

// ---------------------------------------------------------------------------
// Market Data
// ---------------------------------------------------------------------------

/// A single OHLCV candle.
///
/// Only the most recent candle of a window may be still open (`ended == false`);
/// its values change until the bucket closes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Bucket start, in seconds.
    pub timestamp: Timestamp,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    pub ended: bool,
}

impl Candle {
    /// Create a closed candle with zero volume.
    pub fn new(
        timestamp: Timestamp,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
    ) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume: Decimal::ZERO,
            ended: true,
        }
    }

    pub fn with_volume(mut self, volume: Decimal) -> Self {
        self.volume = volume;
        self
    }

    /// Mark the candle as still forming.
    pub fn in_progress(mut self) -> Self {
        self.ended = false;
        self
    }
}

// ---------------------------------------------------------------------------
// Signal
// ---------------------------------------------------------------------------

/// Raised when an integer code does not map to any variant of a wire enum.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind} code: {code}")]
pub struct InvalidCode {
    pub kind: &'static str,
    pub code: i64,
}

/// Entry or exit stage of a signal. Encoded as 1 / -1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i8", into = "i8")]
pub enum SignalKind {
    Entry,
    Exit,
}

impl From<SignalKind> for i8 {
    fn from(kind: SignalKind) -> i8 {
        match kind {
            SignalKind::Entry => 1,
            SignalKind::Exit => -1,
        }
    }
}

impl TryFrom<i8> for SignalKind {
    type Error = InvalidCode;

    fn try_from(code: i8) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(SignalKind::Entry),
            -1 => Ok(SignalKind::Exit),
            _ => Err(InvalidCode {
                kind: "signal kind",
                code: code.into(),
            }),
        }
    }
}

/// Trade direction of a signal. Encoded as 1 (long) / -1 (short).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i8", into = "i8")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Long => "long",
            Direction::Short => "short",
        }
    }
}

impl From<Direction> for i8 {
    fn from(direction: Direction) -> i8 {
        match direction {
            Direction::Long => 1,
            Direction::Short => -1,
        }
    }
}

impl TryFrom<i8> for Direction {
    type Error = InvalidCode;

    fn try_from(code: i8) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(Direction::Long),
            -1 => Ok(Direction::Short),
            _ => Err(InvalidCode {
                kind: "direction",
                code: code.into(),
            }),
        }
    }
}

/// Snapshot of an indicator at the time a signal was emitted.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Trace {
    pub last: Option<Decimal>,
    pub prev: Option<Decimal>,
}

/// A directional trade proposal emitted by a strategy sub-processor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    /// Timeframe (seconds) of the sub-processor that emitted the signal.
    pub timeframe: i64,
    pub timestamp: Timestamp,
    pub kind: SignalKind,
    pub direction: Direction,
    pub price: Decimal,
    /// Indicator traces attached when profiling is enabled.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub conditions: BTreeMap<String, Trace>,
}

impl Signal {
    pub fn new(
        timeframe: i64,
        timestamp: Timestamp,
        kind: SignalKind,
        direction: Direction,
        price: Decimal,
    ) -> Self {
        Self {
            timeframe,
            timestamp,
            kind,
            direction,
            price,
            conditions: BTreeMap::new(),
        }
    }

    /// Exit signal for the given direction.
    pub fn exit(timeframe: i64, timestamp: Timestamp, direction: Direction, price: Decimal) -> Self {
        Self::new(timeframe, timestamp, SignalKind::Exit, direction, price)
    }

    /// Timestamp floored to the signal timeframe.
    pub fn base_time(&self) -> Timestamp {
        base_time(self.timestamp, self.timeframe)
    }

    /// Two signals with the same kind, direction and base time target the same candle.
    pub fn same_slot(&self, other: &Signal) -> bool {
        self.kind == other.kind
            && self.direction == other.direction
            && self.base_time() == other.base_time()
    }

    pub fn add_condition(&mut self, label: impl Into<String>, trace: Trace) {
        self.conditions.insert(label.into(), trace);
    }
}
