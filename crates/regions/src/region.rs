use alphabot_core::{timeframe_to_str, InvalidCode, Signal, SignalKind, Timestamp};
use chrono::DateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Errors raised while building, loading or managing regions.
#[derive(Debug, thiserror::Error)]
pub enum RegionError {
    #[error("region prices must be greater than zero")]
    NonPositivePrice,
    #[error("region low {low} is above high {high}")]
    InvertedBounds { low: Decimal, high: Decimal },
    #[error("trend region expiry {expiry} must be after its creation {created}")]
    InvalidExpiry { created: Timestamp, expiry: Timestamp },
    #[error("unknown region type {0}")]
    UnknownRegion(i64),
    #[error("unsupported region format version {0}")]
    UnsupportedVersion(String),
    #[error("region record is missing `{0}`")]
    MissingField(&'static str),
    #[error("region {0} already exists")]
    DuplicateId(i64),
    #[error("region {0} not found")]
    NotFound(i64),
    #[error("region id {0} is out of range")]
    IdOutOfRange(i64),
    #[error(transparent)]
    InvalidCode(#[from] InvalidCode),
    #[error("malformed region data: {0}")]
    Malformed(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// Stage & direction filters
// ---------------------------------------------------------------------------

/// Which signal stage a region applies to. Encoded as 1 / -1 / 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "i8", into = "i8")]
pub enum Stage {
    Entry,
    Exit,
    #[default]
    Both,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Entry => "entry",
            Stage::Exit => "exit",
            Stage::Both => "both",
        }
    }

    /// Unknown labels fall back to `Both`.
    pub fn from_label(label: &str) -> Self {
        match label {
            "entry" => Stage::Entry,
            "exit" => Stage::Exit,
            _ => Stage::Both,
        }
    }
}

impl From<Stage> for i8 {
    fn from(stage: Stage) -> i8 {
        match stage {
            Stage::Entry => 1,
            Stage::Exit => -1,
            Stage::Both => 0,
        }
    }
}

impl TryFrom<i8> for Stage {
    type Error = InvalidCode;

    fn try_from(code: i8) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(Stage::Entry),
            -1 => Ok(Stage::Exit),
            0 => Ok(Stage::Both),
            _ => Err(InvalidCode {
                kind: "stage",
                code: code.into(),
            }),
        }
    }
}

/// Which signal direction a region applies to. Encoded as 1 / -1 / 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "i8", into = "i8")]
pub enum RegionDirection {
    Long,
    Short,
    #[default]
    Both,
}

impl RegionDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegionDirection::Long => "long",
            RegionDirection::Short => "short",
            RegionDirection::Both => "both",
        }
    }

    /// Unknown labels fall back to `Both`.
    pub fn from_label(label: &str) -> Self {
        match label {
            "long" => RegionDirection::Long,
            "short" => RegionDirection::Short,
            _ => RegionDirection::Both,
        }
    }
}

impl From<RegionDirection> for i8 {
    fn from(direction: RegionDirection) -> i8 {
        match direction {
            RegionDirection::Long => 1,
            RegionDirection::Short => -1,
            RegionDirection::Both => 0,
        }
    }
}

impl TryFrom<i8> for RegionDirection {
    type Error = InvalidCode;

    fn try_from(code: i8) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(RegionDirection::Long),
            -1 => Ok(RegionDirection::Short),
            0 => Ok(RegionDirection::Both),
            _ => Err(InvalidCode {
                kind: "region direction",
                code: code.into(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Region shapes
// ---------------------------------------------------------------------------

/// Horizontal band between two absolute prices.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeBounds {
    pub low: Decimal,
    pub high: Decimal,
    /// Price that deletes the region once crossed against its direction (0 = none).
    pub cancelation: Decimal,
}

/// Channel between two trend lines, from `(low_a, high_a)` at creation to
/// `(low_b, high_b)` at expiry. The lines need not be parallel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendChannel {
    pub low_a: Decimal,
    pub high_a: Decimal,
    pub low_b: Decimal,
    pub high_b: Decimal,
    pub cancelation: Decimal,
    /// Per-second slope of the low line, set once the region passed its check.
    dl: Decimal,
    /// Per-second slope of the high line.
    dh: Decimal,
}

impl TrendChannel {
    pub fn new(
        low_a: Decimal,
        high_a: Decimal,
        low_b: Decimal,
        high_b: Decimal,
        cancelation: Decimal,
    ) -> Self {
        Self {
            low_a,
            high_a,
            low_b,
            high_b,
            cancelation,
            dl: Decimal::ZERO,
            dh: Decimal::ZERO,
        }
    }

    pub fn slopes(&self) -> (Decimal, Decimal) {
        (self.dl, self.dh)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RegionKind {
    Range(RangeBounds),
    Trend(TrendChannel),
}

impl RegionKind {
    /// Integer type stored in the persistence format.
    pub fn code(&self) -> i64 {
        match self {
            RegionKind::Range(_) => 1,
            RegionKind::Trend(_) => 2,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            RegionKind::Range(_) => "range",
            RegionKind::Trend(_) => "channel",
        }
    }

    pub fn cancelation(&self) -> Decimal {
        match self {
            RegionKind::Range(range) => range.cancelation,
            RegionKind::Trend(trend) => trend.cancelation,
        }
    }
}

// ---------------------------------------------------------------------------
// Region
// ---------------------------------------------------------------------------

/// A price/time constraint a signal must satisfy before it is honored.
///
/// Every `Region` value has passed [`Region::check`]: constructors validate
/// before anything derived (trend slopes) is computed.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    id: i64,
    created: Timestamp,
    stage: Stage,
    direction: RegionDirection,
    /// Expiry timestamp, `<= 0` never expires.
    expiry: Timestamp,
    /// Timeframe the region applies to, 0 for any.
    timeframe: i64,
    kind: RegionKind,
}

impl Region {
    pub fn new(
        created: Timestamp,
        stage: Stage,
        direction: RegionDirection,
        timeframe: i64,
        expiry: Timestamp,
        kind: RegionKind,
    ) -> Result<Self, RegionError> {
        let mut region = Self {
            id: -1,
            created,
            stage,
            direction,
            expiry,
            timeframe,
            kind,
        };
        region.check()?;
        region.fit_slopes();
        Ok(region)
    }

    /// Range region between `low` and `high`.
    pub fn range(
        created: Timestamp,
        stage: Stage,
        direction: RegionDirection,
        timeframe: i64,
        expiry: Timestamp,
        bounds: RangeBounds,
    ) -> Result<Self, RegionError> {
        Self::new(created, stage, direction, timeframe, expiry, RegionKind::Range(bounds))
    }

    /// Trend channel region; `expiry` is the timestamp of the `b` points.
    pub fn trend(
        created: Timestamp,
        stage: Stage,
        direction: RegionDirection,
        timeframe: i64,
        expiry: Timestamp,
        channel: TrendChannel,
    ) -> Result<Self, RegionError> {
        Self::new(created, stage, direction, timeframe, expiry, RegionKind::Trend(channel))
    }

    /// Integrity check of the region data.
    pub fn check(&self) -> Result<(), RegionError> {
        match &self.kind {
            RegionKind::Range(range) => {
                if range.low <= Decimal::ZERO || range.high <= Decimal::ZERO {
                    return Err(RegionError::NonPositivePrice);
                }
                if range.low > range.high {
                    return Err(RegionError::InvertedBounds {
                        low: range.low,
                        high: range.high,
                    });
                }
            }
            RegionKind::Trend(trend) => {
                let points = [trend.low_a, trend.high_a, trend.low_b, trend.high_b];
                if points.iter().any(|p| *p <= Decimal::ZERO) {
                    return Err(RegionError::NonPositivePrice);
                }
                for (low, high) in [(trend.low_a, trend.high_a), (trend.low_b, trend.high_b)] {
                    if low > high {
                        return Err(RegionError::InvertedBounds { low, high });
                    }
                }
                if self.expiry <= self.created {
                    return Err(RegionError::InvalidExpiry {
                        created: self.created,
                        expiry: self.expiry,
                    });
                }
            }
        }
        Ok(())
    }

    /// Only called after a successful check: `expiry > created` for trends.
    fn fit_slopes(&mut self) {
        if let RegionKind::Trend(trend) = &mut self.kind {
            let span = Decimal::from(self.expiry - self.created);
            trend.dl = (trend.low_b - trend.low_a) / span;
            trend.dh = (trend.high_b - trend.high_a) / span;
        }
    }

    // -- getters -----------------------------------------------------------

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn created(&self) -> Timestamp {
        self.created
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn direction(&self) -> RegionDirection {
        self.direction
    }

    pub fn expiry(&self) -> Timestamp {
        self.expiry
    }

    pub fn timeframe(&self) -> i64 {
        self.timeframe
    }

    pub fn kind(&self) -> &RegionKind {
        &self.kind
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    // -- setters -----------------------------------------------------------

    pub fn set_id(&mut self, id: i64) {
        self.id = id;
    }

    /// Change the expiry; trend slopes are refitted, invalid expiries rejected.
    pub fn set_expiry(&mut self, expiry: Timestamp) -> Result<(), RegionError> {
        let mut updated = self.clone();
        updated.expiry = expiry;
        updated.check()?;
        updated.fit_slopes();
        *self = updated;
        Ok(())
    }

    // -- processing --------------------------------------------------------

    pub fn is_expired(&self, timestamp: Timestamp) -> bool {
        self.expiry > 0 && timestamp >= self.expiry
    }

    /// Whether `signal` passes this region at `timestamp`.
    pub fn test_region(&self, timestamp: Timestamp, signal: &Signal) -> bool {
        match (self.stage, signal.kind) {
            (Stage::Exit, SignalKind::Entry) | (Stage::Entry, SignalKind::Exit) => return false,
            _ => {}
        }
        if self.is_expired(timestamp) {
            return false;
        }
        if self.timeframe > 0 && signal.timeframe != self.timeframe {
            return false;
        }
        self.test(timestamp, signal)
    }

    /// Shape test only: is the signal price inside the region at `timestamp`.
    pub fn test(&self, timestamp: Timestamp, signal: &Signal) -> bool {
        let (low, high) = self.bounds_at(timestamp);
        low <= signal.price && signal.price <= high
    }

    /// Low and high limits of the region at `timestamp`.
    pub fn bounds_at(&self, timestamp: Timestamp) -> (Decimal, Decimal) {
        match &self.kind {
            RegionKind::Range(range) => (range.low, range.high),
            RegionKind::Trend(trend) => {
                let dt = Decimal::from(timestamp - self.created);
                (trend.dl * dt + trend.low_a, trend.dh * dt + trend.high_a)
            }
        }
    }

    /// Polled on every price update by the owner of the region.
    ///
    /// True once expired, or when the price crossed the cancelation trigger against
    /// the region direction (ask below it for long, bid above it for short). A
    /// cancelation of 0 disables the price trigger.
    pub fn can_delete(&self, timestamp: Timestamp, bid: Decimal, ask: Decimal) -> bool {
        if self.is_expired(timestamp) {
            return true;
        }

        let cancelation = self.kind.cancelation();
        if cancelation <= Decimal::ZERO {
            return false;
        }

        match self.direction {
            RegionDirection::Long => ask < cancelation,
            RegionDirection::Short => bid > cancelation,
            RegionDirection::Both => false,
        }
    }

    // -- display -----------------------------------------------------------

    pub fn timeframe_to_str(&self) -> String {
        if self.timeframe > 0 {
            timeframe_to_str(self.timeframe)
        } else {
            "any".to_string()
        }
    }

    pub fn created_to_str(&self) -> String {
        format_timestamp(self.created)
    }

    pub fn expiry_to_str(&self) -> String {
        if self.expiry > 0 {
            format_timestamp(self.expiry)
        } else {
            "never".to_string()
        }
    }

    /// Single line description of the region.
    pub fn str_info(&self) -> String {
        self.to_string()
    }

    /// Named fields for a table or UI, values already formatted.
    pub fn parameters(&self) -> BTreeMap<&'static str, String> {
        let mut params = BTreeMap::new();
        params.insert("name", self.name().to_string());
        params.insert("id", self.id.to_string());
        params.insert("created", self.created_to_str());
        params.insert("stage", self.stage.as_str().to_string());
        params.insert("direction", self.direction.as_str().to_string());
        params.insert("timeframe", self.timeframe_to_str());
        params.insert("expiry", self.expiry_to_str());

        match &self.kind {
            RegionKind::Range(range) => {
                params.insert("label", "Range region".to_string());
                params.insert("low", range.low.to_string());
                params.insert("high", range.high.to_string());
                params.insert("cancelation", range.cancelation.to_string());
            }
            RegionKind::Trend(trend) => {
                params.insert("label", "Trend region".to_string());
                params.insert("low-a", trend.low_a.to_string());
                params.insert("high-a", trend.high_a.to_string());
                params.insert("low-b", trend.low_b.to_string());
                params.insert("high-b", trend.high_b.to_string());
                params.insert("cancelation", trend.cancelation.to_string());
            }
        }
        params
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            RegionKind::Range(range) => write!(
                f,
                "Range region from {} to {}, stage {}, direction {}, timeframe {}, expiry {}, cancelation {}",
                range.low,
                range.high,
                self.stage.as_str(),
                self.direction.as_str(),
                self.timeframe_to_str(),
                self.expiry_to_str(),
                range.cancelation,
            ),
            RegionKind::Trend(trend) => write!(
                f,
                "Trend region from {}/{} to {}/{}, stage {}, direction {}, timeframe {}, expiry {}, cancelation {}",
                trend.low_a,
                trend.high_a,
                trend.low_b,
                trend.high_b,
                self.stage.as_str(),
                self.direction.as_str(),
                self.timeframe_to_str(),
                self.expiry_to_str(),
                trend.cancelation,
            ),
        }
    }
}

fn format_timestamp(timestamp: Timestamp) -> String {
    DateTime::from_timestamp(timestamp, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| timestamp.to_string())
}
