use crate::region::{RangeBounds, Region, RegionError, RegionKind, TrendChannel};
use alphabot_core::Timestamp;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Version written by [`Region::dumps`]. Records of the same major version load.
pub const VERSION: &str = "1.0.0";

/// Region discriminators of the persistence format.
pub const REGION_UNDEFINED: i64 = 0;
pub const REGION_RANGE: i64 = 1;
pub const REGION_TREND: i64 = 2;

/// Flat persistence form of a region, as exchanged with storage and the UI.
///
/// Prices are written as JSON floats, variant fields are omitted when they do not
/// apply to the region type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionRecord {
    pub version: String,
    pub region: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default = "unassigned_id")]
    pub id: i64,
    #[serde(default)]
    pub created: Timestamp,
    #[serde(default)]
    pub stage: i8,
    #[serde(default)]
    pub direction: i8,
    #[serde(default)]
    pub timeframe: i64,
    #[serde(default)]
    pub expiry: Timestamp,

    #[serde(
        default,
        with = "rust_decimal::serde::float_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub low: Option<Decimal>,
    #[serde(
        default,
        with = "rust_decimal::serde::float_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub high: Option<Decimal>,

    #[serde(
        rename = "low-a",
        default,
        with = "rust_decimal::serde::float_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub low_a: Option<Decimal>,
    #[serde(
        rename = "high-a",
        default,
        with = "rust_decimal::serde::float_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub high_a: Option<Decimal>,
    #[serde(
        rename = "low-b",
        default,
        with = "rust_decimal::serde::float_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub low_b: Option<Decimal>,
    #[serde(
        rename = "high-b",
        default,
        with = "rust_decimal::serde::float_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub high_b: Option<Decimal>,

    #[serde(default, with = "rust_decimal::serde::float")]
    pub cancelation: Decimal,
}

fn unassigned_id() -> i64 {
    -1
}

fn required(value: Option<Decimal>, field: &'static str) -> Result<Decimal, RegionError> {
    value.ok_or(RegionError::MissingField(field))
}

fn check_version(version: &str) -> Result<(), RegionError> {
    let major = version.split('.').next().unwrap_or_default();
    if major == "1" {
        Ok(())
    } else {
        Err(RegionError::UnsupportedVersion(version.to_string()))
    }
}

impl Region {
    /// Persistence record holding every field of the region.
    pub fn dumps(&self) -> RegionRecord {
        let mut record = RegionRecord {
            version: VERSION.to_string(),
            region: self.kind().code(),
            name: self.name().to_string(),
            id: self.id(),
            created: self.created(),
            stage: self.stage().into(),
            direction: self.direction().into(),
            timeframe: self.timeframe(),
            expiry: self.expiry(),
            low: None,
            high: None,
            low_a: None,
            high_a: None,
            low_b: None,
            high_b: None,
            cancelation: self.kind().cancelation(),
        };

        match self.kind() {
            RegionKind::Range(range) => {
                record.low = Some(range.low);
                record.high = Some(range.high);
            }
            RegionKind::Trend(trend) => {
                record.low_a = Some(trend.low_a);
                record.high_a = Some(trend.high_a);
                record.low_b = Some(trend.low_b);
                record.high_b = Some(trend.high_b);
            }
        }
        record
    }

    /// Rebuild a region from its record. The region is checked before it is returned.
    pub fn loads(record: &RegionRecord) -> Result<Self, RegionError> {
        check_version(&record.version)?;

        let kind = match record.region {
            REGION_RANGE => RegionKind::Range(RangeBounds {
                low: required(record.low, "low")?,
                high: required(record.high, "high")?,
                cancelation: record.cancelation,
            }),
            REGION_TREND => RegionKind::Trend(TrendChannel::new(
                required(record.low_a, "low-a")?,
                required(record.high_a, "high-a")?,
                required(record.low_b, "low-b")?,
                required(record.high_b, "high-b")?,
                record.cancelation,
            )),
            other => return Err(RegionError::UnknownRegion(other)),
        };

        let mut region = Region::new(
            record.created,
            record.stage.try_into()?,
            record.direction.try_into()?,
            record.timeframe,
            record.expiry,
            kind,
        )?;
        region.set_id(record.id);

        debug!(id = region.id(), name = region.name(), "region loaded");
        Ok(region)
    }

    pub fn to_json(&self) -> Result<String, RegionError> {
        Ok(serde_json::to_string(&self.dumps())?)
    }

    pub fn from_json(json: &str) -> Result<Self, RegionError> {
        let record: RegionRecord = serde_json::from_str(json)?;
        Self::loads(&record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::{RegionDirection, Stage};
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn sample_range() -> Region {
        let mut region = Region::range(
            1_700_000_000,
            Stage::Entry,
            RegionDirection::Short,
            3600,
            1_700_086_400,
            RangeBounds {
                low: dec!(100.25),
                high: dec!(120.5),
                cancelation: dec!(130),
            },
        )
        .unwrap();
        region.set_id(7);
        region
    }

    fn sample_trend() -> Region {
        Region::trend(
            1_000,
            Stage::Exit,
            RegionDirection::Long,
            0,
            4_000,
            TrendChannel::new(dec!(10), dec!(20), dec!(20.5), dec!(30.75), dec!(8)),
        )
        .unwrap()
    }

    #[test]
    fn test_range_record_fields() {
        let json = serde_json::to_value(sample_range().dumps()).unwrap();
        assert_eq!(json["version"], "1.0.0");
        assert_eq!(json["region"], 1);
        assert_eq!(json["name"], "range");
        assert_eq!(json["id"], 7);
        assert_eq!(json["stage"], 1);
        assert_eq!(json["direction"], -1);
        assert_eq!(json["timeframe"], 3600);
        assert_eq!(json["low"], 100.25);
        assert_eq!(json["high"], 120.5);
        assert_eq!(json["cancelation"], 130.0);
        assert!(json.get("low-a").is_none());
    }

    #[test]
    fn test_trend_record_uses_dashed_names() {
        let json = serde_json::to_value(sample_trend().dumps()).unwrap();
        assert_eq!(json["region"], 2);
        assert_eq!(json["name"], "channel");
        assert_eq!(json["low-a"], 10.0);
        assert_eq!(json["high-b"], 30.75);
        assert!(json.get("low").is_none());
    }

    #[test]
    fn test_round_trip_through_json() {
        for region in [sample_range(), sample_trend()] {
            let back = Region::from_json(&region.to_json().unwrap()).unwrap();
            assert_eq!(back, region);
        }
    }

    #[test]
    fn test_defaults_for_missing_common_fields() {
        let json = r#"{"version": "1.0.0", "region": 1, "low": 10, "high": 20}"#;
        let region = Region::from_json(json).unwrap();
        assert_eq!(region.id(), -1);
        assert_eq!(region.stage(), Stage::Both);
        assert_eq!(region.direction(), RegionDirection::Both);
        assert_eq!(region.expiry(), 0);
        assert_eq!(region.kind().cancelation(), Decimal::ZERO);
    }

    #[test]
    fn test_loads_rejects_invalid_records() {
        let undefined = r#"{"version": "1.0.0", "region": 0}"#;
        assert!(matches!(
            Region::from_json(undefined),
            Err(RegionError::UnknownRegion(REGION_UNDEFINED))
        ));

        let future = r#"{"version": "2.0.0", "region": 1, "low": 10, "high": 20}"#;
        assert!(matches!(
            Region::from_json(future),
            Err(RegionError::UnsupportedVersion(_))
        ));

        let missing = r#"{"version": "1.0.0", "region": 2, "low-a": 10, "high-a": 20}"#;
        assert!(matches!(
            Region::from_json(missing),
            Err(RegionError::MissingField("low-b"))
        ));

        let bad_stage = r#"{"version": "1.0.0", "region": 1, "low": 10, "high": 20, "stage": 3}"#;
        assert!(matches!(
            Region::from_json(bad_stage),
            Err(RegionError::InvalidCode(_))
        ));

        let inverted = r#"{"version": "1.0.0", "region": 1, "low": 20, "high": 10}"#;
        assert!(matches!(
            Region::from_json(inverted),
            Err(RegionError::InvertedBounds { .. })
        ));

        let zero_span = r#"{"version": "1.0.0", "region": 2, "created": 5, "expiry": 5,
            "low-a": 10, "high-a": 20, "low-b": 10, "high-b": 20}"#;
        assert!(matches!(
            Region::from_json(zero_span),
            Err(RegionError::InvalidExpiry { .. })
        ));

        assert!(matches!(Region::from_json("{"), Err(RegionError::Malformed(_))));
    }

    proptest! {
        #[test]
        fn prop_records_round_trip(
            low in 1i64..1_000_000,
            width in 0i64..1_000_000,
            drift in -500i64..500,
            created in 0i64..1_000_000,
            span in 1i64..1_000_000,
            stage in -1i8..=1,
            direction in -1i8..=1,
            trend in any::<bool>(),
        ) {
            let (low, high) = (Decimal::new(low, 2), Decimal::new(low + width, 2));
            let kind = if trend {
                let shift = Decimal::new(drift, 2);
                let (low_b, high_b) = (low + shift.abs(), high + shift.abs());
                RegionKind::Trend(TrendChannel::new(low, high, low_b, high_b, low))
            } else {
                RegionKind::Range(RangeBounds { low, high, cancelation: high })
            };
            let region = Region::new(
                created,
                stage.try_into().unwrap(),
                direction.try_into().unwrap(),
                60,
                created + span,
                kind,
            )
            .unwrap();

            let back = Region::loads(&region.dumps()).unwrap();
            prop_assert_eq!(back, region);
        }
    }
}
