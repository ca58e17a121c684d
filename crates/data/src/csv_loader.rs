use alphabot_core::{Candle, DataError, Timestamp};
use chrono::{DateTime, NaiveDateTime};
use rust_decimal::Decimal;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

/// Load candles from a CSV file.
///
/// Expected columns (case-insensitive, flexible ordering):
/// `timestamp` (or `date`, `datetime`, `time`), `open`, `high`, `low`, `close`,
/// optional `volume` and `ended`. Rows are returned sorted by timestamp.
pub fn load_candles_from_csv(path: &Path) -> Result<Vec<Candle>, DataError> {
    if !path.exists() {
        return Err(DataError::NotFound(format!(
            "CSV file not found: {}",
            path.display()
        )));
    }
    let reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| DataError::ParseError(format!("Failed to open CSV: {}", e)))?;
    let candles = read_candles(reader)?;
    tracing::debug!(path = %path.display(), candles = candles.len(), "loaded candles");
    Ok(candles)
}

/// Same as [`load_candles_from_csv`] over any reader.
pub fn load_candles_from_reader<R: Read>(reader: R) -> Result<Vec<Candle>, DataError> {
    let reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);
    read_candles(reader)
}

/// Instrument name of a data file: its stem.
pub fn instrument_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn read_candles<R: Read>(mut reader: csv::Reader<R>) -> Result<Vec<Candle>, DataError> {
    let headers = reader
        .headers()
        .map_err(|e| DataError::ParseError(format!("Failed to read headers: {}", e)))?
        .clone();

    let col_map = resolve_candle_columns(&headers)?;

    let mut candles = Vec::new();
    for result in reader.records() {
        let record =
            result.map_err(|e| DataError::ParseError(format!("CSV record error: {}", e)))?;
        let field = |idx: usize| record.get(idx).unwrap_or_default();

        let timestamp = parse_timestamp(field(col_map.timestamp))?;
        let open = parse_decimal(field(col_map.open), "open")?;
        let high = parse_decimal(field(col_map.high), "high")?;
        let low = parse_decimal(field(col_map.low), "low")?;
        let close = parse_decimal(field(col_map.close), "close")?;
        let volume = match col_map.volume {
            Some(idx) => parse_decimal(field(idx), "volume")?,
            None => Decimal::ZERO,
        };
        let ended = match col_map.ended {
            Some(idx) => parse_bool(field(idx))?,
            None => true,
        };

        candles.push(Candle {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
            ended,
        });
    }

    candles.sort_by_key(|c| c.timestamp);
    Ok(candles)
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

struct CandleColumnMap {
    timestamp: usize,
    open: usize,
    high: usize,
    low: usize,
    close: usize,
    volume: Option<usize>,
    ended: Option<usize>,
}

fn resolve_candle_columns(headers: &csv::StringRecord) -> Result<CandleColumnMap, DataError> {
    let required = |names: &[&str], label: &str| {
        find_column(headers, names)
            .ok_or_else(|| DataError::ParseError(format!("No {} column found", label)))
    };

    Ok(CandleColumnMap {
        timestamp: required(&["timestamp", "date", "datetime", "time"], "timestamp")?,
        open: required(&["open", "o"], "open")?,
        high: required(&["high", "h"], "high")?,
        low: required(&["low", "l"], "low")?,
        close: required(&["close", "c"], "close")?,
        volume: find_column(headers, &["volume", "vol", "v"]),
        ended: find_column(headers, &["ended", "closed", "complete"]),
    })
}

fn find_column(headers: &csv::StringRecord, names: &[&str]) -> Option<usize> {
    headers
        .iter()
        .position(|header| names.contains(&header.trim().to_lowercase().as_str()))
}

fn parse_decimal(s: &str, field: &str) -> Result<Decimal, DataError> {
    Decimal::from_str(s.trim())
        .or_else(|_| Decimal::from_scientific(s.trim()))
        .map_err(|e| DataError::ParseError(format!("Failed to parse {} '{}': {}", field, s, e)))
}

fn parse_bool(s: &str) -> Result<bool, DataError> {
    match s.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        other => Err(DataError::ParseError(format!(
            "Unable to parse ended flag: '{}'",
            other
        ))),
    }
}

/// Unix seconds from RFC 3339, a handful of naive formats (UTC) or epoch seconds.
fn parse_timestamp(s: &str) -> Result<Timestamp, DataError> {
    let s = s.trim();

    if let Ok(ts) = s.parse::<i64>() {
        return Ok(ts);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.timestamp());
    }

    let formats = [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
        "%m/%d/%Y %H:%M:%S",
        "%m/%d/%Y %H:%M",
        "%Y%m%d %H:%M:%S",
    ];
    for fmt in &formats {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(naive.and_utc().timestamp());
        }
    }

    if let Some(naive) = chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
    {
        return Ok(naive.and_utc().timestamp());
    }

    Err(DataError::ParseError(format!(
        "Unable to parse timestamp: '{}'",
        s
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_load_with_mixed_headers() {
        let csv = "\
Date,Open,High,Low,Close,Vol
2024-01-01 00:01:00,101,103,100,102,7
2024-01-01 00:00:00,100,102,99,101,5
";
        let candles = load_candles_from_reader(csv.as_bytes()).unwrap();
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0].timestamp, 1_704_067_200);
        assert_eq!(candles[0].close, dec!(101));
        assert_eq!(candles[1].volume, dec!(7));
        assert!(candles.iter().all(|c| c.ended));
    }

    #[test]
    fn test_epoch_and_ended_columns() {
        let csv = "\
timestamp,open,high,low,close,ended
60,1,2,0.5,1.5,true
120,1.5,2.5,1,2,false
";
        let candles = load_candles_from_reader(csv.as_bytes()).unwrap();
        assert_eq!(candles[0].timestamp, 60);
        assert_eq!(candles[0].volume, Decimal::ZERO);
        assert!(candles[0].ended);
        assert!(!candles[1].ended);
    }

    #[test]
    fn test_timestamp_formats() {
        assert_eq!(parse_timestamp("2024-01-01T00:00:00Z").unwrap(), 1_704_067_200);
        assert_eq!(parse_timestamp("2024-01-01T01:00:00+01:00").unwrap(), 1_704_067_200);
        assert_eq!(parse_timestamp("2024-01-01").unwrap(), 1_704_067_200);
        assert_eq!(parse_timestamp("1704067200").unwrap(), 1_704_067_200);
        assert!(parse_timestamp("yesterday").is_err());
    }

    #[test]
    fn test_missing_column_is_reported() {
        let csv = "timestamp,open,high,low\n60,1,2,0.5\n";
        let err = load_candles_from_reader(csv.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("close"));
    }

    #[test]
    fn test_missing_file() {
        let err = load_candles_from_csv(Path::new("/nonexistent/BTCUSD.csv")).unwrap_err();
        assert!(matches!(err, DataError::NotFound(_)));
        assert_eq!(instrument_name(Path::new("/data/BTCUSD.csv")), "BTCUSD");
    }
}
