use crate::series::PriceMethod;
use alphabot_core::timeframe_from_str;
use alphabot_indicators::pivot::PivotMethod;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("timeframe must be positive, got {0}")]
    InvalidTimeframe(i64),
    #[error("unknown timeframe label `{0}`")]
    UnknownTimeframe(String),
    #[error("depth must be at least 1")]
    InvalidDepth,
    #[error("{name} period must be at least 1")]
    InvalidPeriod { name: &'static str },
    #[error("rsi bounds must satisfy 0 <= rsi_low < rsi_high <= 1, got {low} / {high}")]
    InvalidRsiBounds { low: Decimal, high: Decimal },
    #[error("trend thresholds must lie in [0, 1] with low < high in each branch")]
    InvalidThresholds,
    #[error("bollinger deviation must be positive, got {0}")]
    InvalidDeviation(Decimal),
}

/// Configuration of one strategy sub-processor, usually loaded from TOML.
///
/// ```toml
/// timeframe = "1h"
/// depth = 20
///
/// [constants]
/// rsi_low = 0.3
/// rsi_high = 0.7
///
/// [indicators]
/// rsi = 14
/// sma = 20
/// ema = 8
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyConfig {
    /// Candle timeframe in seconds; labels such as `"15m"` are accepted too.
    #[serde(deserialize_with = "timeframe_seconds")]
    pub timeframe: i64,
    /// Minimum number of candles in the window before the cascade runs.
    pub depth: usize,
    /// Attach indicator traces to emitted signals.
    #[serde(default)]
    pub profiling: bool,
    #[serde(default)]
    pub price_method: PriceMethod,
    pub constants: Constants,
    #[serde(default)]
    pub thresholds: TrendThresholds,
    #[serde(default)]
    pub indicators: IndicatorsConfig,
    /// Weight factors of an older scoring method, kept for compatibility only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scores: Option<Scores>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Constants {
    pub rsi_low: Decimal,
    pub rsi_high: Decimal,
}

/// RSI levels of the trend classification, per branch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendThresholds {
    pub bear_high: Decimal,
    pub bear_low: Decimal,
    pub bull_high: Decimal,
    pub bull_low: Decimal,
}

impl Default for TrendThresholds {
    fn default() -> Self {
        Self {
            bear_high: dec!(0.5),
            bear_low: dec!(0.2),
            bull_high: dec!(0.8),
            bull_low: dec!(0.6),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorsConfig {
    pub rsi: usize,
    pub sma: usize,
    pub ema: usize,
    pub tomdemark: bool,
    /// Absent disables the indicator.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub atr: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pivot: Option<PivotMethod>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bollinger: Option<BollingerConfig>,
}

impl Default for IndicatorsConfig {
    fn default() -> Self {
        Self {
            rsi: 14,
            sma: 20,
            ema: 8,
            tomdemark: true,
            atr: None,
            pivot: None,
            bollinger: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BollingerConfig {
    pub period: usize,
    #[serde(default = "default_deviation")]
    pub std_dev: Decimal,
}

fn default_deviation() -> Decimal {
    Decimal::TWO
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scores {
    pub rsi_factor: Decimal,
    pub rsi_trend_factor: Decimal,
    pub ema_vwma_cross_factor: Decimal,
    pub price_vwma_factor: Decimal,
    pub hma_sma_cross_factor: Decimal,
    pub hma_vwma_cross_factor: Decimal,
    pub ema_vwma_cross_bonus: Decimal,
    pub rsi_hma_trend_div_factor: Decimal,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TimeframeValue {
    Seconds(i64),
    Label(String),
}

fn timeframe_seconds<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    match TimeframeValue::deserialize(deserializer)? {
        TimeframeValue::Seconds(seconds) => Ok(seconds),
        TimeframeValue::Label(label) => timeframe_from_str(&label).ok_or_else(|| {
            serde::de::Error::custom(ConfigError::UnknownTimeframe(label.clone()))
        }),
    }
}

impl StrategyConfig {
    /// Minimal valid configuration: default indicators, given timeframe and depth.
    pub fn new(timeframe: i64, depth: usize, constants: Constants) -> Self {
        Self {
            timeframe,
            depth,
            profiling: false,
            price_method: PriceMethod::default(),
            constants,
            thresholds: TrendThresholds::default(),
            indicators: IndicatorsConfig::default(),
            scores: None,
        }
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeframe <= 0 {
            return Err(ConfigError::InvalidTimeframe(self.timeframe));
        }
        if self.depth == 0 {
            return Err(ConfigError::InvalidDepth);
        }

        let Constants { rsi_low, rsi_high } = self.constants;
        if rsi_low < Decimal::ZERO || rsi_high > Decimal::ONE || rsi_low >= rsi_high {
            return Err(ConfigError::InvalidRsiBounds {
                low: rsi_low,
                high: rsi_high,
            });
        }

        let t = &self.thresholds;
        let in_unit = |v: Decimal| (Decimal::ZERO..=Decimal::ONE).contains(&v);
        if ![t.bear_low, t.bear_high, t.bull_low, t.bull_high]
            .into_iter()
            .all(in_unit)
            || t.bear_low >= t.bear_high
            || t.bull_low >= t.bull_high
        {
            return Err(ConfigError::InvalidThresholds);
        }

        let periods = [
            ("rsi", Some(self.indicators.rsi)),
            ("sma", Some(self.indicators.sma)),
            ("ema", Some(self.indicators.ema)),
            ("bollinger", self.indicators.bollinger.map(|b| b.period)),
            ("atr", self.indicators.atr),
        ];
        for (name, period) in periods {
            if period == Some(0) {
                return Err(ConfigError::InvalidPeriod { name });
            }
        }
        if let Some(bollinger) = self.indicators.bollinger {
            if bollinger.std_dev <= Decimal::ZERO {
                return Err(ConfigError::InvalidDeviation(bollinger.std_dev));
            }
        }

        Ok(())
    }

    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}
