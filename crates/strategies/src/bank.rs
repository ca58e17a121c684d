use crate::config::IndicatorsConfig;
use crate::series::PriceSeries;
use alphabot_core::{Timestamp, Trace};
use alphabot_indicators::atr::Atr;
use alphabot_indicators::bollinger::BollingerBands;
use alphabot_indicators::ema::Ema;
use alphabot_indicators::pivot::PivotPoint;
use alphabot_indicators::rsi::Rsi;
use alphabot_indicators::sma::Sma;
use alphabot_indicators::tomdemark::TomDemark;
use alphabot_indicators::Tracked;

/// Indicator states of one sub-processor.
///
/// RSI, SMA and EMA drive the trend classification and always exist; the others
/// are created only when configured.
#[derive(Debug, Clone)]
pub struct IndicatorBank {
    pub rsi: Tracked<Rsi>,
    pub sma: Tracked<Sma>,
    pub ema: Tracked<Ema>,
    pub bollinger: Option<Tracked<BollingerBands>>,
    pub atr: Option<Tracked<Atr>>,
    pub pivot: Option<Tracked<PivotPoint>>,
    pub tomdemark: Option<Tracked<TomDemark>>,
}

impl IndicatorBank {
    /// `capacity` is the per-candle history kept by every indicator.
    pub fn new(config: &IndicatorsConfig, capacity: usize) -> Self {
        Self {
            rsi: Tracked::new(Rsi::new(config.rsi), capacity),
            sma: Tracked::new(Sma::new(config.sma), capacity),
            ema: Tracked::new(Ema::new(config.ema), capacity),
            bollinger: config
                .bollinger
                .map(|b| Tracked::new(BollingerBands::new(b.period, b.std_dev), capacity)),
            atr: config.atr.map(|p| Tracked::new(Atr::new(p), capacity)),
            pivot: config.pivot.map(|m| Tracked::new(PivotPoint::new(m), capacity)),
            tomdemark: config
                .tomdemark
                .then(|| Tracked::new(TomDemark::new(), capacity)),
        }
    }

    /// Indicators read by the trend classification.
    pub fn compute_trend(&mut self, last_timestamp: Timestamp, price: &PriceSeries) {
        self.rsi.compute(last_timestamp, price.samples());
        self.sma.compute(last_timestamp, price.samples());
        self.ema.compute(last_timestamp, price.samples());
        if let Some(bollinger) = &mut self.bollinger {
            bollinger.compute(last_timestamp, price.samples());
        }
    }

    /// Candle-shaped indicators, refreshed on every tick whatever the signal.
    pub fn compute_secondary(&mut self, last_timestamp: Timestamp, price: &PriceSeries) {
        if let Some(pivot) = &mut self.pivot {
            pivot.compute(last_timestamp, price.ohlc_samples());
        }
        if let Some(atr) = &mut self.atr {
            atr.compute(last_timestamp, price.hlc_samples());
        }
        if let Some(tomdemark) = &mut self.tomdemark {
            tomdemark.compute(last_timestamp, price.hlc_samples());
        }
    }

    pub fn compute(&mut self, last_timestamp: Timestamp, price: &PriceSeries) {
        self.compute_trend(last_timestamp, price);
        self.compute_secondary(last_timestamp, price);
    }

    /// Timestamp of the last computation, `None` before the first.
    pub fn last_timestamp(&self) -> Option<Timestamp> {
        self.rsi.last_timestamp()
    }

    pub fn rsi_trace(&self) -> Trace {
        to_trace(self.rsi.trace())
    }

    pub fn sma_trace(&self) -> Trace {
        to_trace(self.sma.trace())
    }

    pub fn ema_trace(&self) -> Trace {
        to_trace(self.ema.trace())
    }

    pub fn reset(&mut self) {
        self.rsi.reset();
        self.sma.reset();
        self.ema.reset();
        if let Some(b) = &mut self.bollinger {
            b.reset();
        }
        if let Some(a) = &mut self.atr {
            a.reset();
        }
        if let Some(p) = &mut self.pivot {
            p.reset();
        }
        if let Some(t) = &mut self.tomdemark {
            t.reset();
        }
    }
}

fn to_trace((last, prev): (Option<rust_decimal::Decimal>, Option<rust_decimal::Decimal>)) -> Trace {
    Trace { last, prev }
}
