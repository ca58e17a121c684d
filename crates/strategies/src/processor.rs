use crate::bank::IndicatorBank;
use crate::cascade::{self, CascadeInput, Decision};
use crate::config::{ConfigError, StrategyConfig};
use crate::dedup::SignalDedup;
use crate::series::{PriceSeries, VolumeSeries};
use crate::stream::{StreamError, StreamMember, StreamValue, Streamer};
use alphabot_core::{Candle, CandleSource, Direction, Signal, Timestamp};
use rust_decimal::Decimal;
use tracing::{debug, trace};

/// Result of one processed tick.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessOutcome {
    /// Signal that survived deduplication.
    pub signal: Option<Signal>,
    pub level1: i8,
    pub trend: i8,
    pub can_long: bool,
    pub can_short: bool,
    /// Timestamp of the last candle of the processed window.
    pub last_timestamp: Timestamp,
}

/// Trend-setup sub-processor of one instrument and timeframe.
///
/// Each tick pulls the candle window from the source, refreshes the indicator
/// bank, runs the rule cascade and deduplicates the resulting exit signal.
#[derive(Debug, Clone)]
pub struct StrategySub {
    config: StrategyConfig,
    price: PriceSeries,
    volume: VolumeSeries,
    bank: IndicatorBank,
    dedup: SignalDedup,
    /// Start of the next candle to consume; only moves forward.
    next_timestamp: Timestamp,
}

impl StrategySub {
    /// Fails when `config` does not validate.
    pub fn new(config: StrategyConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        // the window holds `depth` closed candles plus the open one
        let capacity = config.depth * 2 + 1;
        Ok(Self {
            price: PriceSeries::new(config.price_method),
            volume: VolumeSeries::new(),
            bank: IndicatorBank::new(&config.indicators, capacity),
            dedup: SignalDedup::new(),
            next_timestamp: 0,
            config,
        })
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    pub fn timeframe(&self) -> i64 {
        self.config.timeframe
    }

    pub fn depth(&self) -> usize {
        self.config.depth
    }

    pub fn next_timestamp(&self) -> Timestamp {
        self.next_timestamp
    }

    pub fn bank(&self) -> &IndicatorBank {
        &self.bank
    }

    pub fn price(&self) -> &PriceSeries {
        &self.price
    }

    pub fn volume(&self) -> &VolumeSeries {
        &self.volume
    }

    pub fn last_signal(&self) -> Option<&Signal> {
        self.dedup.last()
    }

    /// Process the tick at `timestamp`.
    ///
    /// Returns `None`, touching no state, while the window is shorter than the
    /// configured depth.
    pub fn process<S: CandleSource>(
        &mut self,
        source: &S,
        timestamp: Timestamp,
    ) -> Option<ProcessOutcome> {
        let tf = self.config.timeframe;
        let from = self.next_timestamp - self.config.depth as i64 * tf;
        let candles = source.candles_from(tf, from);

        if candles.len() < self.config.depth {
            trace!(
                timeframe = tf,
                available = candles.len(),
                depth = self.config.depth,
                "not enough candles"
            );
            return None;
        }
        let last = candles.last()?;
        let last_timestamp = last.timestamp;

        self.price.compute(last_timestamp, &candles);
        self.volume.compute(last_timestamp, &candles);

        let (decision, candidate) = self.process1(timestamp, last_timestamp, &candles);

        let cursor = if last.ended {
            last_timestamp + tf
        } else {
            last_timestamp
        };
        self.next_timestamp = self.next_timestamp.max(cursor);

        let signal = candidate.and_then(|signal| self.dedup.admit(signal));
        let signal = signal.map(|mut signal| {
            if self.config.profiling {
                signal.add_condition("price", self.price.trace());
                signal.add_condition("rsi", self.bank.rsi_trace());
                signal.add_condition("sma", self.bank.sma_trace());
                signal.add_condition("ema", self.bank.ema_trace());
            }
            debug!(
                timeframe = tf,
                timestamp,
                direction = signal.direction.as_str(),
                price = %signal.price,
                level1 = decision.level1,
                "exit signal"
            );
            signal
        });

        Some(ProcessOutcome {
            signal,
            level1: decision.level1,
            trend: decision.trend,
            can_long: decision.can_long(),
            can_short: decision.can_short(),
            last_timestamp,
        })
    }

    /// Refresh the indicators over the window and run the rule cascade.
    ///
    /// Returns the decision and the candidate signal before deduplication.
    pub fn process1(
        &mut self,
        timestamp: Timestamp,
        last_timestamp: Timestamp,
        candles: &[Candle],
    ) -> (Decision, Option<Signal>) {
        self.bank.compute(last_timestamp, &self.price);

        let input = CascadeInput {
            rsi: self.bank.rsi.last(),
            sma: self.bank.sma.last(),
            ema: self.bank.ema.last(),
            setup: self.bank.tomdemark.as_ref().and_then(|td| td.last()),
        };
        let decision = cascade::run(&input, &self.config.thresholds);

        let close = candles.last().map(|c| c.close);
        let candidate = decision
            .exit
            .zip(close)
            .map(|(direction, price)| self.exit_signal(timestamp, direction, price));

        (decision, candidate)
    }

    fn exit_signal(&self, timestamp: Timestamp, direction: Direction, price: Decimal) -> Signal {
        Signal::exit(self.config.timeframe, timestamp, direction, price)
    }

    /// Declare the telemetry channels and align the sink cursor.
    pub fn setup_streamer<T: Streamer + ?Sized>(&self, streamer: &mut T) {
        streamer.add_member(StreamMember::marker("begin"));

        streamer.add_member(StreamMember::ohlc("ohlc"));
        streamer.add_member(StreamMember::float("price", 0));
        streamer.add_member(StreamMember::float_bar("volume", 1));

        streamer.add_member(StreamMember::float("rsi-low", 2));
        streamer.add_member(StreamMember::float("rsi-high", 2));
        streamer.add_member(StreamMember::float("rsi", 2));

        streamer.add_member(StreamMember::float("sma", 0));
        streamer.add_member(StreamMember::float("ema", 0));

        streamer.add_member(StreamMember::float("perf", 3));

        streamer.add_member(StreamMember::marker("end"));

        streamer.set_next_timestamp(self.next_timestamp);
    }

    /// Candles the sink has not received yet, bounded by the current window.
    pub fn stream_delta(&self, streamer_timestamp: Timestamp) -> usize {
        let tf = self.config.timeframe;
        let behind = (self.next_timestamp - streamer_timestamp).div_euclid(tf) + 1;
        usize::try_from(behind).unwrap_or(0).min(self.price.len())
    }

    /// Push one frame per candle the sink is missing, then advance its cursor.
    ///
    /// `perf` is the performance of the owning trader as a fraction. Returns the
    /// number of frames pushed.
    pub fn stream<T: Streamer + ?Sized>(
        &self,
        streamer: &mut T,
        perf: Decimal,
    ) -> Result<usize, StreamError> {
        let delta = self.stream_delta(streamer.next_timestamp());
        let len = self.price.len();
        let constants = self.config.constants;
        let perf = perf * Decimal::ONE_HUNDRED;

        for back in (0..delta).rev() {
            let i = len - 1 - back;
            let ts = self.price.timestamp[i];

            streamer.update("begin", StreamValue::Timestamp(ts), ts);

            let ohlc = self.price.ohlc(i);
            streamer.update(
                "ohlc",
                StreamValue::Ohlc([ohlc.open, ohlc.high, ohlc.low, ohlc.close]),
                ts,
            );
            streamer.update("price", StreamValue::Float(self.price.prices[i]), ts);
            if let Some(volume) = self.volume.volumes.get(i) {
                streamer.update("volume", StreamValue::Float(*volume), ts);
            }

            streamer.update("rsi-low", StreamValue::Float(constants.rsi_low), ts);
            streamer.update("rsi-high", StreamValue::Float(constants.rsi_high), ts);

            let series = [
                ("rsi", self.bank.rsi.back(back)),
                ("sma", self.bank.sma.back(back)),
                ("ema", self.bank.ema.back(back)),
            ];
            for (name, value) in series {
                if let Some(value) = value {
                    streamer.update(name, StreamValue::Float(value), ts);
                }
            }

            streamer.update("perf", StreamValue::Float(perf), ts);
            streamer.update("end", StreamValue::Timestamp(ts), ts);

            streamer.push()?;
        }

        streamer.set_next_timestamp(self.next_timestamp);
        Ok(delta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Constants;
    use crate::stream::MemoryStreamer;
    use alphabot_core::SignalKind;
    use rust_decimal_macros::dec;

    /// Candle source over a plain vector.
    #[derive(Default)]
    struct Window(Vec<Candle>);

    impl CandleSource for Window {
        fn candles_from(&self, _timeframe: i64, from: Timestamp) -> Vec<Candle> {
            self.0.iter().filter(|c| c.timestamp >= from).cloned().collect()
        }

        fn last_candles(&self, _timeframe: i64, depth: usize) -> Vec<Candle> {
            let skip = self.0.len().saturating_sub(depth);
            self.0[skip..].to_vec()
        }
    }

    fn candle(ts: Timestamp, close: i64) -> Candle {
        let close = Decimal::from(close);
        Candle::new(ts, close, close + dec!(1), close - dec!(1), close).with_volume(dec!(5))
    }

    fn config() -> StrategyConfig {
        let mut config = StrategyConfig::new(
            60,
            5,
            Constants {
                rsi_low: dec!(0.3),
                rsi_high: dec!(0.7),
            },
        );
        config.indicators.rsi = 3;
        config.indicators.sma = 4;
        config.indicators.ema = 2;
        config
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut zero_period = config();
        zero_period.indicators.sma = 0;
        assert!(matches!(
            StrategySub::new(zero_period),
            Err(ConfigError::InvalidPeriod { name: "sma" })
        ));

        let mut zero_timeframe = config();
        zero_timeframe.timeframe = 0;
        assert!(matches!(
            StrategySub::new(zero_timeframe),
            Err(ConfigError::InvalidTimeframe(0))
        ));
    }

    #[test]
    fn test_insufficient_depth_leaves_state_untouched() {
        let mut sub = StrategySub::new(config()).unwrap();
        let window = Window((0..4).map(|i| candle(i * 60, 20 - i)).collect());

        assert!(sub.process(&window, 180).is_none());
        assert_eq!(sub.bank().last_timestamp(), None);
        assert!(sub.bank().rsi.is_empty());
        assert!(sub.price().is_empty());
        assert_eq!(sub.next_timestamp(), 0);
    }

    #[test]
    fn test_bear_branch_oversold_exits_short() {
        let mut sub = StrategySub::new(config()).unwrap();
        let mut window = Window((0..4).map(|i| candle(i * 60, 20 - i)).collect());
        assert!(sub.process(&window, 180).is_none());

        window.0.push(candle(240, 16));
        let outcome = sub.process(&window, 240).unwrap();

        // strictly falling closes: RSI 0, EMA under SMA
        assert_eq!(sub.bank().rsi.last(), Some(Decimal::ZERO));
        assert!(sub.bank().ema.last().unwrap() < sub.bank().sma.last().unwrap());
        assert_eq!(outcome.level1, 1);
        assert_eq!(outcome.trend, 1);
        assert!(outcome.can_long);
        assert!(!outcome.can_short);

        let signal = outcome.signal.unwrap();
        assert_eq!(signal.kind, SignalKind::Exit);
        assert_eq!(signal.direction, Direction::Short);
        assert_eq!(signal.price, dec!(16));
        assert_eq!(signal.timeframe, 60);
        assert!(signal.conditions.is_empty());
        assert_eq!(sub.next_timestamp(), 300);
    }

    #[test]
    fn test_repeated_tick_is_deduplicated_and_stable() {
        let mut sub = StrategySub::new(config()).unwrap();
        let window = Window((0..5).map(|i| candle(i * 60, 20 - i)).collect());

        let first = sub.process(&window, 250).unwrap();
        assert!(first.signal.is_some());
        let rsi = sub.bank().rsi.trace();

        let second = sub.process(&window, 250).unwrap();
        assert!(second.signal.is_none());
        assert_eq!(second.level1, first.level1);
        assert_eq!(sub.bank().rsi.trace(), rsi);
        assert_eq!(sub.bank().rsi.len(), 5);
    }

    #[test]
    fn test_open_candle_keeps_cursor() {
        let mut sub = StrategySub::new(config()).unwrap();
        let mut candles: Vec<Candle> = (0..4).map(|i| candle(i * 60, 20 - i)).collect();
        candles.push(candle(240, 16).in_progress());
        let window = Window(candles);

        sub.process(&window, 250).unwrap();
        assert_eq!(sub.next_timestamp(), 240);
    }

    #[test]
    fn test_tomdemark_setup_overrides_trend() {
        let mut config = config();
        config.depth = 9;
        let mut sub = StrategySub::new(config).unwrap();
        // falling closes, TD buy setup reaches 5 on the last candle
        let window = Window((0..9).map(|i| candle(i * 60, 40 - i)).collect());

        let outcome = sub.process(&window, 480).unwrap();
        let setup = sub.bank().tomdemark.as_ref().unwrap().last().unwrap();
        assert_eq!((setup.count, setup.direction), (5, -1));
        // trend alone would exit shorts
        assert_eq!(outcome.level1, 1);
        assert_eq!(outcome.signal.unwrap().direction, Direction::Long);
    }

    #[test]
    fn test_profiling_attaches_traces() {
        let mut config = config();
        config.profiling = true;
        let mut sub = StrategySub::new(config).unwrap();
        let window = Window((0..5).map(|i| candle(i * 60, 20 - i)).collect());

        let signal = sub.process(&window, 240).unwrap().signal.unwrap();
        let keys: Vec<_> = signal.conditions.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["ema", "price", "rsi", "sma"]);
        assert_eq!(signal.conditions["price"].last, Some(dec!(16)));
        assert_eq!(signal.conditions["price"].prev, Some(dec!(17)));
    }

    #[test]
    fn test_stream_emits_missing_candles_once() {
        let mut sub = StrategySub::new(config()).unwrap();
        let mut window = Window((0..5).map(|i| candle(i * 60, 20 - i)).collect());
        let mut streamer = MemoryStreamer::new();
        sub.setup_streamer(&mut streamer);
        assert_eq!(streamer.members().len(), 11);

        sub.process(&window, 240).unwrap();
        // sink cursor at 0, next candle at 300: every window candle is sent
        assert_eq!(sub.stream(&mut streamer, dec!(0.015)).unwrap(), 5);
        assert_eq!(streamer.next_timestamp(), 300);

        let last = streamer.frames.last().unwrap();
        assert_eq!(last.timestamp, 240);
        assert_eq!(last.values["price"], StreamValue::Float(dec!(16)));
        assert_eq!(last.values["perf"], StreamValue::Float(dec!(1.5)));
        assert_eq!(last.values["rsi"], StreamValue::Float(Decimal::ZERO));
        assert_eq!(last.values["rsi-high"], StreamValue::Float(dec!(0.7)));
        // indicators not ready on the first candle are left out
        assert!(!streamer.frames[0].values.contains_key("rsi"));

        window.0.push(candle(300, 17));
        sub.process(&window, 300).unwrap();
        // one new candle, plus the last one re-sent
        assert_eq!(sub.stream(&mut streamer, Decimal::ZERO).unwrap(), 2);
        assert_eq!(streamer.frames.len(), 7);
        assert_eq!(streamer.frames[6].timestamp, 300);
    }

    #[test]
    fn test_stream_delta_never_negative() {
        let sub = StrategySub::new(config()).unwrap();
        assert_eq!(sub.stream_delta(10_000), 0);
        assert_eq!(sub.stream_delta(0), 0);
    }
}
