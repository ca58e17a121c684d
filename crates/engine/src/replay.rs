use alphabot_core::{Candle, DataError, Event, Signal};
use alphabot_data::CandleStore;
use alphabot_regions::{RegionError, RegionSet};
use alphabot_strategies::{ConfigError, StrategyConfig, StrategySub, StreamError, Streamer};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Data(#[from] DataError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Region(#[from] RegionError),
    #[error(transparent)]
    Stream(#[from] StreamError),
    #[error("replay worker for {instrument} failed: {message}")]
    Worker { instrument: String, message: String },
}

/// Summary of a replay.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReplayReport {
    pub instrument: String,
    /// Candles fed to the replay.
    pub ticks: usize,
    /// Ticks skipped because the window was shorter than the depth.
    pub skipped: usize,
    /// Signals produced by the sub-processor after deduplication.
    pub emitted: usize,
    pub accepted: Vec<Signal>,
    pub rejected: Vec<Signal>,
    pub deleted_regions: Vec<i64>,
    /// Telemetry frames pushed.
    pub frames: usize,
}

/// Drives one instrument: candle store, sub-processor, region gate and telemetry.
pub struct Replay {
    instrument: String,
    store: CandleStore,
    sub: StrategySub,
    regions: RegionSet,
    streamer: Option<Box<dyn Streamer + Send>>,
    perf: Decimal,
    report: ReplayReport,
}

impl Replay {
    pub fn new(
        instrument: impl Into<String>,
        config: StrategyConfig,
        regions: RegionSet,
    ) -> Result<Self, EngineError> {
        let instrument = instrument.into();
        // keep enough history for the window plus some slack for the open candle
        let store = CandleStore::with_max_len(config.depth * 4 + 8);
        let sub = StrategySub::new(config)?;
        Ok(Self {
            report: ReplayReport {
                instrument: instrument.clone(),
                ..Default::default()
            },
            instrument,
            store,
            sub,
            regions,
            streamer: None,
            perf: Decimal::ZERO,
        })
    }

    /// Publish per-candle telemetry to `streamer`.
    pub fn with_streamer(mut self, mut streamer: Box<dyn Streamer + Send>) -> Self {
        self.sub.setup_streamer(streamer.as_mut());
        self.streamer = Some(streamer);
        self
    }

    pub fn instrument(&self) -> &str {
        &self.instrument
    }

    pub fn sub(&self) -> &StrategySub {
        &self.sub
    }

    pub fn regions(&self) -> &RegionSet {
        &self.regions
    }

    pub fn regions_mut(&mut self) -> &mut RegionSet {
        &mut self.regions
    }

    /// Performance of the owning trader as a fraction, published on the `perf` channel.
    pub fn set_perf(&mut self, perf: Decimal) {
        self.perf = perf;
    }

    pub fn report(&self) -> &ReplayReport {
        &self.report
    }

    pub fn into_report(self) -> ReplayReport {
        self.report
    }

    /// Feed one candle.
    ///
    /// Regions are purged at the candle close before the tick is processed, then
    /// the signal, if any, is gated by the remaining regions.
    pub fn step(&mut self, candle: Candle) -> Result<Vec<Event>, EngineError> {
        let timestamp = candle.timestamp;
        let close = candle.close;
        self.store.push(self.sub.timeframe(), candle)?;
        self.report.ticks += 1;

        let mut events = Vec::new();

        for region in self.regions.purge(timestamp, close, close) {
            self.report.deleted_regions.push(region.id());
            events.push(Event::RegionDeleted {
                region_id: region.id(),
                timestamp,
            });
        }

        let Some(outcome) = self.sub.process(&self.store, timestamp) else {
            self.report.skipped += 1;
            return Ok(events);
        };

        if let Some(signal) = outcome.signal {
            self.report.emitted += 1;
            if self.regions.allows(timestamp, &signal) {
                info!(
                    instrument = %self.instrument,
                    direction = signal.direction.as_str(),
                    price = %signal.price,
                    timestamp,
                    "signal accepted"
                );
                self.report.accepted.push(signal.clone());
                events.push(Event::SignalAccepted(signal));
            } else {
                debug!(
                    instrument = %self.instrument,
                    price = %signal.price,
                    timestamp,
                    "signal outside every region"
                );
                self.report.rejected.push(signal.clone());
                events.push(Event::SignalRejected(signal));
            }
        }

        if let Some(streamer) = self.streamer.as_mut() {
            self.report.frames += self.sub.stream(streamer.as_mut(), self.perf)?;
        }

        Ok(events)
    }

    /// Feed every candle, stopping at the first error.
    pub fn run(
        &mut self,
        candles: impl IntoIterator<Item = Candle>,
    ) -> Result<&ReplayReport, EngineError> {
        for candle in candles {
            if let Err(e) = self.step(candle) {
                warn!(instrument = %self.instrument, error = %e, "replay stopped");
                return Err(e);
            }
        }
        info!(
            instrument = %self.instrument,
            ticks = self.report.ticks,
            emitted = self.report.emitted,
            accepted = self.report.accepted.len(),
            rejected = self.report.rejected.len(),
            "replay finished"
        );
        Ok(&self.report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alphabot_core::Direction;
    use alphabot_regions::{RangeBounds, Region, RegionDirection, Stage};
    use alphabot_strategies::config::Constants;
    use alphabot_strategies::stream::{StreamMember, StreamValue};
    use alphabot_strategies::MemoryStreamer;
    use rust_decimal_macros::dec;
    use std::sync::{Arc, Mutex};

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
        config.indicators.tomdemark = false;
        config
    }

    fn falling(n: i64) -> Vec<Candle> {
        (0..n)
            .map(|i| {
                let close = Decimal::from(20 - i);
                Candle::new(i * 60, close, close + dec!(1), close - dec!(1), close)
            })
            .collect()
    }

    fn range(low: Decimal, high: Decimal, direction: RegionDirection, cancelation: Decimal) -> Region {
        Region::range(
            0,
            Stage::Both,
            direction,
            0,
            0,
            RangeBounds {
                low,
                high,
                cancelation,
            },
        )
        .unwrap()
    }

    #[test]
    fn test_replay_without_regions_accepts() {
        let mut replay = Replay::new("BTCUSD", config(), RegionSet::new()).unwrap();
        let report = replay.run(falling(5)).unwrap();

        assert_eq!(report.ticks, 5);
        assert_eq!(report.skipped, 4);
        assert_eq!(report.emitted, 1);
        assert_eq!(report.accepted.len(), 1);
        assert_eq!(report.accepted[0].direction, Direction::Short);
        assert_eq!(report.accepted[0].price, dec!(16));
    }

    #[test]
    fn test_region_gate_rejects_outside_price() {
        let mut regions = RegionSet::new();
        regions
            .add(range(dec!(100), dec!(200), RegionDirection::Both, dec!(0)))
            .unwrap();
        let mut replay = Replay::new("BTCUSD", config(), regions).unwrap();

        let mut events = Vec::new();
        for candle in falling(5) {
            events.extend(replay.step(candle).unwrap());
        }
        assert!(matches!(events.as_slice(), [Event::SignalRejected(_)]));
        assert_eq!(replay.report().rejected.len(), 1);
        assert!(replay.report().accepted.is_empty());
    }

    #[test]
    fn test_regions_purged_on_close() {
        let mut regions = RegionSet::new();
        let id = regions
            .add(range(dec!(10), dec!(30), RegionDirection::Long, dec!(18)))
            .unwrap();
        let mut replay = Replay::new("BTCUSD", config(), regions).unwrap();

        let report = replay.run(falling(5)).unwrap();
        // close 17 at t=180 falls under the cancelation price
        assert_eq!(report.deleted_regions, vec![id]);
        // set is empty again when the signal arrives
        assert_eq!(report.accepted.len(), 1);
    }

    #[test]
    fn test_out_of_order_candle_stops_replay() {
        let mut replay = Replay::new("BTCUSD", config(), RegionSet::new()).unwrap();
        let mut candles = falling(3);
        candles.swap(1, 2);
        assert!(matches!(
            replay.run(candles),
            Err(EngineError::Data(DataError::OutOfOrder { .. }))
        ));
    }

    /// Streamer writing into a shared buffer so the test can inspect it.
    #[derive(Clone, Default)]
    struct Shared(Arc<Mutex<MemoryStreamer>>);

    impl Streamer for Shared {
        fn add_member(&mut self, member: StreamMember) {
            self.0.lock().unwrap().add_member(member);
        }

        fn members(&self) -> &[StreamMember] {
            &[]
        }

        fn update(
            &mut self,
            name: &'static str,
            value: StreamValue,
            timestamp: i64,
        ) {
            self.0.lock().unwrap().update(name, value, timestamp);
        }

        fn push(&mut self) -> Result<(), StreamError> {
            self.0.lock().unwrap().push()
        }

        fn next_timestamp(&self) -> i64 {
            self.0.lock().unwrap().next_timestamp()
        }

        fn set_next_timestamp(&mut self, timestamp: i64) {
            self.0.lock().unwrap().set_next_timestamp(timestamp);
        }
    }

    #[test]
    fn test_telemetry_frames_follow_candles() {
        let shared = Shared::default();
        let mut replay = Replay::new("BTCUSD", config(), RegionSet::new())
            .unwrap()
            .with_streamer(Box::new(shared.clone()));
        replay.run(falling(7)).unwrap();

        let sink = shared.0.lock().unwrap();
        let timestamps: Vec<i64> = sink.frames.iter().map(|f| f.timestamp).collect();
        // first processed tick sends the whole window, later ticks resend the
        // last candle and add the new one
        assert_eq!(timestamps, vec![0, 60, 120, 180, 240, 240, 300, 300, 360]);
        assert_eq!(replay.report().frames, 9);
    }
}
