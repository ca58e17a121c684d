use alphabot_core::{Direction, SignalKind};
use alphabot_data::csv_loader::load_candles_from_reader;
use alphabot_engine::Replay;
use alphabot_regions::RegionSet;
use alphabot_strategies::StrategyConfig;
use rust_decimal_macros::dec;

const CONFIG: &str = r#"
timeframe = "1m"
depth = 5

[constants]
rsi_low = 0.3
rsi_high = 0.7

[indicators]
rsi = 3
sma = 4
ema = 2
tomdemark = false
"#;

const CANDLES: &str = "\
timestamp,open,high,low,close,volume
0,20,21,19,20,10
60,19,20,18,19,12
120,18,19,17,18,9
180,17,18,16,17,14
240,16,17,15,16,11
";

fn run(regions: &str) -> alphabot_engine::ReplayReport {
    let config = StrategyConfig::from_toml(CONFIG).unwrap();
    let regions = RegionSet::load_json(regions).unwrap();
    let candles = load_candles_from_reader(CANDLES.as_bytes()).unwrap();

    let mut replay = Replay::new("BTCUSD", config, regions).unwrap();
    replay.run(candles).unwrap();
    replay.into_report()
}

#[test]
fn test_exit_region_accepts_exit_signal() {
    let report = run(r#"[
        {"version": "1.0.0", "region": 1, "stage": -1, "direction": 0, "low": 15.0, "high": 17.0}
    ]"#);

    assert_eq!(report.ticks, 5);
    assert_eq!(report.accepted.len(), 1);
    let signal = &report.accepted[0];
    assert_eq!(signal.kind, SignalKind::Exit);
    assert_eq!(signal.direction, Direction::Short);
    assert_eq!(signal.price, dec!(16));
    assert_eq!(signal.timestamp, 240);
}

#[test]
fn test_entry_region_rejects_exit_signal() {
    let report = run(r#"[
        {"version": "1.0.0", "region": 1, "stage": 1, "direction": 0, "low": 15.0, "high": 17.0}
    ]"#);

    assert!(report.accepted.is_empty());
    assert_eq!(report.rejected.len(), 1);
}

#[test]
fn test_canceled_channel_lets_signals_through() {
    // a long channel canceled below 18 is purged at t=180, leaving an empty set
    let report = run(r#"[
        {"version": "1.0.0", "region": 2, "stage": 0, "direction": 1, "expiry": 86400,
         "low-a": 100.0, "high-a": 110.0, "low-b": 100.0, "high-b": 110.0,
         "cancelation": 18.0}
    ]"#);

    assert_eq!(report.deleted_regions.len(), 1);
    assert_eq!(report.accepted.len(), 1);
}
