pub mod bank;
pub mod cascade;
pub mod config;
pub mod dedup;
pub mod processor;
pub mod series;
pub mod stream;

pub use bank::IndicatorBank;
pub use config::{ConfigError, StrategyConfig};
pub use dedup::SignalDedup;
pub use processor::{ProcessOutcome, StrategySub};
pub use stream::{JsonLinesStreamer, MemoryStreamer, StreamError, Streamer};
