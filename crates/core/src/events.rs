use crate::models::*;
use serde::{Deserialize, Serialize};

/// Events produced while replaying an instrument, tagged with the instrument name
/// so a scheduler can merge several replays into one stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstrumentEvent {
    pub instrument: String,
    pub event: Event,
}

/// Top-level event enum that flows out of a replay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    /// The sub-processor emitted a signal and the region set let it through.
    SignalAccepted(Signal),
    /// The sub-processor emitted a signal but no active region admitted it.
    SignalRejected(Signal),
    /// A region was removed from the active set (expired or cancelation price hit).
    RegionDeleted { region_id: i64, timestamp: Timestamp },
    System(SystemEvent),
}

/// Lifecycle events of a replay worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SystemEvent {
    Started { message: String },
    Stopped { message: String },
    Error { message: String },
}
