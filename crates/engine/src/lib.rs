pub mod replay;
pub mod scheduler;

pub use replay::{EngineError, Replay, ReplayReport};
pub use scheduler::{ReplayJob, Scheduler};
