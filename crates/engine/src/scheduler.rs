use crate::replay::{EngineError, Replay, ReplayReport};
use alphabot_core::{Candle, Event, InstrumentEvent, SystemEvent};
use alphabot_regions::RegionSet;
use alphabot_strategies::{JsonLinesStreamer, StrategyConfig, StreamError};
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Candles and setup of one instrument to replay.
#[derive(Debug, Clone)]
pub struct ReplayJob {
    pub instrument: String,
    pub config: StrategyConfig,
    pub regions: RegionSet,
    pub candles: Vec<Candle>,
    /// File receiving the telemetry frames as JSON lines.
    pub telemetry: Option<PathBuf>,
}

/// Runs one replay per instrument on blocking workers and merges their events.
#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    stop: Arc<AtomicBool>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask every running worker to stop after its current candle.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Replay every job concurrently. Events of all instruments are sent on `events`
    /// tagged with the instrument name; reports come back in job order.
    pub async fn run_all(
        &self,
        jobs: Vec<ReplayJob>,
        events: mpsc::Sender<InstrumentEvent>,
    ) -> Vec<Result<ReplayReport, EngineError>> {
        let mut handles = Vec::with_capacity(jobs.len());

        for job in jobs {
            let instrument = job.instrument.clone();
            let stop = self.stop.clone();
            let events = events.clone();
            let handle = tokio::task::spawn_blocking(move || run_job(job, stop, events));
            handles.push((instrument, handle));
        }
        drop(events);

        let mut reports = Vec::with_capacity(handles.len());
        for (instrument, handle) in handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => {
                    error!(instrument = %instrument, error = %e, "replay worker panicked");
                    Err(EngineError::Worker {
                        instrument,
                        message: e.to_string(),
                    })
                }
            };
            reports.push(result);
        }
        reports
    }
}

fn run_job(
    job: ReplayJob,
    stop: Arc<AtomicBool>,
    events: mpsc::Sender<InstrumentEvent>,
) -> Result<ReplayReport, EngineError> {
    let ReplayJob {
        instrument,
        config,
        regions,
        candles,
        telemetry,
    } = job;

    let send = |event: Event| {
        // a closed receiver only means nobody listens anymore
        let _ = events.blocking_send(InstrumentEvent {
            instrument: instrument.clone(),
            event,
        });
    };

    let mut replay = match open_replay(&instrument, config, regions, telemetry) {
        Ok(replay) => replay,
        Err(e) => {
            send(Event::System(SystemEvent::Error {
                message: e.to_string(),
            }));
            return Err(e);
        }
    };

    info!(instrument = %instrument, candles = candles.len(), "replay started");
    send(Event::System(SystemEvent::Started {
        message: format!("{} candles", candles.len()),
    }));

    for candle in candles {
        if stop.load(Ordering::SeqCst) {
            warn!(instrument = %instrument, "replay interrupted");
            break;
        }
        match replay.step(candle) {
            Ok(step_events) => step_events.into_iter().for_each(&send),
            Err(e) => {
                error!(instrument = %instrument, error = %e, "replay failed");
                send(Event::System(SystemEvent::Error {
                    message: e.to_string(),
                }));
                return Err(e);
            }
        }
    }

    let report = replay.into_report();
    send(Event::System(SystemEvent::Stopped {
        message: format!(
            "{} ticks, {} accepted, {} rejected",
            report.ticks,
            report.accepted.len(),
            report.rejected.len()
        ),
    }));
    Ok(report)
}

fn open_replay(
    instrument: &str,
    config: StrategyConfig,
    regions: RegionSet,
    telemetry: Option<PathBuf>,
) -> Result<Replay, EngineError> {
    let replay = Replay::new(instrument, config, regions)?;
    let Some(path) = telemetry else {
        return Ok(replay);
    };
    let file = File::create(&path).map_err(StreamError::from)?;
    info!(instrument, path = %path.display(), "writing telemetry");
    Ok(replay.with_streamer(Box::new(JsonLinesStreamer::new(BufWriter::new(file)))))
}
