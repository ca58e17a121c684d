use alphabot_core::{Event, InstrumentEvent, SystemEvent};
use alphabot_data::csv_loader;
use alphabot_engine::{ReplayJob, ReplayReport, Scheduler};
use alphabot_regions::RegionSet;
use alphabot_strategies::StrategyConfig;
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "alphabot")]
#[command(about = "Replay candle history through the trend setup strategy and its regions")]
#[command(version)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", env = "ALPHABOT_LOG_LEVEL")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay one or more CSV files, one instrument per file
    Replay {
        /// Strategy configuration (TOML)
        #[arg(short, long)]
        config: PathBuf,

        /// CSV candle files; the file stem names the instrument
        #[arg(short, long, num_args = 1.., required = true)]
        data: Vec<PathBuf>,

        /// Region set (JSON array of region records) applied to every instrument
        #[arg(short, long)]
        regions: Option<PathBuf>,

        /// Directory receiving one `<instrument>.jsonl` telemetry file per instrument
        #[arg(short, long)]
        telemetry: Option<PathBuf>,

        /// Print the reports as JSON instead of a summary
        #[arg(long)]
        json: bool,
    },

    /// Validate a region file and describe its regions
    Regions {
        /// Region set (JSON array of region records)
        file: PathBuf,
    },

    /// Validate a strategy configuration file
    CheckConfig {
        /// Strategy configuration (TOML)
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    fmt().with_env_filter(filter).with_target(false).init();

    match cli.command {
        Commands::Replay {
            config,
            data,
            regions,
            telemetry,
            json,
        } => run_replay(config, data, regions, telemetry, json).await?,
        Commands::Regions { file } => describe_regions(&file)?,
        Commands::CheckConfig { file } => check_config(&file)?,
    }

    Ok(())
}

async fn run_replay(
    config_path: PathBuf,
    data: Vec<PathBuf>,
    regions_path: Option<PathBuf>,
    telemetry: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    let config = StrategyConfig::from_file(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    let regions = match &regions_path {
        Some(path) => load_regions(path)?,
        None => RegionSet::new(),
    };
    if let Some(dir) = &telemetry {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating telemetry directory {}", dir.display()))?;
    }

    let mut jobs = Vec::with_capacity(data.len());
    for path in &data {
        let instrument = csv_loader::instrument_name(path);
        let candles = csv_loader::load_candles_from_csv(path)?;
        if candles.is_empty() {
            bail!("No candles loaded from {}", path.display());
        }
        tracing::info!(
            instrument = %instrument,
            candles = candles.len(),
            data = %path.display(),
            "Loaded historical data"
        );
        jobs.push(ReplayJob {
            telemetry: telemetry
                .as_ref()
                .map(|dir| dir.join(format!("{instrument}.jsonl"))),
            instrument,
            config: config.clone(),
            regions: regions.clone(),
            candles,
        });
    }

    let scheduler = Scheduler::new();
    let interrupt = scheduler.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, stopping replays");
            interrupt.stop();
        }
    });

    let (tx, rx) = mpsc::channel(256);
    let printer = tokio::spawn(print_events(rx, !json));
    let results = scheduler.run_all(jobs, tx).await;
    printer.await?;

    let mut reports = Vec::with_capacity(results.len());
    let mut failed = 0;
    for result in results {
        match result {
            Ok(report) => reports.push(report),
            Err(e) => {
                tracing::error!(error = %e, "Replay failed");
                failed += 1;
            }
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        reports.iter().for_each(print_report);
    }

    if failed > 0 {
        bail!("{failed} replay(s) failed");
    }
    Ok(())
}

async fn print_events(mut rx: mpsc::Receiver<InstrumentEvent>, verbose: bool) {
    while let Some(InstrumentEvent { instrument, event }) = rx.recv().await {
        if !verbose {
            continue;
        }
        match event {
            Event::SignalAccepted(signal) => println!(
                "{instrument} {} {:?} {} @ {}",
                signal.timestamp,
                signal.kind,
                signal.direction.as_str(),
                signal.price
            ),
            Event::RegionDeleted {
                region_id,
                timestamp,
            } => println!("{instrument} {timestamp} region {region_id} deleted"),
            Event::System(SystemEvent::Error { message }) => {
                eprintln!("{instrument} error: {message}")
            }
            Event::SignalRejected(_) | Event::System(_) => {}
        }
    }
}

fn print_report(report: &ReplayReport) {
    let sep = "=".repeat(60);
    println!("\n{sep}");
    println!("  REPLAY RESULTS: {}", report.instrument);
    println!("{sep}");
    println!("  Candles:         {}", report.ticks);
    println!("  Skipped:         {}", report.skipped);
    println!("  Signals:         {}", report.emitted);
    println!("  Accepted:        {}", report.accepted.len());
    println!("  Rejected:        {}", report.rejected.len());
    println!("  Regions deleted: {}", report.deleted_regions.len());
    if report.frames > 0 {
        println!("  Telemetry:       {} frames", report.frames);
    }
    println!("{sep}\n");
}

fn load_regions(path: &Path) -> Result<RegionSet> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let regions =
        RegionSet::load_json(&content).with_context(|| format!("loading {}", path.display()))?;
    Ok(regions)
}

fn describe_regions(path: &Path) -> Result<()> {
    let regions = load_regions(path)?;
    if regions.is_empty() {
        println!("No regions in {}", path.display());
        return Ok(());
    }
    for region in regions.iter() {
        println!("#{} {}", region.id(), region.str_info());
    }
    Ok(())
}

fn check_config(path: &Path) -> Result<()> {
    let config = StrategyConfig::from_file(path)
        .with_context(|| format!("loading {}", path.display()))?;
    println!("{} is valid", path.display());
    println!("{}", config.to_toml()?);
    Ok(())
}
