mod session;

use std::{io, path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use model::{EngineConfig, Inbound};
use telemetra_core::TelemetrySource;
use telemetra_ingest_replay::{ReplayConfig, ReplaySource};
use session::HostSession;

#[derive(Parser, Debug)]
#[command(author, version, about = "Replay recorded sensor/GPS logs through the Telemetra core", long_about = None)]
struct Cli {
    /// NDJSON log of host messages (START_SESSION, SENSOR_DATA, GPS_DATA, ...)
    input: PathBuf,
    /// JSON file overriding engine tunables
    #[arg(long)]
    config: Option<PathBuf>,
    /// Where SAVE_BATCH samples are appended
    #[arg(long, default_value = "samples.ndjson")]
    samples: PathBuf,
    /// Where completed laps are appended
    #[arg(long, default_value = "laps.ndjson")]
    laps: PathBuf,
    /// Samples of an earlier run to build the reference lap from
    #[arg(long, requires = "reference_laps")]
    reference_samples: Option<PathBuf>,
    /// Laps of that earlier run
    #[arg(long, requires = "reference_samples")]
    reference_laps: Option<PathBuf>,
    /// Pace playback by message timestamps
    #[arg(long)]
    realtime: bool,
    #[arg(long, default_value_t = 1.0)]
    speedup: f64,
    /// Also print UPDATE_STATS messages
    #[arg(long)]
    stats: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(p) => iox::load_config(p)?,
        None => EngineConfig::default(),
    };

    let handle = telemetra_core::spawn(config)?;
    if let (Some(s), Some(l)) = (&cli.reference_samples, &cli.reference_laps) {
        let points = iox::load_reference(s, l)?;
        info!(points = points.len(), "reference lap from previous run");
        handle.send(Inbound::SetReferenceLap(points))?;
    }

    let store = iox::NdjsonStore::open(&cli.samples, &cli.laps)?;
    let host = Arc::new(HostSession::new(store, cli.stats));

    let tx = handle.sender();
    let (rx, engine) = handle.into_parts();
    let pump = session::pump_outbound(rx, Arc::clone(&host));

    let source = ReplaySource::new(ReplayConfig {
        path: cli.input.clone(),
        realtime: cli.realtime,
        speedup: cli.speedup,
    });
    source.run(tx).await?;

    engine.join().map_err(|_| anyhow::anyhow!("engine thread panicked"))?;
    pump.join().map_err(|_| anyhow::anyhow!("outbound thread panicked"))?
        .context("persist outbound messages")?;

    println!("{}", host.summary());
    Ok(())
}
