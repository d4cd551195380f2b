use anyhow::Context;
use std::path::PathBuf;
use tokio::{fs::File, io::{AsyncBufReadExt, BufReader}, time::{self, Duration, Instant}};
use tracing::{info, warn};
use model::Inbound;
use telemetra_core::*;

#[derive(Clone, Debug)]
pub struct ReplayConfig {
    /// NDJSON log, one host message per line
    pub path: PathBuf,
    /// Sleep between messages so sensor timestamps play back at wall-clock pace
    pub realtime: bool,
    pub speedup: f64,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self { path: "session.ndjson".into(), realtime: false, speedup: 1.0 }
    }
}

pub struct ReplaySource {
    cfg: ReplayConfig
}

impl ReplaySource {
    pub fn new(cfg: ReplayConfig) -> Self { Self { cfg } }
}

#[async_trait::async_trait]
impl TelemetrySource for ReplaySource {
    async fn run(&self, tx: InboundTx) -> Result<(), CoreError> {
        let file = File::open(&self.cfg.path).await
            .with_context(|| format!("open {}", self.cfg.path.display()))?;
        let mut lines = BufReader::new(file).lines();
        let mut pacer = Pacer::new(self.cfg.speedup);
        let (mut sent, mut skipped, mut line_no) = (0usize, 0usize, 0usize);

        while let Some(line) = lines.next_line().await.context("read replay log")? {
            line_no += 1;
            if line.trim().is_empty() { continue; }
            let msg = match decode_inbound(&line) {
                Ok(m) => m,
                Err(e) => {
                    warn!(line = line_no, error = %e, "skipping replay line");
                    skipped += 1;
                    continue;
                }
            };
            if self.cfg.realtime {
                if let Some(ts) = message_timestamp(&msg) {
                    pacer.wait_for(ts).await;
                }
            }
            tx.send(msg).map_err(|_| CoreError::ChannelClosed)?;
            sent += 1;
        }
        info!(sent, skipped, path = %self.cfg.path.display(), "replay finished");
        Ok(())
    }
}

fn message_timestamp(msg: &Inbound) -> Option<u64> {
    match msg {
        Inbound::SensorData(r) => Some(r.timestamp),
        Inbound::GpsData(f) => Some(f.timestamp),
        _ => None,
    }
}

/// Maps log timestamps (ms) onto the tokio clock.
struct Pacer {
    speedup: f64,
    origin: Option<(u64, Instant)>,
}

impl Pacer {
    fn new(speedup: f64) -> Self {
        let speedup = if speedup.is_finite() && speedup > 0.0 { speedup } else { 1.0 };
        Self { speedup, origin: None }
    }

    fn deadline(&mut self, ts: u64) -> Instant {
        let (t0, start) = *self.origin.get_or_insert((ts, Instant::now()));
        let offset_ms = ts.saturating_sub(t0) as f64 / self.speedup;
        start + Duration::from_secs_f64(offset_ms / 1000.0)
    }

    async fn wait_for(&mut self, ts: u64) {
        let deadline = self.deadline(ts);
        if deadline > Instant::now() {
            time::sleep_until(deadline).await;
        }
    }
}
