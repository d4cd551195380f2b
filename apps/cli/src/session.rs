use std::thread::{self, JoinHandle};
use anyhow::Result;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tracing::debug;

use model::*;
use telemetra_core::OutboundRx;
use analysis as an;

pub struct HostSession {
    pub inner: Mutex<Inner>,
}

pub struct Inner {
    pub store: iox::NdjsonStore,
    pub laps: Vec<LapResult>,
    pub samples: usize,
    pub print_stats: bool,
}

impl HostSession {
    pub fn new(store: iox::NdjsonStore, print_stats: bool) -> Self { Self { inner: Mutex::new(Inner {
        store,
        laps: Vec::new(),
        samples: 0,
        print_stats,
    }) } }

    pub fn summary(&self) -> Value {
        let inner = self.inner.lock();
        let mut v = an::lap_summary(&inner.laps);
        v["samples"] = json!(inner.samples);
        v
    }
}

impl Inner {
    /// Persist what needs persisting and echo events to stdout.
    pub fn feed(&mut self, msg: &Outbound) -> Result<()> {
        match msg {
            Outbound::SaveBatch(batch) => {
                self.store.append_batch(batch)?;
                self.samples += batch.len();
                debug!(len = batch.len(), total = self.samples, "batch persisted");
                return Ok(());
            }
            Outbound::LapCompleted(lap) => {
                self.store.append_lap(lap)?;
                self.laps.push(*lap);
            }
            Outbound::UpdateStats(_) if !self.print_stats => return Ok(()),
            _ => {}
        }
        println!("{}", serde_json::to_string(msg)?);
        Ok(())
    }
}

pub fn pump_outbound(rx: OutboundRx, sess: std::sync::Arc<HostSession>) -> JoinHandle<Result<()>> {
    thread::spawn(move || {
        for msg in rx.iter() {
            sess.inner.lock().feed(&msg)?;
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn laps_and_samples_reach_the_store() {
        let dir = std::env::temp_dir();
        let sp = dir.join(format!("telemetra-cli-{}-samples.ndjson", std::process::id()));
        let lp = dir.join(format!("telemetra-cli-{}-laps.ndjson", std::process::id()));
        let _ = std::fs::remove_file(&sp);
        let _ = std::fs::remove_file(&lp);

        let host = Arc::new(HostSession::new(iox::NdjsonStore::open(&sp, &lp).unwrap(), false));
        let (tx, rx) = telemetra_core::channel::<Outbound>();
        let pump = pump_outbound(rx, Arc::clone(&host));
        tx.send(Outbound::LapCompleted(LapResult { session_id: 1, lap_number: 1, lap_time: 61_000, is_best: true })).unwrap();
        tx.send(Outbound::LapCompleted(LapResult { session_id: 1, lap_number: 2, lap_time: 59_000, is_best: true })).unwrap();
        drop(tx);
        pump.join().unwrap().unwrap();

        let summary = host.summary();
        assert_eq!(summary["laps"], 2);
        assert_eq!(summary["best_ms"], 59_000);
        assert_eq!(summary["samples"], 0);
        assert_eq!(iox::import_laps(&lp).unwrap().len(), 2);
    }
}
