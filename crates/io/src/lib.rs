use anyhow::{Context, Result};
use std::{
    fs::{File, OpenOptions},
    io::{BufRead, BufWriter, Write},
    path::{Path, PathBuf},
};
use serde::{de::DeserializeOwned, Serialize};
use tracing::warn;
use model::*;

/// Append-only NDJSON store for emitted samples and lap results.
pub struct NdjsonStore {
    samples_path: PathBuf,
    samples: BufWriter<File>,
    laps: BufWriter<File>,
}

impl NdjsonStore {
    pub fn open(samples_path: &Path, laps_path: &Path) -> Result<Self> {
        Ok(Self {
            samples_path: samples_path.to_path_buf(),
            samples: BufWriter::new(open_append(samples_path)?),
            laps: BufWriter::new(open_append(laps_path)?),
        })
    }

    pub fn append_batch(&mut self, batch: &[TelemetrySample]) -> Result<()> {
        for s in batch {
            write_line(&mut self.samples, s)?;
        }
        self.samples.flush()
            .with_context(|| format!("flush {}", self.samples_path.display()))?;
        Ok(())
    }

    pub fn append_lap(&mut self, lap: &LapResult) -> Result<()> {
        write_line(&mut self.laps, lap)?;
        self.laps.flush()?;
        Ok(())
    }
}

fn open_append(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open {}", path.display()))
}

fn write_line<T: Serialize>(w: &mut impl Write, v: &T) -> Result<()> {
    let s = serde_json::to_string(v)?;
    writeln!(w, "{}", s)?;
    Ok(())
}

pub fn import_samples(path: &Path) -> Result<Vec<TelemetrySample>> {
    import_ndjson(path)
}

pub fn import_laps(path: &Path) -> Result<Vec<LapResult>> {
    import_ndjson(path)
}

/// Lines that fail to parse are skipped with a warning, so a file cut short
/// by a crash still loads.
fn import_ndjson<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let rdr = std::io::BufReader::new(f);
    let mut out = vec![];
    for (n, line) in rdr.lines().enumerate() {
        let s = line?;
        if s.trim().is_empty() {
            continue;
        }
        match serde_json::from_str(&s) {
            Ok(v) => out.push(v),
            Err(e) => warn!(path = %path.display(), line = n + 1, error = %e, "skipping record"),
        }
    }
    Ok(out)
}

/// Reference profile of the fastest lap recorded in a previous run.
pub fn load_reference(samples_path: &Path, laps_path: &Path) -> Result<Vec<ReferenceLapPoint>> {
    let samples = import_samples(samples_path)?;
    let laps = import_laps(laps_path)?;
    Ok(analysis::reference_profile(&samples, &laps))
}

pub fn load_config(path: &Path) -> Result<EngineConfig> {
    let f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let cfg = serde_json::from_reader(std::io::BufReader::new(f))
        .with_context(|| format!("parse {}", path.display()))?;
    Ok(cfg)
}
