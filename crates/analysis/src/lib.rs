use model::*;
use serde_json::{json, Value};

pub mod delta;
pub mod filter;
pub mod fusion;
pub mod gate;

pub use delta::DeltaEngine;
pub use filter::MotionFilter;
pub use fusion::{kalman_gain, FusionEstimator, FusionState};
pub use gate::{
    CrossingOffset, GateCrossing, GateCrossingDetector, Intersection, PathFix, KINEMATIC_ROOT_WINDOW,
};

/// Distance/time profile of the fastest lap in `laps`, built from that lap's
/// persisted samples. Samples are matched on session and lap number, since a
/// store spanning several runs holds a lap 1 for each of them. Elapsed time is
/// measured from the lap's first sample; points that do not advance in
/// distance, or fall past the lap's duration, are dropped.
pub fn reference_profile(samples: &[TelemetrySample], laps: &[LapResult]) -> Vec<ReferenceLapPoint> {
    let Some(best) = laps.iter().min_by_key(|l| l.lap_time) else {
        return Vec::new();
    };

    let mut lap: Vec<&TelemetrySample> = samples
        .iter()
        .filter(|s| s.session_id == best.session_id && s.lap_number == best.lap_number)
        .collect();
    lap.sort_by_key(|s| s.timestamp);

    let t0 = match lap.first() {
        Some(s) => s.timestamp,
        None => return Vec::new(),
    };

    let mut out = Vec::with_capacity(lap.len());
    let mut last_d = f64::NEG_INFINITY;
    for s in lap {
        if s.timestamp - t0 > best.lap_time {
            break;
        }
        if s.distance <= last_d {
            continue;
        }
        last_d = s.distance;
        out.push(ReferenceLapPoint {
            distance: s.distance,
            time: (s.timestamp - t0) as f64,
        });
    }
    out
}

pub fn lap_summary(laps: &[LapResult]) -> Value {
    let best = laps.iter().map(|l| l.lap_time).min().unwrap_or(0);
    let worst = laps.iter().map(|l| l.lap_time).max().unwrap_or(0);
    let times: Vec<f64> = laps.iter().map(|l| l.lap_time as f64).collect();
    let avg = if !times.is_empty() {
        times.iter().sum::<f64>() / (times.len() as f64)
    } else {
        0.0
    };

    json!({
        "laps": laps.len(),
        "best_ms": best,
        "worst_ms": worst,
        "avg_ms": avg,
        "consistency": stddev(&times)
    })
}

fn stddev(v: &[f64]) -> f64 {
    if v.is_empty() {
        return 0.0;
    }
    let m = v.iter().sum::<f64>() / (v.len() as f64);
    let var = v.iter().map(|x| {
        let d = *x - m;
        d * d
    }).sum::<f64>() / (v.len() as f64);
    // return seconds (input was ms)
    (var.sqrt()) / 1000.0
}
