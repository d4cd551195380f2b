use serde::{Deserialize, Serialize};

mod config;
mod message;

pub use config::*;
pub use message::*;

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

/// Timing line between two geographic endpoints.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq)]
pub struct Gate {
    pub p1: GeoPoint,
    pub p2: GeoPoint,
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub enum TrackType {
    Circuit,
    Sprint,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
    pub session_id: u64,
    pub track_type: TrackType,
    #[serde(default)]
    pub start_gate: Option<Gate>,
    #[serde(default)]
    pub finish_gate: Option<Gate>,
}

impl SessionConfig {
    /// Gate that ends a lap. A single-line circuit only names one gate.
    pub fn finish(&self) -> Option<Gate> {
        self.finish_gate.or(self.start_gate)
    }

    /// Gate that arms the timer on the first pass.
    pub fn start(&self) -> Option<Gate> {
        self.start_gate.or(self.finish_gate)
    }
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq)]
pub struct ReferenceLapPoint {
    /// meters since lap start
    pub distance: f64,
    /// ms since lap start
    pub time: f64,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TelemetrySample {
    pub session_id: u64,
    pub timestamp: u64,
    pub lap_number: u32,
    #[serde(default)]
    pub position: Option<GeoPoint>,
    pub speed: f64,
    #[serde(default)]
    pub raw_speed: Option<f64>,
    pub distance: f64,
    pub accel_x: f64,
    pub accel_y: f64,
    pub g_lat: f64,
    pub g_long: f64,
    pub g_sum: f64,
    pub variance: f64,
    pub kalman_gain: f64,
    pub delta: f64,
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LapResult {
    /// Owning session. Lap numbers restart at 1 in every session.
    #[serde(default)]
    pub session_id: u64,
    pub lap_number: u32,
    pub lap_time: u64,
    pub is_best: bool,
}
