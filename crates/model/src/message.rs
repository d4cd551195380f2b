use serde::{de, Deserialize, Deserializer, Serialize};

use crate::{LapResult, ReferenceLapPoint, SessionConfig, TelemetrySample};

/// Device-motion acceleration in g. Browsers report missing axes as null.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct Accel {
    #[serde(default)]
    pub x: Option<f64>,
    #[serde(default)]
    pub y: Option<f64>,
    #[serde(default)]
    pub z: Option<f64>,
}

impl Accel {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x: Some(x), y: Some(y), z: Some(z) }
    }

    pub fn components(&self) -> [f64; 3] {
        [
            self.x.unwrap_or(0.0),
            self.y.unwrap_or(0.0),
            self.z.unwrap_or(0.0),
        ]
    }
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq)]
pub struct SensorReading {
    pub accel: Accel,
    #[serde(deserialize_with = "millis")]
    pub timestamp: u64,
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq)]
pub struct GpsFix {
    pub lat: f64,
    pub lng: f64,
    /// m/s; null when the receiver has no doppler speed
    #[serde(default)]
    pub speed: Option<f64>,
    #[serde(deserialize_with = "millis")]
    pub timestamp: u64,
}

/// DeviceMotion and high-resolution clocks report fractional ms; round to the
/// nearest whole ms.
fn millis<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
    let ms = f64::deserialize(d)?;
    if !ms.is_finite() || ms < 0.0 {
        return Err(de::Error::custom(format!("invalid timestamp {ms}")));
    }
    Ok(ms.round() as u64)
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Calibration {
    pub bias_y: f64,
}

/// Host -> core.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Inbound {
    StartSession(SessionConfig),
    StopSession,
    SetCalibration(Calibration),
    SetReferenceLap(Vec<ReferenceLapPoint>),
    SensorData(SensorReading),
    GpsData(GpsFix),
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct GVector {
    pub x: f64,
    pub y: f64,
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub current_g: GVector,
    pub speed: f64,
    pub distance: f64,
    pub delta: f64,
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LapStart {
    pub start_time: u64,
}

/// Core -> host.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outbound {
    UpdateStats(Stats),
    StartingLap(LapStart),
    LapCompleted(LapResult),
    SaveBatch(Vec<TelemetrySample>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_host_wire_format() {
        let m: Inbound = serde_json::from_str(
            r#"{"type":"GPS_DATA","payload":{"lat":1.5,"lng":2.5,"speed":12.0,"timestamp":1000}}"#,
        )
        .unwrap();
        assert_eq!(
            m,
            Inbound::GpsData(GpsFix { lat: 1.5, lng: 2.5, speed: Some(12.0), timestamp: 1000 })
        );

        let stop: Inbound = serde_json::from_str(r#"{"type":"STOP_SESSION"}"#).unwrap();
        assert_eq!(stop, Inbound::StopSession);
    }

    #[test]
    fn start_session_without_finish_gate() {
        let m: Inbound = serde_json::from_str(
            r#"{"type":"START_SESSION","payload":{"sessionId":3,"trackType":"Circuit",
                "startGate":{"p1":{"lat":0.0,"lng":0.0},"p2":{"lat":0.0,"lng":1.0}}}}"#,
        )
        .unwrap();
        match m {
            Inbound::StartSession(cfg) => {
                assert_eq!(cfg.session_id, 3);
                assert!(cfg.finish_gate.is_none());
                assert_eq!(cfg.finish(), cfg.start_gate);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn null_axes_read_as_zero() {
        let r: SensorReading =
            serde_json::from_str(r#"{"accel":{"x":null,"y":0.5,"z":null},"timestamp":10}"#).unwrap();
        assert_eq!(r.accel.components(), [0.0, 0.5, 0.0]);
    }

    #[test]
    fn fractional_timestamps_round_to_ms() {
        let r: SensorReading =
            serde_json::from_str(r#"{"accel":{"x":0.0,"y":0.0,"z":1.0},"timestamp":1234.567}"#).unwrap();
        assert_eq!(r.timestamp, 1235);
        let f: GpsFix = serde_json::from_str(r#"{"lat":0.0,"lng":0.0,"timestamp":99.2}"#).unwrap();
        assert_eq!(f.timestamp, 99);
        assert!(serde_json::from_str::<GpsFix>(r#"{"lat":0.0,"lng":0.0,"timestamp":-5}"#).is_err());
    }

    #[test]
    fn lap_completed_carries_session() {
        let lap = LapResult { session_id: 4, lap_number: 2, lap_time: 61_000, is_best: false };
        let v = serde_json::to_value(Outbound::LapCompleted(lap)).unwrap();
        assert_eq!(v["payload"]["sessionId"], 4);
        assert_eq!(v["payload"]["lapTime"], 61_000);
    }

    #[test]
    fn outbound_uses_payload_envelope() {
        let v = serde_json::to_value(Outbound::StartingLap(LapStart { start_time: 42 })).unwrap();
        assert_eq!(v["type"], "STARTING_LAP");
        assert_eq!(v["payload"]["startTime"], 42);
    }
}
