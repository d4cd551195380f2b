use analysis::{DeltaEngine, FusionEstimator, GateCrossing, GateCrossingDetector, MotionFilter, PathFix};
use model::*;
use tracing::{debug, info, trace, warn};

use crate::buffer::SampleBuffer;
use crate::decode_inbound;
use crate::lap::{LapStateMachine, LapTransition};

/// Message handler for the telemetry core.
///
/// Calibration and the reference lap outlive sessions; everything else lives
/// in a [`Session`] built on `START_SESSION` and dropped on `STOP_SESSION`.
pub struct TelemetryEngine {
    config: EngineConfig,
    bias: f64,
    reference: DeltaEngine,
    session: Option<Session>,
}

struct Session {
    config: SessionConfig,
    filter: MotionFilter,
    fusion: FusionEstimator,
    detector: GateCrossingDetector,
    laps: LapStateMachine,
    delta: DeltaEngine,
    buffer: SampleBuffer,
    last_fix: Option<PathFix>,
    /// Time of the last accepted crossing. A fix lying on the gate ends one
    /// segment at t=1 and starts the next at t=0; the second match is dropped.
    last_crossing_ms: Option<f64>,
    last_raw_speed: Option<f64>,
    last_delta: f64,
}

impl TelemetryEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config, bias: 0.0, reference: DeltaEngine::default(), session: None }
    }

    pub fn is_running(&self) -> bool {
        self.session.is_some()
    }

    /// Decode and handle one raw JSON message. Undecodable input is logged
    /// and ignored.
    pub fn handle_json(&mut self, raw: &str) -> Vec<Outbound> {
        match decode_inbound(raw) {
            Ok(msg) => self.handle(msg),
            Err(e) => {
                warn!(error = %e, "ignoring inbound message");
                Vec::new()
            }
        }
    }

    pub fn handle(&mut self, msg: Inbound) -> Vec<Outbound> {
        let mut out = Vec::new();
        match msg {
            Inbound::StartSession(cfg) => self.start_session(cfg, &mut out),
            Inbound::StopSession => self.stop_session(&mut out),
            Inbound::SetCalibration(c) => {
                debug!(bias_y = c.bias_y, "calibration set");
                self.bias = c.bias_y;
                if let Some(s) = self.session.as_mut() {
                    s.fusion.set_bias(c.bias_y);
                }
            }
            Inbound::SetReferenceLap(points) => {
                self.reference.set_reference(&points);
                info!(points = self.reference.reference().len(), "reference lap loaded");
                if let Some(s) = self.session.as_mut() {
                    s.delta = self.reference.clone();
                }
            }
            Inbound::SensorData(reading) => match self.session.as_mut() {
                Some(s) => s.on_sensor(reading, &mut out),
                None => trace!("sensor data without a session"),
            },
            Inbound::GpsData(fix) => match self.session.as_mut() {
                Some(s) => s.on_gps(fix, &mut out),
                None => trace!("gps data without a session"),
            },
        }
        out
    }

    fn start_session(&mut self, cfg: SessionConfig, out: &mut Vec<Outbound>) {
        if self.session.is_some() {
            warn!("session restarted without stop");
            self.stop_session(out);
        }
        if cfg.finish().is_none() {
            warn!(session_id = cfg.session_id, "no gate configured, lap timing disabled");
        }
        info!(session_id = cfg.session_id, track_type = ?cfg.track_type, "session started");

        let mut delta = self.reference.clone();
        delta.reset();
        self.session = Some(Session {
            filter: MotionFilter::new(&self.config),
            fusion: FusionEstimator::new(&self.config, self.bias),
            detector: GateCrossingDetector::new(self.config.min_kinematic_dv_mps),
            laps: LapStateMachine::new(cfg.session_id, cfg.track_type),
            delta,
            buffer: SampleBuffer::new(self.config.batch_size),
            last_fix: None,
            last_crossing_ms: None,
            last_raw_speed: None,
            last_delta: 0.0,
            config: cfg,
        });
    }

    fn stop_session(&mut self, out: &mut Vec<Outbound>) {
        let Some(mut s) = self.session.take() else {
            debug!("stop without a running session");
            return;
        };
        if let Some(batch) = s.buffer.flush() {
            out.push(Outbound::SaveBatch(batch));
        }
        info!(
            session_id = s.config.session_id,
            laps = s.laps.laps_completed(),
            best_ms = ?s.laps.best_ms(),
            "session stopped"
        );
    }
}

impl Session {
    fn on_sensor(&mut self, reading: SensorReading, out: &mut Vec<Outbound>) {
        if let Some(dt) = self.filter.update(reading.accel.components(), reading.timestamp) {
            self.fusion.predict(self.filter.longitudinal(), dt);
        }

        let st = self.fusion.state();
        out.push(Outbound::UpdateStats(Stats {
            current_g: GVector { x: self.filter.lateral(), y: self.filter.longitudinal() },
            speed: st.velocity,
            distance: st.distance,
            delta: self.last_delta,
        }));
        self.record(reading.timestamp, out);
    }

    fn on_gps(&mut self, fix: GpsFix, out: &mut Vec<Outbound>) {
        if self.laps.is_finished() {
            trace!("gps data after sprint finish");
            return;
        }

        if let Some(speed) = fix.speed.filter(|v| v.is_finite()) {
            self.fusion.correct(speed);
        }
        self.last_raw_speed = fix.speed;

        let curr = PathFix {
            position: GeoPoint { lat: fix.lat, lng: fix.lng },
            timestamp: fix.timestamp,
            velocity: self.fusion.state().velocity,
        };
        let gate = if self.laps.is_idle() { self.config.start() } else { self.config.finish() };
        if let (Some(prev), Some(gate)) = (self.last_fix, gate) {
            let crossing = self
                .detector
                .detect(&prev, &curr, &gate)
                .filter(|c| self.last_crossing_ms.map_or(true, |last| c.time_ms > last));
            if let Some(crossing) = crossing {
                self.last_crossing_ms = Some(crossing.time_ms);
                self.on_crossing(crossing, out);
            }
        }
        self.last_fix = Some(curr);

        self.last_delta = match self.laps.lap_start_ms() {
            Some(start_ms) => {
                let elapsed = fix.timestamp as f64 - start_ms;
                self.delta.delta(self.fusion.state().distance, elapsed)
            }
            None => 0.0,
        };
        self.record(fix.timestamp, out);
    }

    fn on_crossing(&mut self, crossing: GateCrossing, out: &mut Vec<Outbound>) {
        debug!(
            t = crossing.t,
            u = crossing.u,
            offset = ?crossing.offset,
            time_ms = crossing.time_ms,
            "gate crossed"
        );
        match self.laps.on_crossing(crossing.time_ms) {
            LapTransition::Started { start_ms } => {
                self.begin_lap();
                info!(start_ms, "lap timer started");
                out.push(Outbound::StartingLap(LapStart { start_time: start_ms.round() as u64 }));
            }
            LapTransition::Completed { result, next_start_ms } => {
                if let Some(batch) = self.buffer.flush() {
                    out.push(Outbound::SaveBatch(batch));
                }
                info!(
                    lap = result.lap_number,
                    lap_time_ms = result.lap_time,
                    best = result.is_best,
                    "lap completed"
                );
                out.push(Outbound::LapCompleted(result));
                if next_start_ms.is_some() {
                    self.begin_lap();
                } else {
                    info!(session_id = self.config.session_id, "sprint finished");
                }
            }
            LapTransition::Ignored => {}
        }
    }

    fn begin_lap(&mut self) {
        self.fusion.reset_distance();
        self.delta.reset();
    }

    fn record(&mut self, timestamp: u64, out: &mut Vec<Outbound>) {
        let st = self.fusion.state();
        let [accel_x, accel_y, _] = self.filter.raw();
        let (g_lat, g_long) = (self.filter.lateral(), self.filter.longitudinal());
        let sample = TelemetrySample {
            session_id: self.config.session_id,
            timestamp,
            lap_number: self.laps.current_lap(),
            position: self.last_fix.map(|f| f.position),
            speed: st.velocity,
            raw_speed: self.last_raw_speed,
            distance: st.distance,
            accel_x,
            accel_y,
            g_lat,
            g_long,
            g_sum: g_lat.hypot(g_long),
            variance: st.variance,
            kalman_gain: st.last_gain,
            delta: self.last_delta,
        };
        if let Some(batch) = self.buffer.push(sample) {
            debug!(len = batch.len(), "batch full");
            out.push(Outbound::SaveBatch(batch));
        }
    }
}
