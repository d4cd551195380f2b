use serde::{Deserialize, Serialize};

/// Tunables for the fusion core. Any field missing from a config file keeps
/// its default.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// EMA weight of the newest accelerometer sample
    pub smoothing_alpha: f64,
    pub gravity: f64,
    /// m/s², longitudinal accel below this is treated as zero
    pub dead_zone_mps2: f64,
    /// integration is skipped when the sensor interval leaves (0, max]
    pub max_sensor_dt_s: f64,
    /// variance growth per second of prediction
    pub process_noise: f64,
    pub gps_noise: f64,
    pub initial_variance: f64,
    pub batch_size: usize,
    /// m/s, below this velocity change crossings use linear interpolation
    pub min_kinematic_dv_mps: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            smoothing_alpha: 0.15,
            gravity: 9.81,
            dead_zone_mps2: 0.05,
            max_sensor_dt_s: 0.2,
            process_noise: 0.5,
            gps_noise: 2.0,
            initial_variance: 1.0,
            batch_size: 50,
            min_kinematic_dv_mps: 0.01,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_defaults() {
        let cfg: EngineConfig = serde_json::from_str(r#"{"batch_size": 10}"#).unwrap();
        assert_eq!(cfg.batch_size, 10);
        assert_eq!(cfg.smoothing_alpha, 0.15);
        assert_eq!(cfg.gps_noise, EngineConfig::default().gps_noise);
    }
}
