use model::EngineConfig;

/// Per-axis exponential smoothing of device-motion samples.
///
/// Axis convention follows the phone mount: `x` lateral, `y` longitudinal.
/// Smoothing runs on every sample; [`MotionFilter::update`] only hands back a
/// `dt` when the interval since the previous sample is usable for integration.
#[derive(Clone, Debug)]
pub struct MotionFilter {
    alpha: f64,
    max_dt_s: f64,
    filtered: [f64; 3],
    raw: [f64; 3],
    last_timestamp: Option<u64>,
}

impl MotionFilter {
    pub fn new(cfg: &EngineConfig) -> Self {
        Self {
            alpha: cfg.smoothing_alpha,
            max_dt_s: cfg.max_sensor_dt_s,
            filtered: [0.0; 3],
            raw: [0.0; 3],
            last_timestamp: None,
        }
    }

    /// Feed one sample. Returns the integration step in seconds, or `None`
    /// when the step must be skipped (first sample, clock went backwards,
    /// sensor burst or resume from background).
    pub fn update(&mut self, accel: [f64; 3], timestamp: u64) -> Option<f64> {
        for (f, r) in self.filtered.iter_mut().zip(accel) {
            *f = r * self.alpha + *f * (1.0 - self.alpha);
        }
        self.raw = accel;

        let dt = self
            .last_timestamp
            .map(|last| (timestamp as f64 - last as f64) / 1000.0);
        self.last_timestamp = Some(timestamp);

        dt.filter(|dt| *dt > 0.0 && *dt <= self.max_dt_s)
    }

    pub fn lateral(&self) -> f64 {
        self.filtered[0]
    }

    pub fn longitudinal(&self) -> f64 {
        self.filtered[1]
    }

    pub fn raw(&self) -> [f64; 3] {
        self.raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn smoothing_converges_on_constant_input() {
        let mut f = MotionFilter::new(&EngineConfig::default());
        for i in 0..200 {
            f.update([0.3, -0.2, 1.0], i * 10);
        }
        assert!((f.lateral() - 0.3).abs() < 1e-6);
        assert!((f.longitudinal() + 0.2).abs() < 1e-6);
    }

    #[test]
    fn first_step_uses_alpha() {
        let mut f = MotionFilter::new(&EngineConfig::default());
        f.update([1.0, 1.0, 1.0], 0);
        assert!((f.longitudinal() - 0.15).abs() < 1e-12);
        assert_eq!(f.raw(), [1.0, 1.0, 1.0]);
    }

    #[test]
    fn dt_window_is_open_at_zero_closed_at_max() {
        let mut f = MotionFilter::new(&EngineConfig::default());
        assert_eq!(f.update([0.0; 3], 1000), None);
        assert_eq!(f.update([0.0; 3], 1000), None);
        assert_eq!(f.update([0.0; 3], 1200), Some(0.2));
        assert_eq!(f.update([0.0; 3], 1401), None);
        // going backwards is skipped but the clock still follows the sensor
        assert_eq!(f.update([0.0; 3], 900), None);
        assert_eq!(f.update([0.0; 3], 950), Some(0.05));
    }
}
