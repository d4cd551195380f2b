use model::EngineConfig;

/// Velocity/uncertainty state shared by the prediction and correction paths.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FusionState {
    /// m/s, never negative
    pub velocity: f64,
    pub variance: f64,
    /// meters since the last lap start
    pub distance: f64,
    /// longitudinal accel offset, g
    pub bias: f64,
    /// gain applied by the most recent correction
    pub last_gain: f64,
}

/// Scalar Kalman gain. Both inputs are variances, so the result is in [0, 1].
pub fn kalman_gain(variance: f64, noise: f64) -> f64 {
    let denom = variance + noise;
    if denom <= 0.0 || !denom.is_finite() {
        return 0.0;
    }
    (variance / denom).clamp(0.0, 1.0)
}

/// Inertial dead reckoning corrected by GPS speed.
///
/// Only velocity is observable, so this is a one-state filter: prediction
/// integrates bias-corrected longitudinal acceleration and inflates the
/// variance, correction blends in the GPS speed and shrinks it.
#[derive(Clone, Debug)]
pub struct FusionEstimator {
    gravity: f64,
    dead_zone: f64,
    process_noise: f64,
    gps_noise: f64,
    state: FusionState,
}

impl FusionEstimator {
    pub fn new(cfg: &EngineConfig, bias: f64) -> Self {
        Self {
            gravity: cfg.gravity,
            dead_zone: cfg.dead_zone_mps2,
            process_noise: cfg.process_noise,
            gps_noise: cfg.gps_noise,
            state: FusionState {
                velocity: 0.0,
                variance: cfg.initial_variance,
                distance: 0.0,
                bias,
                last_gain: 0.0,
            },
        }
    }

    pub fn state(&self) -> &FusionState {
        &self.state
    }

    pub fn set_bias(&mut self, bias: f64) {
        self.state.bias = bias;
    }

    /// Longitudinal acceleration in m/s² after bias removal and dead zone.
    pub fn longitudinal_mps2(&self, longitudinal_g: f64) -> f64 {
        let a = (longitudinal_g - self.state.bias) * self.gravity;
        if a.abs() < self.dead_zone {
            0.0
        } else {
            a
        }
    }

    pub fn predict(&mut self, longitudinal_g: f64, dt: f64) {
        let a = self.longitudinal_mps2(longitudinal_g);
        let s = &mut self.state;
        s.velocity = (s.velocity + a * dt).max(0.0);
        s.distance += s.velocity * dt;
        s.variance += dt * self.process_noise;
    }

    /// Blend in a GPS speed observation; returns the gain used.
    pub fn correct(&mut self, gps_speed: f64) -> f64 {
        let s = &mut self.state;
        let gain = kalman_gain(s.variance, self.gps_noise);
        s.velocity = (s.velocity + gain * (gps_speed - s.velocity)).max(0.0);
        s.variance *= 1.0 - gain;
        s.last_gain = gain;
        gain
    }

    pub fn reset_distance(&mut self) {
        self.state.distance = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn estimator() -> FusionEstimator {
        FusionEstimator::new(&EngineConfig::default(), 0.0)
    }

    #[test]
    fn dead_zone_leaves_velocity_untouched() {
        let mut f = FusionEstimator::new(&EngineConfig::default(), 0.1);
        // 0.104 g - 0.1 g bias = 0.039 m/s², inside the dead zone
        f.predict(0.104, 0.1);
        assert_eq!(f.state().velocity, 0.0);
        assert_eq!(f.state().distance, 0.0);
        assert!(f.state().variance > 1.0);
    }

    #[test]
    fn integrates_velocity_then_distance() {
        let mut f = estimator();
        f.predict(0.5, 0.1);
        let v = 0.5 * 9.81 * 0.1;
        assert!((f.state().velocity - v).abs() < 1e-12);
        assert!((f.state().distance - v * 0.1).abs() < 1e-12);
    }

    #[test]
    fn braking_never_goes_negative() {
        let mut f = estimator();
        f.predict(-1.0, 0.2);
        assert_eq!(f.state().velocity, 0.0);
        assert_eq!(f.state().distance, 0.0);
    }

    #[test]
    fn correction_pulls_towards_gps_and_shrinks_variance() {
        let mut f = estimator();
        let gain = f.correct(30.0);
        assert!((gain - 1.0 / 3.0).abs() < 1e-12);
        assert!((f.state().velocity - 10.0).abs() < 1e-9);
        assert!((f.state().variance - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(f.state().last_gain, gain);
    }

    #[test]
    fn gain_stays_in_unit_interval() {
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(kalman_gain(0.0, 0.0), 0.0);
        for _ in 0..10_000 {
            let v: f64 = rng.gen_range(0.0..1e6);
            let n: f64 = rng.gen_range(0.0..1e6);
            let g = kalman_gain(v, n);
            assert!((0.0..=1.0).contains(&g), "gain {g} for {v}/{n}");
        }
    }

    #[test]
    fn velocity_non_negative_for_random_streams() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..200 {
            let mut f = FusionEstimator::new(&EngineConfig::default(), rng.gen_range(-0.2..0.2));
            let mut last_distance = 0.0;
            for _ in 0..500 {
                if rng.gen_bool(0.1) {
                    f.correct(rng.gen_range(0.0..80.0));
                } else {
                    f.predict(rng.gen_range(-2.0..2.0), rng.gen_range(0.001..0.2));
                }
                assert!(f.state().velocity >= 0.0);
                assert!(f.state().distance >= last_distance);
                last_distance = f.state().distance;
            }
        }
    }
}
