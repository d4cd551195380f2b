//! Timing-gate crossing detection between two GPS fixes.
//!
//! The line test runs in the (lng, lat) plane. Over the few meters between
//! two fixes the projection is close enough to affine that the fraction `t`
//! along the travel segment carries over to ground distance unchanged.

use model::{Gate, GeoPoint};

const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Accepted kinematic roots lie in `[0, KINEMATIC_ROOT_WINDOW * dt]`.
/// Empirical tolerance for GPS timestamps that lag the true crossing.
pub const KINEMATIC_ROOT_WINDOW: f64 = 1.5;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Intersection {
    NoCrossing,
    /// `t` along the travel segment, `u` along the gate, both in [0, 1].
    Crossing { t: f64, u: f64 },
    /// Parallel or zero-length segments.
    Degenerate,
}

/// Seconds from the previous fix to the crossing.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CrossingOffset {
    ExactRoot(f64),
    /// Linear interpolation `dt * t`, used when the constant-acceleration
    /// model has no usable root or the speed barely changed.
    LinearFallback(f64),
}

impl CrossingOffset {
    pub fn seconds(&self) -> f64 {
        match *self {
            CrossingOffset::ExactRoot(s) | CrossingOffset::LinearFallback(s) => s,
        }
    }
}

/// A GPS fix together with the fused velocity right after its correction.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PathFix {
    pub position: GeoPoint,
    pub timestamp: u64,
    pub velocity: f64,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GateCrossing {
    pub t: f64,
    pub u: f64,
    pub offset: CrossingOffset,
    /// Refined crossing time, ms on the GPS clock.
    pub time_ms: f64,
}

pub fn segment_intersection(a: GeoPoint, b: GeoPoint, c: GeoPoint, d: GeoPoint) -> Intersection {
    let (ax, ay, bx, by) = (a.lng, a.lat, b.lng, b.lat);
    let (cx, cy, dx, dy) = (c.lng, c.lat, d.lng, d.lat);

    let det = (bx - ax) * (dy - cy) - (by - ay) * (dx - cx);
    if det == 0.0 {
        return Intersection::Degenerate;
    }

    let t = ((cx - ax) * (dy - cy) - (cy - ay) * (dx - cx)) / det;
    let u = ((cx - ax) * (by - ay) - (cy - ay) * (bx - ax)) / det;

    if (0.0..=1.0).contains(&t) && (0.0..=1.0).contains(&u) {
        Intersection::Crossing { t, u }
    } else {
        Intersection::NoCrossing
    }
}

/// Great-circle distance in meters.
pub fn haversine_m(a: GeoPoint, b: GeoPoint) -> f64 {
    let (lat1, lat2) = (a.lat.to_radians(), b.lat.to_radians());
    let dlat = lat2 - lat1;
    let dlng = (b.lng - a.lng).to_radians();
    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().min(1.0).asin()
}

/// Solve `d = v0*s + a*s²/2` with `a = (v1 - v0) / dt` for the smallest root
/// in `[0, KINEMATIC_ROOT_WINDOW * dt]`.
pub fn refine_crossing_offset(
    distance_m: f64,
    v0: f64,
    v1: f64,
    dt_s: f64,
    t: f64,
    min_dv: f64,
) -> CrossingOffset {
    let linear = CrossingOffset::LinearFallback(dt_s.max(0.0) * t);
    if dt_s <= 0.0 || (v1 - v0).abs() < min_dv {
        return linear;
    }

    let a = (v1 - v0) / dt_s;
    let disc = v0 * v0 + 2.0 * a * distance_m;
    if disc < 0.0 {
        return linear;
    }

    let sq = disc.sqrt();
    let window = dt_s * KINEMATIC_ROOT_WINDOW;
    [(-v0 + sq) / a, (-v0 - sq) / a]
        .into_iter()
        .filter(|s| s.is_finite() && (0.0..=window).contains(s))
        .min_by(|x, y| x.total_cmp(y))
        .map(CrossingOffset::ExactRoot)
        .unwrap_or(linear)
}

#[derive(Clone, Debug)]
pub struct GateCrossingDetector {
    min_dv: f64,
}

impl GateCrossingDetector {
    pub fn new(min_dv: f64) -> Self {
        Self { min_dv }
    }

    pub fn detect(&self, prev: &PathFix, curr: &PathFix, gate: &Gate) -> Option<GateCrossing> {
        let Intersection::Crossing { t, u } =
            segment_intersection(prev.position, curr.position, gate.p1, gate.p2)
        else {
            return None;
        };

        let dt_s = (curr.timestamp as f64 - prev.timestamp as f64) / 1000.0;
        let distance_m = haversine_m(prev.position, curr.position) * t;
        let offset = refine_crossing_offset(distance_m, prev.velocity, curr.velocity, dt_s, t, self.min_dv);

        Some(GateCrossing {
            t,
            u,
            offset,
            time_ms: prev.timestamp as f64 + offset.seconds() * 1000.0,
        })
    }
}
