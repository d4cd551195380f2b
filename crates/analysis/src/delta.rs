use model::ReferenceLapPoint;

/// Live time delta against a reference lap profile.
///
/// The cursor marks the reference segment containing the current distance and
/// only moves forward between [`DeltaEngine::reset`] calls, so a whole lap
/// costs O(reference length) in total.
#[derive(Clone, Debug, Default)]
pub struct DeltaEngine {
    reference: Vec<ReferenceLapPoint>,
    cursor: usize,
}

impl DeltaEngine {
    pub fn new(points: &[ReferenceLapPoint]) -> Self {
        let mut engine = Self::default();
        engine.set_reference(points);
        engine
    }

    /// Replace the reference. Points are sorted by distance; non-finite ones
    /// are dropped.
    pub fn set_reference(&mut self, points: &[ReferenceLapPoint]) {
        let mut reference: Vec<_> = points
            .iter()
            .copied()
            .filter(|p| p.distance.is_finite() && p.time.is_finite())
            .collect();
        reference.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        self.reference = reference;
        self.cursor = 0;
    }

    pub fn has_reference(&self) -> bool {
        !self.reference.is_empty()
    }

    pub fn reference(&self) -> &[ReferenceLapPoint] {
        &self.reference
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn reset(&mut self) {
        self.cursor = 0;
    }

    /// Reference elapsed time (ms) at `distance_m`, interpolated inside the
    /// cursor's segment. Advances the cursor.
    pub fn reference_time_at(&mut self, distance_m: f64) -> Option<f64> {
        let last = self.reference.len().checked_sub(1)?;
        while self.cursor < last && self.reference[self.cursor + 1].distance <= distance_m {
            self.cursor += 1;
        }

        let lo = self.reference[self.cursor];
        let Some(hi) = self.reference.get(self.cursor + 1).copied() else {
            return Some(lo.time);
        };
        let span = hi.distance - lo.distance;
        if span <= 0.0 {
            return Some(lo.time);
        }
        let frac = ((distance_m - lo.distance) / span).clamp(0.0, 1.0);
        Some(lo.time + frac * (hi.time - lo.time))
    }

    /// Seconds behind (positive) or ahead of (negative) the reference.
    /// Zero when no reference is loaded.
    pub fn delta(&mut self, distance_m: f64, elapsed_ms: f64) -> f64 {
        match self.reference_time_at(distance_m) {
            Some(ref_ms) => (elapsed_ms - ref_ms) / 1000.0,
            None => 0.0,
        }
    }
}
