use model::TelemetrySample;

/// Batches samples for the persistence side.
#[derive(Clone, Debug)]
pub struct SampleBuffer {
    batch_size: usize,
    samples: Vec<TelemetrySample>,
}

impl SampleBuffer {
    pub fn new(batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        Self { batch_size, samples: Vec::with_capacity(batch_size) }
    }

    /// Returns a full batch once `batch_size` samples have accumulated.
    pub fn push(&mut self, sample: TelemetrySample) -> Option<Vec<TelemetrySample>> {
        self.samples.push(sample);
        if self.samples.len() >= self.batch_size {
            self.flush()
        } else {
            None
        }
    }

    /// Drain whatever is buffered. `None` when empty.
    pub fn flush(&mut self) -> Option<Vec<TelemetrySample>> {
        if self.samples.is_empty() {
            return None;
        }
        Some(std::mem::replace(&mut self.samples, Vec::with_capacity(self.batch_size)))
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(timestamp: u64) -> TelemetrySample {
        TelemetrySample {
            session_id: 1,
            timestamp,
            lap_number: 0,
            position: None,
            speed: 0.0,
            raw_speed: None,
            distance: 0.0,
            accel_x: 0.0,
            accel_y: 0.0,
            g_lat: 0.0,
            g_long: 0.0,
            g_sum: 0.0,
            variance: 0.0,
            kalman_gain: 0.0,
            delta: 0.0,
        }
    }

    #[test]
    fn emits_exact_batches() {
        let mut b = SampleBuffer::new(50);
        let mut batches = Vec::new();
        for i in 0..120 {
            if let Some(batch) = b.push(sample(i)) {
                batches.push(batch);
            }
        }
        assert_eq!(batches.len(), 2);
        assert!(batches.iter().all(|b| b.len() == 50));
        assert_eq!(batches[1][0].timestamp, 50);
        assert_eq!(b.len(), 20);

        let last = b.flush().unwrap();
        assert_eq!(last.len(), 20);
        assert!(b.flush().is_none());
    }

    #[test]
    fn zero_batch_size_flushes_every_sample() {
        let mut b = SampleBuffer::new(0);
        assert_eq!(b.push(sample(1)).map(|v| v.len()), Some(1));
        assert!(b.is_empty());
    }
}
