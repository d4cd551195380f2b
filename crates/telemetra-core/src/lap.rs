use model::{LapResult, TrackType};

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LapState {
    /// Waiting for the first gate pass.
    Idle,
    InLap { start_ms: f64, lap_number: u32 },
    /// Sprint run is over; no further crossings are accepted.
    Finished,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LapTransition {
    /// First crossing of the session. Only starts the timer.
    Started { start_ms: f64 },
    /// A lap ended. `next_start_ms` is set when the same crossing opened the
    /// next lap (circuits).
    Completed { result: LapResult, next_start_ms: Option<f64> },
    Ignored,
}

#[derive(Clone, Debug)]
pub struct LapStateMachine {
    session_id: u64,
    track_type: TrackType,
    state: LapState,
    best_ms: Option<u64>,
    completed: u32,
}

impl LapStateMachine {
    pub fn new(session_id: u64, track_type: TrackType) -> Self {
        Self { session_id, track_type, state: LapState::Idle, best_ms: None, completed: 0 }
    }

    pub fn state(&self) -> LapState {
        self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == LapState::Idle
    }

    pub fn is_finished(&self) -> bool {
        self.state == LapState::Finished
    }

    pub fn lap_start_ms(&self) -> Option<f64> {
        match self.state {
            LapState::InLap { start_ms, .. } => Some(start_ms),
            _ => None,
        }
    }

    /// Lap in progress; 0 outside a timed lap, before the start and after a
    /// sprint has finished.
    pub fn current_lap(&self) -> u32 {
        match self.state {
            LapState::InLap { lap_number, .. } => lap_number,
            LapState::Idle | LapState::Finished => 0,
        }
    }

    pub fn laps_completed(&self) -> u32 {
        self.completed
    }

    pub fn best_ms(&self) -> Option<u64> {
        self.best_ms
    }

    pub fn on_crossing(&mut self, crossing_ms: f64) -> LapTransition {
        match self.state {
            LapState::Idle => {
                self.state = LapState::InLap { start_ms: crossing_ms, lap_number: 1 };
                LapTransition::Started { start_ms: crossing_ms }
            }
            LapState::InLap { start_ms, lap_number } => {
                let lap_time = (crossing_ms - start_ms).max(0.0).round() as u64;
                let is_best = self.best_ms.map_or(true, |b| lap_time < b);
                if is_best {
                    self.best_ms = Some(lap_time);
                }
                self.completed = lap_number;
                let result = LapResult { session_id: self.session_id, lap_number, lap_time, is_best };

                let next_start_ms = match self.track_type {
                    TrackType::Circuit => {
                        self.state = LapState::InLap { start_ms: crossing_ms, lap_number: lap_number + 1 };
                        Some(crossing_ms)
                    }
                    TrackType::Sprint => {
                        self.state = LapState::Finished;
                        None
                    }
                };
                LapTransition::Completed { result, next_start_ms }
            }
            LapState::Finished => LapTransition::Ignored,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_crossing_only_starts_the_timer() {
        let mut m = LapStateMachine::new(3, TrackType::Circuit);
        assert_eq!(m.current_lap(), 0);
        assert_eq!(m.on_crossing(1_000.0), LapTransition::Started { start_ms: 1_000.0 });
        assert_eq!(m.current_lap(), 1);
        assert_eq!(m.lap_start_ms(), Some(1_000.0));
    }

    #[test]
    fn circuit_rolls_into_next_lap() {
        let mut m = LapStateMachine::new(3, TrackType::Circuit);
        m.on_crossing(1_000.0);
        let t = m.on_crossing(61_000.4);
        assert_eq!(
            t,
            LapTransition::Completed {
                result: LapResult { session_id: 3, lap_number: 1, lap_time: 60_000, is_best: true },
                next_start_ms: Some(61_000.4),
            }
        );
        assert_eq!(m.current_lap(), 2);

        let LapTransition::Completed { result, .. } = m.on_crossing(122_000.0) else {
            panic!("expected completion");
        };
        assert_eq!(result.lap_number, 2);
        assert!(!result.is_best);

        let LapTransition::Completed { result, .. } = m.on_crossing(180_000.0) else {
            panic!("expected completion");
        };
        assert!(result.is_best);
        assert_eq!(m.best_ms(), Some(58_000));
    }

    #[test]
    fn sprint_finishes_after_one_run() {
        let mut m = LapStateMachine::new(3, TrackType::Sprint);
        m.on_crossing(0.0);
        let t = m.on_crossing(45_000.0);
        assert!(matches!(t, LapTransition::Completed { next_start_ms: None, .. }));
        assert!(m.is_finished());
        assert_eq!(m.current_lap(), 0);
        assert_eq!(m.laps_completed(), 1);
        assert_eq!(m.on_crossing(50_000.0), LapTransition::Ignored);
    }
}
