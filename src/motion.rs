//! Moving/idle classification driving the session timer.
//!
//! Any sample above the movement threshold starts or resumes the timer.
//! The timer pauses only after the vehicle has stayed at or below the
//! threshold for the whole idle timeout, measured from the last moving
//! sample. Evaluation happens per sample, so responsiveness is bounded
//! by the sample rate.

use serde::Serialize;

use crate::timer::SessionTimer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MotionState {
    #[default]
    Idle,
    Running,
}

/// Edge produced by [`MotionTracker::evaluate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionTransition {
    Started,
    Paused,
}

#[derive(Debug, Clone, Default)]
pub struct MotionTracker {
    state: MotionState,
    last_movement_ms: Option<f64>,
}

impl MotionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> MotionState {
        self.state
    }

    pub fn last_movement_ms(&self) -> Option<f64> {
        self.last_movement_ms
    }

    /// Evaluate one sample and drive `timer` accordingly.
    pub fn evaluate(
        &mut self,
        speed_kmh: f64,
        now_ms: f64,
        timer: &mut SessionTimer,
        movement_threshold_kmh: f64,
        idle_timeout_ms: f64,
    ) -> Option<MotionTransition> {
        if speed_kmh > movement_threshold_kmh {
            self.last_movement_ms = Some(now_ms);
            if !timer.is_running() {
                timer.start(now_ms);
                self.state = MotionState::Running;
                return Some(MotionTransition::Started);
            }
            return None;
        }

        match self.last_movement_ms {
            Some(last) if timer.is_running() && now_ms - last >= idle_timeout_ms => {
                timer.pause(now_ms);
                self.state = MotionState::Idle;
                Some(MotionTransition::Paused)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const THRESHOLD: f64 = 0.5;
    const IDLE_MS: f64 = 15_000.0;

    fn setup() -> (MotionTracker, SessionTimer) {
        (MotionTracker::new(), SessionTimer::new(35.0 * 60_000.0))
    }

    #[test]
    fn first_movement_starts_timer() {
        let (mut motion, mut timer) = setup();
        assert_eq!(motion.evaluate(0.0, 0.0, &mut timer, THRESHOLD, IDLE_MS), None);
        assert_eq!(
            motion.evaluate(5.0, 100.0, &mut timer, THRESHOLD, IDLE_MS),
            Some(MotionTransition::Started)
        );
        assert!(timer.is_running());
        assert_eq!(motion.state(), MotionState::Running);
    }

    #[test]
    fn threshold_is_exclusive() {
        let (mut motion, mut timer) = setup();
        motion.evaluate(0.5, 0.0, &mut timer, THRESHOLD, IDLE_MS);
        assert!(!timer.is_running());
    }

    #[test]
    fn long_stop_pauses_timer_and_freezes_elapsed() {
        let (mut motion, mut timer) = setup();
        motion.evaluate(20.0, 0.0, &mut timer, THRESHOLD, IDLE_MS);

        let mut t = 1000.0;
        while t < 15_000.0 {
            assert_eq!(motion.evaluate(0.0, t, &mut timer, THRESHOLD, IDLE_MS), None);
            t += 1000.0;
        }
        assert_eq!(
            motion.evaluate(0.0, 15_000.0, &mut timer, THRESHOLD, IDLE_MS),
            Some(MotionTransition::Paused)
        );
        assert_eq!(motion.state(), MotionState::Idle);

        let frozen = timer.elapsed_at(15_000.0);
        motion.evaluate(0.0, 40_000.0, &mut timer, THRESHOLD, IDLE_MS);
        assert_eq!(timer.elapsed_at(40_000.0), frozen);
    }

    #[test]
    fn movement_resets_idle_window() {
        let (mut motion, mut timer) = setup();
        motion.evaluate(10.0, 0.0, &mut timer, THRESHOLD, IDLE_MS);
        motion.evaluate(0.0, 14_000.0, &mut timer, THRESHOLD, IDLE_MS);
        motion.evaluate(3.0, 14_500.0, &mut timer, THRESHOLD, IDLE_MS);
        assert_eq!(motion.evaluate(0.0, 20_000.0, &mut timer, THRESHOLD, IDLE_MS), None);
        assert!(timer.is_running());
    }

    #[test]
    fn resume_after_pause_uses_same_transition() {
        let (mut motion, mut timer) = setup();
        motion.evaluate(10.0, 0.0, &mut timer, THRESHOLD, IDLE_MS);
        motion.evaluate(0.0, 16_000.0, &mut timer, THRESHOLD, IDLE_MS);
        assert!(!timer.is_running());

        assert_eq!(
            motion.evaluate(8.0, 30_000.0, &mut timer, THRESHOLD, IDLE_MS),
            Some(MotionTransition::Started)
        );
        assert_eq!(timer.elapsed_at(31_000.0), 17_000.0);
    }
}
