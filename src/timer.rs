//! Session countdown timer.
//!
//! Elapsed time only advances while running. Pausing folds the running
//! stretch into `elapsed_ms`, so a later resume never counts it twice.
//! Times are sample timestamps in milliseconds, not wall-clock reads,
//! which keeps the timer deterministic under replay.

use log::info;

#[derive(Debug, Clone, PartialEq)]
pub struct SessionTimer {
    running: bool,
    elapsed_ms: f64,
    started_at_ms: Option<f64>,
    budget_ms: f64,
}

impl SessionTimer {
    pub fn new(budget_ms: f64) -> Self {
        Self {
            running: false,
            elapsed_ms: 0.0,
            started_at_ms: None,
            budget_ms,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn budget_ms(&self) -> f64 {
        self.budget_ms
    }

    /// Start or resume. No-op while already running.
    pub fn start(&mut self, now_ms: f64) {
        if self.running {
            return;
        }
        if self.elapsed_ms == 0.0 {
            info!("Timer started");
        } else {
            info!("Timer resumed at {:.1} s", self.elapsed_ms / 1000.0);
        }
        self.running = true;
        self.started_at_ms = Some(now_ms);
    }

    /// Pause and freeze the accumulated time. No-op while paused.
    pub fn pause(&mut self, now_ms: f64) {
        if !self.running {
            return;
        }
        self.elapsed_ms = self.elapsed_at(now_ms);
        self.running = false;
        self.started_at_ms = None;
        info!("Timer paused at {:.1} s", self.elapsed_ms / 1000.0);
    }

    /// Elapsed time as of `now_ms`.
    pub fn elapsed_at(&self, now_ms: f64) -> f64 {
        match (self.running, self.started_at_ms) {
            (true, Some(start)) => self.elapsed_ms + (now_ms - start).max(0.0),
            _ => self.elapsed_ms,
        }
    }

    /// Remaining budget as of `now_ms`, never negative.
    pub fn remaining_at(&self, now_ms: f64) -> f64 {
        (self.budget_ms - self.elapsed_at(now_ms)).max(0.0)
    }

    /// Remaining time formatted as `M:SS`.
    pub fn display(&self, now_ms: f64) -> String {
        format_clock(self.remaining_at(now_ms))
    }
}

/// Format milliseconds as `M:SS`, truncating partial seconds.
pub fn format_clock(ms: f64) -> String {
    let total_secs = (ms.max(0.0) / 1000.0).floor() as u64;
    format!("{}:{:02}", total_secs / 60, total_secs % 60)
}
