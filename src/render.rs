//! Outbound render state and frame pacing.
//!
//! Renders are coalesced: any number of state changes between paint
//! ticks collapse into one frame, and frames are additionally spaced by
//! a minimum interval regardless of how fast samples arrive.

use serde::Serialize;

use crate::geo::GeoPoint;
use crate::heatmap::HeatCell;
use crate::lap::LapEfficiency;
use crate::overlay::OverlayFrame;
use crate::racing_line::Guidance;
use crate::session::SourceMode;
use crate::turns::TurnCue;

/// Everything the dashboard UI draws in one frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderFrame {
    pub speed_kmh: f64,
    /// Speedometer arc fill, 0..1.
    pub speed_fraction: f64,
    /// Absolute current draw; None in GPS fallback mode.
    pub current_amps: Option<f64>,
    /// Remaining session time, `M:SS`.
    pub timer: String,
    pub timer_running: bool,
    pub lap: u32,
    /// Recorded efficiencies; empty (and hidden) in GPS fallback mode.
    pub efficiencies: Vec<LapEfficiency>,
    pub electrical_available: bool,
    /// Fresh heat-map colors, present only when the buffer changed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heat: Option<Vec<HeatCell>>,
    pub turn_cue: TurnCue,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guidance: Option<Guidance>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overlay: Option<OverlayFrame>,
    pub position: GeoPoint,
    pub heading_deg: f64,
    pub source: SourceMode,
    /// User-visible fatal condition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fatal: Option<String>,
}

impl RenderFrame {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Speedometer arc fill for a speed, capped at full scale.
pub fn speed_fraction(speed_kmh: f64, full_scale_kmh: f64) -> f64 {
    if full_scale_kmh <= 0.0 {
        return 0.0;
    }
    (speed_kmh.round() / full_scale_kmh).clamp(0.0, 1.0)
}

/// Coalescing, rate-limited paint scheduler.
#[derive(Debug, Clone)]
pub struct FrameLimiter {
    min_interval_ms: f64,
    last_paint_ms: Option<f64>,
    pending: bool,
}

impl FrameLimiter {
    pub fn new(min_interval_ms: f64) -> Self {
        Self {
            min_interval_ms,
            last_paint_ms: None,
            pending: false,
        }
    }

    /// Note that state changed and a frame is wanted.
    pub fn request(&mut self) {
        self.pending = true;
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Paint tick: true when a pending frame may be drawn now.
    ///
    /// A frame that is too early stays pending for the next tick.
    pub fn poll(&mut self, now_ms: f64) -> bool {
        if !self.pending {
            return false;
        }
        if let Some(last) = self.last_paint_ms {
            if now_ms - last < self.min_interval_ms {
                return false;
            }
        }
        self.pending = false;
        self.last_paint_ms = Some(now_ms);
        true
    }
}
