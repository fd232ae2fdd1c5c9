//! Session context: the single owner of all mutable fusion state.
//!
//! Every sample flows through one `&mut Session` call: the vehicle state
//! is updated first, then motion, laps, the heat map and turn cues read
//! the updated position. Nothing here is global; callers that share a
//! session across threads must wrap it in one lock.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use log::{error, info, warn};
use serde::Serialize;

use crate::config::{TrackConfig, Tuning};
use crate::heatmap::{HeatMap, HeatPoint};
use crate::lap::{LapEvent, LapThresholds, LapTracker};
use crate::motion::{MotionTracker, MotionTransition};
use crate::overlay::{OverlayFrame, ProjectionRequest};
use crate::projection::LocalFallback;
use crate::racing_line::{guidance_for, Guidance, RacingLineTable};
use crate::render::{speed_fraction, RenderFrame};
use crate::sample::{GpsFix, RawSample};
use crate::sync::{PiGpsPacket, SyncBuffer};
use crate::timer::SessionTimer;
use crate::turns::{TurnCue, TurnDetector, TurnTransition};
use crate::vehicle::{IngestLimits, IngestOutcome, VehicleState};

/// Where position data comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceMode {
    /// Car telemetry over the network.
    #[default]
    Telemetry,
    /// The phone's own location provider. Entered at most once.
    GpsFallback,
}

/// Result of processing one sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleReport {
    /// The sample was dropped because it belongs to the inactive source.
    pub ignored: bool,
    pub ingest: Option<IngestOutcome>,
    pub motion: Option<MotionTransition>,
    pub lap: Option<LapEvent>,
    pub turn: Option<TurnTransition>,
}

impl SampleReport {
    fn ignored() -> Self {
        Self { ignored: true, ingest: None, motion: None, lap: None, turn: None }
    }
}

pub struct Session {
    track: Arc<TrackConfig>,
    tuning: Arc<Tuning>,
    racing_line: Option<Arc<RacingLineTable>>,
    vehicle: VehicleState,
    timer: SessionTimer,
    motion: MotionTracker,
    laps: LapTracker,
    heat: HeatMap,
    turns: TurnDetector,
    mode: SourceMode,
    sync: SyncBuffer,
    overlay: Option<OverlayFrame>,
    fatal: Option<String>,
}

impl Session {
    pub fn new(track: TrackConfig, tuning: Tuning, racing_line: Option<RacingLineTable>) -> Self {
        let laps = LapTracker::new(track.start);
        Self {
            timer: SessionTimer::new(tuning.timer_budget_ms),
            heat: HeatMap::new(tuning.heat_capacity, tuning.heat_render_every),
            track: Arc::new(track),
            tuning: Arc::new(tuning),
            racing_line: racing_line.map(Arc::new),
            vehicle: VehicleState::new(),
            motion: MotionTracker::new(),
            laps,
            turns: TurnDetector::new(),
            mode: SourceMode::Telemetry,
            sync: SyncBuffer::default(),
            overlay: None,
            fatal: None,
        }
    }

    pub fn track(&self) -> &TrackConfig {
        &self.track
    }

    pub fn tuning(&self) -> &Tuning {
        &self.tuning
    }

    pub fn vehicle(&self) -> &VehicleState {
        &self.vehicle
    }

    pub fn timer(&self) -> &SessionTimer {
        &self.timer
    }

    pub fn laps(&self) -> &LapTracker {
        &self.laps
    }

    pub fn heat(&self) -> &HeatMap {
        &self.heat
    }

    pub fn mode(&self) -> SourceMode {
        self.mode
    }

    pub fn sync(&self) -> &SyncBuffer {
        &self.sync
    }

    pub fn fatal(&self) -> Option<&str> {
        self.fatal.as_deref()
    }

    pub fn turn_cue(&self) -> TurnCue {
        self.turns.cue(&self.track.turns)
    }

    fn limits(&self) -> IngestLimits {
        IngestLimits {
            max_power_w: self.tuning.max_power_w,
            heading_min_speed_kmh: self.tuning.heading_min_speed_kmh,
        }
    }

    /// Process one telemetry packet. Ignored once in GPS fallback mode.
    pub fn ingest_telemetry(&mut self, sample: &RawSample, now_ms: f64) -> SampleReport {
        if self.mode != SourceMode::Telemetry {
            return SampleReport::ignored();
        }

        let limits = self.limits();
        let outcome = self.vehicle.ingest_telemetry(sample, now_ms, &limits);

        if outcome.position_valid {
            if let Some(pos) = self.vehicle.position {
                self.heat.push(HeatPoint {
                    lat: pos.lat,
                    lon: pos.lon,
                    current_amps: self.vehicle.current,
                });
            }
        }

        self.derive(outcome, now_ms)
    }

    /// Keep the raw packet for camera sync, then process it.
    pub fn ingest_telemetry_value(&mut self, packet: serde_json::Value, now_ms: f64) -> SampleReport {
        let sample = RawSample::from_value(packet.clone());
        if self.mode == SourceMode::Telemetry {
            self.sync.add_telemetry(packet, now_ms);
        }
        self.ingest_telemetry(&sample, now_ms)
    }

    /// Process one phone GPS fix. Ignored unless in GPS fallback mode.
    pub fn ingest_gps_fix(&mut self, fix: &GpsFix, now_ms: f64) -> SampleReport {
        if self.mode != SourceMode::GpsFallback {
            return SampleReport::ignored();
        }

        let limits = self.limits();
        let outcome = self.vehicle.ingest_gps_fix(fix, now_ms, &limits);
        if !outcome.position_valid {
            return SampleReport { ignored: false, ingest: Some(outcome), motion: None, lap: None, turn: None };
        }
        self.derive(outcome, now_ms)
    }

    /// Store a camera-unit GPS packet for video sync.
    pub fn record_pi_gps(&mut self, packet: PiGpsPacket, now_ms: f64) {
        self.sync.add_pi_gps(packet, now_ms);
    }

    /// Run the downstream stages for an ingested sample.
    ///
    /// Each stage is isolated: a failure in one is logged and the others
    /// still run.
    fn derive(&mut self, outcome: IngestOutcome, now_ms: f64) -> SampleReport {
        let speed = self.vehicle.speed_kmh;
        let threshold = self.tuning.movement_threshold_kmh;
        let idle_ms = self.tuning.idle_timeout_ms;

        let motion = isolated("motion", || {
            self.motion.evaluate(speed, now_ms, &mut self.timer, threshold, idle_ms)
        });

        let Some(position) = self.vehicle.position else {
            return SampleReport { ignored: false, ingest: Some(outcome), motion, lap: None, turn: None };
        };

        let thresholds = LapThresholds {
            leave_deg: self.tuning.leave_threshold_deg,
            return_deg: self.tuning.return_threshold_deg,
            max_efficiency: self.tuning.max_efficiency_km_per_kwh,
        };
        let distance = self.vehicle.cumulative_distance_km;
        let energy = self.vehicle.cumulative_energy_wh;

        let lap = isolated("lap", || self.laps.evaluate(position, distance, energy, &thresholds));
        if let Some(LapEvent::Completed(_)) = lap {
            self.heat.clear();
        }

        let radius = self.tuning.turn_radius_deg;
        let track = &self.track;
        let turns = &mut self.turns;
        let turn = isolated("turns", || turns.update(position, &track.turns, radius));

        SampleReport { ignored: false, ingest: Some(outcome), motion, lap, turn }
    }

    /// The primary transport is gone: switch to phone GPS for good.
    ///
    /// Returns true if this call performed the switch.
    pub fn transport_lost(&mut self) -> bool {
        if self.mode == SourceMode::GpsFallback {
            return false;
        }
        self.mode = SourceMode::GpsFallback;
        warn!("Telemetry transport lost; switching to GPS fallback (current, energy and efficiency disabled)");
        true
    }

    /// No position source exists at all. Shown to the user.
    pub fn no_position_source(&mut self, reason: &str) {
        error!("No position source available: {reason}");
        self.fatal = Some(format!("GPS not available on this device: {reason}"));
    }

    /// Racing-line guidance for the current position.
    pub fn guidance(&self) -> Option<Guidance> {
        let position = self.vehicle.position?;
        guidance_for(
            self.racing_line.as_deref(),
            position,
            self.vehicle.speed_kmh,
            self.tuning.on_line_m,
        )
    }

    /// Request for the overlay projection, once a position is known.
    pub fn projection_request(&self) -> Option<ProjectionRequest> {
        let position = self.vehicle.position?;
        Some(ProjectionRequest {
            latitude: position.lat,
            longitude: position.lon,
            heading: self.vehicle.heading_deg,
            speed: self.vehicle.speed_kmh,
            canvas_width: self.tuning.camera.canvas_width,
            canvas_height: self.tuning.camera.canvas_height,
        })
    }

    /// Inputs for projecting locally, detached from the session.
    pub fn local_fallback(&self) -> LocalFallback {
        LocalFallback {
            track: Arc::clone(&self.track),
            tuning: Arc::clone(&self.tuning),
        }
    }

    /// Replace the drawn overlay.
    pub fn apply_overlay(&mut self, frame: OverlayFrame) {
        self.overlay = Some(frame);
    }

    pub fn overlay(&self) -> Option<&OverlayFrame> {
        self.overlay.as_ref()
    }

    /// Build the frame the UI draws.
    ///
    /// Heat-map colors are included only when the buffer changed since
    /// the last frame that carried them.
    pub fn render_frame(&mut self, now_ms: f64) -> RenderFrame {
        let electrical = self.mode == SourceMode::Telemetry;
        let heat = self.heat.take_render_request().then(|| self.heat.render());

        RenderFrame {
            speed_kmh: self.vehicle.speed_kmh,
            speed_fraction: speed_fraction(self.vehicle.speed_kmh, self.tuning.speedometer_max_kmh),
            current_amps: electrical.then(|| self.vehicle.current.abs()),
            timer: self.timer.display(now_ms),
            timer_running: self.timer.is_running(),
            lap: self.laps.lap(),
            efficiencies: if electrical { self.laps.efficiencies().to_vec() } else { Vec::new() },
            electrical_available: electrical,
            heat,
            turn_cue: self.turn_cue(),
            guidance: self.guidance(),
            overlay: self.overlay.clone(),
            position: self.vehicle.position.unwrap_or(self.track.start),
            heading_deg: self.vehicle.heading_deg,
            source: self.mode,
            fatal: self.fatal.clone(),
        }
    }
}

fn isolated<T>(stage: &str, f: impl FnOnce() -> Option<T>) -> Option<T> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(_) => {
            error!("{stage} stage failed; sample processing continues");
            None
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("track", &self.track.name)
            .field("mode", &self.mode)
            .field("lap", &self.laps.lap())
            .field("vehicle", &self.vehicle)
            .finish_non_exhaustive()
    }
}

/// Log a one-line summary when a session starts.
pub fn log_session_start(session: &Session) {
    info!(
        "Session on {}: {} turns, {} outline points, racing line {}",
        session.track.name,
        session.track.turns.len(),
        session.track.outline.len(),
        if session.racing_line.is_some() { "loaded" } else { "unavailable" }
    );
}
