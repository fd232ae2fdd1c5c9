//! Static session configuration.
//!
//! Track geometry and tuning constants are loaded once when a session
//! starts and never change afterwards.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::LoadError;
use crate::geo::GeoPoint;
use crate::gpx;
use crate::overlay::CameraModel;
use crate::turns::{Turn, TurnKind};

/// Circuit geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackConfig {
    pub name: String,
    /// Start/finish point used for lap detection.
    pub start: GeoPoint,
    /// Mandatory mid-race stop point, display only.
    #[serde(default)]
    pub stop_line: Option<GeoPoint>,
    #[serde(default)]
    pub turns: Vec<Turn>,
    /// Closed loop; the last point repeats the first.
    #[serde(default)]
    pub outline: Vec<GeoPoint>,
}

impl TrackConfig {
    pub fn from_json(data: &str) -> Result<Self, LoadError> {
        let config: Self = serde_json::from_str(data)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, LoadError> {
        let data = std::fs::read_to_string(path)?;
        Self::from_json(&data)
    }

    /// Build a track from a GPX file. Without a start waypoint, the first
    /// outline point is the start.
    pub fn from_gpx(data: &[u8]) -> Result<Self, LoadError> {
        let circuit = gpx::parse_bytes(data)?;
        let start = circuit.start.unwrap_or(circuit.outline[0]);

        let config = Self {
            name: circuit.name.unwrap_or_else(|| "GPX circuit".into()),
            start,
            stop_line: circuit.stop_line,
            turns: circuit.turns,
            outline: circuit.outline,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), LoadError> {
        let valid = |p: &GeoPoint| p.lat.is_finite() && p.lon.is_finite() && p.lat.abs() <= 90.0 && p.lon.abs() <= 180.0;

        if !valid(&self.start) {
            return Err(LoadError::Invalid(format!("start point out of range: {:?}", self.start)));
        }
        if let Some(bad) = self.outline.iter().find(|p| !valid(p)) {
            return Err(LoadError::Invalid(format!("outline point out of range: {bad:?}")));
        }
        if let Some(bad) = self.turns.iter().find(|t| !valid(&GeoPoint::new(t.lat, t.lon))) {
            return Err(LoadError::Invalid(format!("turn {} out of range", bad.name)));
        }
        Ok(())
    }

    /// Lusail short circuit, Qatar.
    pub fn lusail_short() -> Self {
        let turn = |lat, lon, name: &str, kind| Turn { lat, lon, name: name.into(), kind };

        Self {
            name: "Lusail Short Circuit".into(),
            start: GeoPoint::new(25.488435783, 51.450190017),
            stop_line: Some(GeoPoint::new(25.49187893325, 51.4508796665)),
            turns: vec![
                turn(25.492879, 51.447485, "TURN 1", TurnKind::Right),
                turn(25.493345, 51.447801, "TURN 2", TurnKind::Right),
                turn(25.493382, 51.448345, "TURN 3", TurnKind::Right),
                turn(25.491656, 51.451190, "TURN 4", TurnKind::Left),
                turn(25.491361, 51.451944, "TURN 5", TurnKind::Right),
                turn(25.489900, 51.459162, "TURN 6", TurnKind::Right),
                turn(25.487006, 51.458766, "TURN 7", TurnKind::Right),
            ],
            outline: LUSAIL_SHORT_OUTLINE
                .iter()
                .map(|&[lat, lon]| GeoPoint::new(lat, lon))
                .collect(),
        }
    }
}

const LUSAIL_SHORT_OUTLINE: [[f64; 2]; 47] = [
    [25.488720817, 51.450041667],
    [25.489118117, 51.449772783],
    [25.489634967, 51.4494259],
    [25.490174433, 51.4490968],
    [25.490778517, 51.448718667],
    [25.491375483, 51.4483175],
    [25.49207065, 51.447894133],
    [25.49281835, 51.447592117],
    [25.49332805, 51.44779815],
    [25.493340667, 51.4485594],
    [25.492783567, 51.4492677],
    [25.492344683, 51.4499655],
    [25.492093667, 51.4504178],
    [25.491843833, 51.450869917],
    [25.491728483, 51.451032067],
    [25.491605533, 51.451620533],
    [25.49126045, 51.45209375],
    [25.4907238, 51.452599483],
    [25.4903161, 51.4532868],
    [25.490022133, 51.454066267],
    [25.489953533, 51.454641933],
    [25.489913083, 51.455323067],
    [25.489864867, 51.4560174],
    [25.489941783, 51.456826383],
    [25.490047383, 51.457621017],
    [25.4901291, 51.458597433],
    [25.489850217, 51.4592955],
    [25.489330333, 51.459635267],
    [25.4888498, 51.459938433],
    [25.48819055, 51.459881967],
    [25.4876145, 51.459461033],
    [25.487013117, 51.458864067],
    [25.487152133, 51.4578886],
    [25.487378983, 51.456626417],
    [25.487225267, 51.455559233],
    [25.486557067, 51.45511635],
    [25.485987883, 51.454824083],
    [25.485314717, 51.454472317],
    [25.484617433, 51.45412505],
    [25.483955633, 51.453340033],
    [25.484620783, 51.452493867],
    [25.485420317, 51.45201425],
    [25.48590055, 51.451725583],
    [25.486500183, 51.451353483],
    [25.48733545, 51.4508152],
    [25.487992833, 51.4504049],
    [25.488720817, 51.450041667],
];

/// Thresholds and constants for the fusion core.
///
/// Degree thresholds are compared against
/// [`crate::geo::planar_distance_deg`]; multiply by 111 000 for meters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tuning {
    pub movement_threshold_kmh: f64,
    pub heading_min_speed_kmh: f64,
    pub idle_timeout_ms: f64,
    /// ~220 m
    pub leave_threshold_deg: f64,
    /// ~33 m
    pub return_threshold_deg: f64,
    /// ~55 m
    pub turn_radius_deg: f64,
    pub heat_capacity: usize,
    pub heat_render_every: usize,
    pub timer_budget_ms: f64,
    /// Power readings at or above this magnitude skip energy integration.
    pub max_power_w: f64,
    pub max_efficiency_km_per_kwh: f64,
    pub frame_interval_ms: f64,
    pub on_line_m: f64,
    /// Full-scale speed for the speedometer arc.
    pub speedometer_max_kmh: f64,
    pub projection_timeout_ms: u64,
    pub camera: CameraModel,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            movement_threshold_kmh: 0.5,
            heading_min_speed_kmh: 1.0,
            idle_timeout_ms: 15_000.0,
            leave_threshold_deg: 0.002,
            return_threshold_deg: 0.0003,
            turn_radius_deg: 0.0005,
            heat_capacity: 5000,
            heat_render_every: 5,
            timer_budget_ms: 35.0 * 60.0 * 1000.0,
            max_power_w: 1e6,
            max_efficiency_km_per_kwh: 10_000.0,
            frame_interval_ms: 90.0,
            on_line_m: 5.0,
            speedometer_max_kmh: 50.0,
            projection_timeout_ms: 1500,
            camera: CameraModel::default(),
        }
    }
}

impl Tuning {
    pub fn from_json(data: &str) -> Result<Self, LoadError> {
        let tuning: Self = serde_json::from_str(data)?;
        if tuning.return_threshold_deg >= tuning.leave_threshold_deg {
            return Err(LoadError::Invalid(
                "return threshold must be smaller than leave threshold".into(),
            ));
        }
        Ok(tuning)
    }
}
