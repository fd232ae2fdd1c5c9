//! Turn proximity cues.
//!
//! Turns are static configuration. The detector scans them in list
//! order on every sample and signals only when the active turn changes,
//! so the cue display is touched once per transition rather than once
//! per sample.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::geo::{bearing_change_deg, bearing_deg, planar_distance_deg, GeoPoint, Located};

/// Bearing change below which a corner reads as straight, in degrees.
const STRAIGHT_MAX_DEG: f64 = 20.0;

/// Direction of a turn as shown to the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnKind {
    Left,
    Right,
    Straight,
}

impl TurnKind {
    /// Classify a signed bearing change (positive = right).
    pub fn from_bearing_change(angle: f64) -> Self {
        if angle.abs() <= STRAIGHT_MAX_DEG {
            TurnKind::Straight
        } else if angle > 0.0 {
            TurnKind::Right
        } else {
            TurnKind::Left
        }
    }

    /// Parse a free-form label such as a GPX `<sym>` value.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "left" | "turn left" => Some(TurnKind::Left),
            "right" | "turn right" => Some(TurnKind::Right),
            "straight" => Some(TurnKind::Straight),
            _ => None,
        }
    }

    /// Classify the corner at `b` when approached from `a` and left toward `c`.
    pub fn at_corner(a: GeoPoint, b: GeoPoint, c: GeoPoint) -> Self {
        let change = bearing_change_deg(bearing_deg(a, b), bearing_deg(b, c));
        Self::from_bearing_change(change)
    }
}

/// A named corner on the circuit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub lat: f64,
    pub lon: f64,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: TurnKind,
}

impl Located for Turn {
    fn position(&self) -> GeoPoint {
        GeoPoint::new(self.lat, self.lon)
    }
}

/// Cue shown on the directional helper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnCue {
    #[default]
    None,
    Left,
    Right,
    Straight,
}

impl From<TurnKind> for TurnCue {
    fn from(kind: TurnKind) -> Self {
        match kind {
            TurnKind::Left => TurnCue::Left,
            TurnKind::Right => TurnCue::Right,
            TurnKind::Straight => TurnCue::Straight,
        }
    }
}

/// Edge emitted when the active turn changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnTransition {
    /// Entered the zone of the turn at this index.
    Entered(usize),
    /// Left the zone of the turn at this index with no other turn nearby.
    Exited(usize),
}

/// Tracks which turn, if any, the vehicle is currently inside.
#[derive(Debug, Clone, Default)]
pub struct TurnDetector {
    current: Option<usize>,
}

impl TurnDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of the active turn.
    pub fn current(&self) -> Option<usize> {
        self.current
    }

    /// Cue for the active turn.
    pub fn cue(&self, turns: &[Turn]) -> TurnCue {
        self.current
            .and_then(|i| turns.get(i))
            .map(|t| t.kind.into())
            .unwrap_or_default()
    }

    /// Evaluate one position. The first turn within `radius_deg` wins.
    pub fn update(
        &mut self,
        position: GeoPoint,
        turns: &[Turn],
        radius_deg: f64,
    ) -> Option<TurnTransition> {
        let inside = turns
            .iter()
            .position(|t| planar_distance_deg(position, t.position()) < radius_deg);

        match (self.current, inside) {
            (Some(prev), Some(now)) if prev == now => None,
            (_, Some(now)) => {
                self.current = Some(now);
                debug!("Approaching {} ({:?})", turns[now].name, turns[now].kind);
                Some(TurnTransition::Entered(now))
            }
            (Some(prev), None) => {
                self.current = None;
                debug!("Cleared {}", turns.get(prev).map_or("turn", |t| t.name.as_str()));
                Some(TurnTransition::Exited(prev))
            }
            (None, None) => None,
        }
    }
}
