//! Ideal racing line table and position matching.
//!
//! The table is loaded once and treated as read-only. When no table is
//! available, guidance simply reports nothing; it never fails the
//! sample pipeline.

use std::path::Path;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::error::LoadError;
use crate::geo::{nearest_point, GeoPoint, Located};

/// Target speeds per quarter of the lap for the generated default line.
const DEFAULT_QUARTER_SPEEDS_KMH: [f64; 4] = [30.0, 25.0, 28.0, 32.0];
const DEFAULT_QUARTER_EFFICIENCY: [f64; 4] = [150.0, 145.0, 160.0, 155.0];

/// One point of the ideal line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RacingLinePoint {
    pub lat: f64,
    pub lon: f64,
    #[serde(alias = "target_speed_kmh")]
    pub target_speed: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segment_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segment_id: Option<usize>,
}

impl Located for RacingLinePoint {
    fn position(&self) -> GeoPoint {
        GeoPoint::new(self.lat, self.lon)
    }
}

/// Display-only segment of the ideal line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RacingLineSegment {
    #[serde(default)]
    pub id: usize,
    pub name: String,
    #[serde(default, alias = "target_speed_kmh")]
    pub target_speed: f64,
    #[serde(default, alias = "efficiency_km_kwh")]
    pub efficiency: f64,
    /// Polyline as `[lat, lon]` pairs, for drawing only.
    #[serde(default)]
    pub path: Vec<[f64; 2]>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RacingLineTable {
    pub racing_line: Vec<RacingLinePoint>,
    #[serde(default)]
    pub segments: Vec<RacingLineSegment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

/// Guidance for the current position.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Guidance {
    pub target_speed_kmh: f64,
    pub deviation_m: f64,
    /// Within the on-line band. Display only.
    pub on_line: bool,
    /// Target minus current speed.
    pub speed_diff_kmh: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub segment: Option<String>,
    /// Index of the matched point in the table.
    pub index: usize,
}

impl RacingLineTable {
    /// Parse a table from JSON. An empty point list is rejected.
    pub fn from_json(data: &str) -> Result<Self, LoadError> {
        let table: Self = serde_json::from_str(data)?;
        if table.racing_line.is_empty() {
            return Err(LoadError::Invalid("racing line has no points".into()));
        }
        Ok(table)
    }

    /// Read a table from disk.
    pub fn load(path: &Path) -> Result<Self, LoadError> {
        let data = std::fs::read_to_string(path)?;
        Self::from_json(&data)
    }

    /// Load a table, degrading to None with a warning on any failure.
    pub fn load_optional(path: &Path) -> Option<Self> {
        match Self::load(path) {
            Ok(table) => {
                info!(
                    "Loaded racing line: {} points, {} segments",
                    table.racing_line.len(),
                    table.segments.len()
                );
                Some(table)
            }
            Err(e) => {
                warn!("Racing line unavailable ({e}); guidance disabled");
                None
            }
        }
    }

    /// Generate a default line from a track outline.
    ///
    /// The outline is cut into four quarters (Q1..Q4), each with its own
    /// target speed.
    pub fn from_outline(outline: &[GeoPoint]) -> Self {
        let quarter = (outline.len() / 4).max(1);

        let racing_line = outline
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let id = (i / quarter).min(3);
                RacingLinePoint {
                    lat: p.lat,
                    lon: p.lon,
                    target_speed: DEFAULT_QUARTER_SPEEDS_KMH[id],
                    segment_name: Some(format!("Q{}", id + 1)),
                    segment_id: Some(id),
                }
            })
            .collect::<Vec<_>>();

        let segments = (0..4)
            .map(|id| RacingLineSegment {
                id,
                name: format!("Q{}", id + 1),
                target_speed: DEFAULT_QUARTER_SPEEDS_KMH[id],
                efficiency: DEFAULT_QUARTER_EFFICIENCY[id],
                path: racing_line
                    .iter()
                    .filter(|p| p.segment_id == Some(id))
                    .map(|p| [p.lat, p.lon])
                    .collect(),
            })
            .collect();

        Self { racing_line, segments, metadata: None }
    }

    /// Segment metadata for a matched point, if the table carries it.
    pub fn segment_of(&self, point: &RacingLinePoint) -> Option<&RacingLineSegment> {
        let id = point.segment_id?;
        self.segments.iter().find(|s| s.id == id)
    }

    /// Match a position against the line.
    pub fn guidance(&self, position: GeoPoint, speed_kmh: f64, on_line_m: f64) -> Option<Guidance> {
        let hit = nearest_point(position, &self.racing_line)?;
        let point = hit.item;

        Some(Guidance {
            target_speed_kmh: point.target_speed,
            deviation_m: hit.distance_m,
            on_line: hit.distance_m < on_line_m,
            speed_diff_kmh: point.target_speed - speed_kmh,
            segment: point
                .segment_name
                .clone()
                .or_else(|| self.segment_of(point).map(|s| s.name.clone())),
            index: hit.index,
        })
    }
}

/// Guidance against an optional table. Missing table means no guidance.
pub fn guidance_for(
    table: Option<&RacingLineTable>,
    position: GeoPoint,
    speed_kmh: f64,
    on_line_m: f64,
) -> Option<Guidance> {
    table?.guidance(position, speed_kmh, on_line_m)
}
