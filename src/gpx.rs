//! GPX 1.1 track import.
//!
//! Wraps the `gpx` crate and extracts a circuit description: the outline
//! comes from the first track (segments flattened) or, failing that, the
//! first route. Waypoints become turns, except for the ones named as the
//! start/finish or the mandatory stop line.
//!
//! A waypoint's `<sym>` element names the turn direction ("left",
//! "right", "straight"). Without one, the direction is inferred from the
//! outline's bearing change at the closest outline point.

use std::io::Read;

use crate::error::LoadError;
use crate::geo::{nearest_point, GeoPoint};
use crate::turns::{Turn, TurnKind};

/// Circuit data extracted from a GPX file.
#[derive(Debug, Clone)]
pub struct GpxCircuit {
    pub name: Option<String>,
    pub outline: Vec<GeoPoint>,
    pub start: Option<GeoPoint>,
    pub stop_line: Option<GeoPoint>,
    pub turns: Vec<Turn>,
}

/// Parse a GPX file from any reader.
pub fn parse<R: Read>(reader: R) -> Result<GpxCircuit, LoadError> {
    let gpx = gpx::read(reader).map_err(|e| LoadError::Gpx(e.to_string()))?;

    let (name, outline): (Option<String>, Vec<GeoPoint>) = if let Some(track) = gpx.tracks.first() {
        let points = track
            .segments
            .iter()
            .flat_map(|seg| seg.points.iter())
            .map(|wp| GeoPoint::new(wp.point().y(), wp.point().x()))
            .collect();
        (track.name.clone(), points)
    } else if let Some(route) = gpx.routes.first() {
        let points = route
            .points
            .iter()
            .map(|wp| GeoPoint::new(wp.point().y(), wp.point().x()))
            .collect();
        (route.name.clone(), points)
    } else {
        (None, Vec::new())
    };

    if outline.is_empty() {
        return Err(LoadError::Invalid("GPX file has no track or route points".into()));
    }

    let mut start = None;
    let mut stop_line = None;
    let mut turns = Vec::new();

    for (i, wp) in gpx.waypoints.iter().enumerate() {
        let point = GeoPoint::new(wp.point().y(), wp.point().x());
        let label = wp.name.clone().unwrap_or_else(|| format!("TURN {}", i + 1));

        match label.trim().to_ascii_lowercase().as_str() {
            "start" | "finish" | "start/finish" => {
                start = Some(point);
                continue;
            }
            "stop" | "stop line" => {
                stop_line = Some(point);
                continue;
            }
            _ => {}
        }

        let kind = wp
            .symbol
            .as_deref()
            .and_then(TurnKind::from_label)
            .unwrap_or_else(|| infer_turn_kind(point, &outline));

        turns.push(Turn {
            lat: point.lat,
            lon: point.lon,
            name: label,
            kind,
        });
    }

    Ok(GpxCircuit { name, outline, start, stop_line, turns })
}

/// Parse GPX from a byte slice. Convenience wrapper for JNI.
pub fn parse_bytes(data: &[u8]) -> Result<GpxCircuit, LoadError> {
    parse(data)
}

/// Direction of the outline's corner nearest to `point`.
///
/// The outline is treated as a closed loop, so the neighbors of the
/// first and last points wrap around.
fn infer_turn_kind(point: GeoPoint, outline: &[GeoPoint]) -> TurnKind {
    if outline.len() < 3 {
        return TurnKind::Straight;
    }
    let Some(hit) = nearest_point(point, outline) else {
        return TurnKind::Straight;
    };

    let n = outline.len();
    let prev = outline[(hit.index + n - 1) % n];
    let next = outline[(hit.index + 1) % n];
    TurnKind::at_corner(prev, outline[hit.index], next)
}
