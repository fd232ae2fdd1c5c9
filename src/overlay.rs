//! Camera overlay projection.
//!
//! Projects upcoming track points onto the forward camera image with a
//! simplified pinhole model: flat-Earth offsets in meters, rotation into
//! the vehicle frame, near/far clipping, then a linear angle-to-pixel
//! mapping across each half field of view.
//!
//! The local projector produces exactly the response shape of the
//! remote projection service, so the renderer never needs to know which
//! one answered.

use serde::{Deserialize, Serialize};

use crate::geo::{local_offset_m, nearest_point, GeoPoint, METERS_PER_DEGREE};

/// Segment label reported by the local projector.
pub const LOCAL_SEGMENT: &str = "LOCAL";

/// Target speed reported by the local projector.
pub const LOCAL_TARGET_SPEED_KMH: f64 = 30.0;

/// Degree distance within which the local projector reports "on track".
const LOCAL_ON_TRACK_DEG: f64 = 0.0001;

/// Forward camera geometry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraModel {
    pub fov_h_deg: f64,
    pub fov_v_deg: f64,
    pub height_m: f64,
    /// Points at or nearer than this (meters ahead) are dropped.
    pub near_m: f64,
    /// Points farther than this (meters ahead) are dropped.
    pub far_m: f64,
    /// Number of outline points considered ahead of the nearest one.
    pub lookahead_points: usize,
    pub canvas_width: u32,
    pub canvas_height: u32,
}

impl Default for CameraModel {
    fn default() -> Self {
        Self {
            fov_h_deg: 118.0,
            fov_v_deg: 69.0,
            height_m: 0.8,
            near_m: 0.5,
            far_m: 40.0,
            lookahead_points: 30,
            canvas_width: 1280,
            canvas_height: 720,
        }
    }
}

/// Request sent to the projection service.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProjectionRequest {
    pub latitude: f64,
    pub longitude: f64,
    pub heading: f64,
    pub speed: f64,
    #[serde(alias = "camera_width")]
    pub canvas_width: u32,
    #[serde(alias = "camera_height")]
    pub canvas_height: u32,
}

impl ProjectionRequest {
    pub fn position(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }
}

/// Overlay response. Remote and local paths both produce this.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayFrame {
    pub overlay_points: Vec<[i32; 2]>,
    pub target_speed: f64,
    pub deviation_m: f64,
    pub segment: String,
    pub on_track: bool,
}

impl OverlayFrame {
    /// Response when there is nothing to project against.
    pub fn empty() -> Self {
        Self {
            overlay_points: Vec::new(),
            target_speed: 0.0,
            deviation_m: 0.0,
            segment: "N/A".into(),
            on_track: false,
        }
    }
}

/// Project one track point to a pixel, or None if it is not visible.
pub fn project_point(
    target: GeoPoint,
    car: GeoPoint,
    heading_deg: f64,
    camera: &CameraModel,
    width: u32,
    height: u32,
) -> Option<[i32; 2]> {
    let (dx, dy) = local_offset_m(car, target);

    // Rotate east/north by -heading into (right, forward).
    let heading = heading_deg.to_radians();
    let rel_x = dx * heading.cos() + dy * heading.sin();
    let rel_y = -dx * heading.sin() + dy * heading.cos();

    if rel_y <= camera.near_m || rel_y > camera.far_m {
        return None;
    }

    let half_h = camera.fov_h_deg / 2.0;
    let angle_h = rel_x.atan2(rel_y).to_degrees();
    if angle_h.abs() > half_h {
        return None;
    }
    let angle_v = camera.height_m.atan2(rel_y).to_degrees();

    let w = f64::from(width);
    let h = f64::from(height);
    let px = (w / 2.0 + (angle_h / half_h) * (w / 2.0)).round();
    let py = (h / 2.0 + (angle_v / (camera.fov_v_deg / 2.0)) * (h / 2.0)).round();

    let max_x = f64::from(width.saturating_sub(1));
    let max_y = f64::from(height.saturating_sub(1));
    Some([px.clamp(0.0, max_x) as i32, py.clamp(0.0, max_y) as i32])
}

/// Local overlay computation over a closed track outline.
#[derive(Debug, Clone)]
pub struct LocalProjector<'a> {
    pub outline: &'a [GeoPoint],
    pub camera: &'a CameraModel,
}

impl LocalProjector<'_> {
    pub fn project(&self, request: &ProjectionRequest) -> OverlayFrame {
        let car = request.position();
        let Some(nearest) = nearest_point(car, self.outline) else {
            return OverlayFrame::empty();
        };

        let lookahead = self.camera.lookahead_points.min(self.outline.len());
        let overlay_points = (0..lookahead)
            .map(|i| self.outline[(nearest.index + i) % self.outline.len()])
            .filter_map(|p| {
                project_point(
                    p,
                    car,
                    request.heading,
                    self.camera,
                    request.canvas_width,
                    request.canvas_height,
                )
            })
            .collect();

        OverlayFrame {
            overlay_points,
            target_speed: LOCAL_TARGET_SPEED_KMH,
            deviation_m: nearest.distance_deg * METERS_PER_DEGREE,
            segment: LOCAL_SEGMENT.into(),
            on_track: nearest.distance_deg < LOCAL_ON_TRACK_DEG,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CAR: GeoPoint = GeoPoint::new(25.0, 51.0);

    fn ahead_north(meters: f64) -> GeoPoint {
        GeoPoint::new(CAR.lat + meters / METERS_PER_DEGREE, CAR.lon)
    }

    fn east_of(p: GeoPoint, meters: f64) -> GeoPoint {
        GeoPoint::new(p.lat, p.lon + meters / (METERS_PER_DEGREE * CAR.lat.to_radians().cos()))
    }

    #[test]
    fn point_behind_is_excluded() {
        let cam = CameraModel::default();
        assert!(project_point(ahead_north(-1.0), CAR, 0.0, &cam, 1280, 720).is_none());
        assert!(project_point(ahead_north(0.4), CAR, 0.0, &cam, 1280, 720).is_none());
    }

    #[test]
    fn point_beyond_far_plane_is_excluded() {
        let cam = CameraModel::default();
        assert!(project_point(ahead_north(45.0), CAR, 0.0, &cam, 1280, 720).is_none());
    }

    #[test]
    fn straight_ahead_maps_to_horizontal_center() {
        let cam = CameraModel::default();
        let [x, y] = project_point(ahead_north(20.0), CAR, 0.0, &cam, 1280, 720).unwrap();
        assert!((x - 640).abs() <= 1, "x = {x}");
        // Below the horizon: ground points sit under the image center.
        assert!(y > 360 && y < 400, "y = {y}");
    }

    #[test]
    fn heading_rotates_frame() {
        let cam = CameraModel::default();
        // Rotating by -270 brings a point 20 m east onto the forward axis.
        let east = east_of(CAR, 20.0);
        let [x, _] = project_point(east, CAR, 270.0, &cam, 1280, 720).unwrap();
        assert!((x - 640).abs() <= 1, "x = {x}");

        // At 90 it lands behind the car; at 0 it is level with it.
        assert!(project_point(east, CAR, 90.0, &cam, 1280, 720).is_none());
        assert!(project_point(east, CAR, 0.0, &cam, 1280, 720).is_none());
    }

    #[test]
    fn diagonal_heading_matches_remote_service() {
        let cam = CameraModel::default();
        let north_east = east_of(ahead_north(10.0), 10.0);

        // rel_y = 10 cos 315 - 10 sin 315 = 14.1 m, rel_x = 0.
        let [x, y] = project_point(north_east, CAR, 315.0, &cam, 1280, 720).unwrap();
        assert!((x - 640).abs() <= 1, "x = {x}");
        assert!(y > 360, "y = {y}");

        // rel_y = 0 at 45 degrees: level with the car.
        assert!(project_point(north_east, CAR, 45.0, &cam, 1280, 720).is_none());
    }

    #[test]
    fn right_of_center_maps_right() {
        let cam = CameraModel::default();
        let target = east_of(ahead_north(20.0), 5.0);
        let [x, _] = project_point(target, CAR, 0.0, &cam, 1280, 720).unwrap();
        assert!(x > 640, "x = {x}");

        // Facing south the same offset is on the left.
        let behind_then_east = east_of(ahead_north(-20.0), 5.0);
        let [x, _] = project_point(behind_then_east, CAR, 180.0, &cam, 1280, 720).unwrap();
        assert!(x < 640, "x = {x}");
    }

    #[test]
    fn local_target_speed_is_fixed() {
        let outline = vec![CAR, ahead_north(10.0), ahead_north(20.0)];
        let cam = CameraModel::default();
        let projector = LocalProjector { outline: &outline, camera: &cam };
        let request = ProjectionRequest {
            latitude: CAR.lat,
            longitude: CAR.lon,
            heading: 0.0,
            speed: 12.0,
            canvas_width: 1280,
            canvas_height: 720,
        };
        assert_eq!(projector.project(&request).target_speed, LOCAL_TARGET_SPEED_KMH);
    }

    #[test]
    fn pixels_are_clamped_to_canvas() {
        let cam = CameraModel { fov_v_deg: 2.0, ..CameraModel::default() };
        let [_, y] = project_point(ahead_north(1.0), CAR, 0.0, &cam, 1280, 720).unwrap();
        assert_eq!(y, 719);
    }

    #[test]
    fn local_projection_skips_points_behind() {
        let outline: Vec<GeoPoint> = [-1.0, 0.0, 5.0, 10.0, 20.0, 30.0, 60.0]
            .iter()
            .map(|m| ahead_north(*m))
            .collect();
        let cam = CameraModel::default();
        let projector = LocalProjector { outline: &outline, camera: &cam };

        let request = ProjectionRequest {
            latitude: CAR.lat,
            longitude: CAR.lon,
            heading: 0.0,
            speed: 20.0,
            canvas_width: 1280,
            canvas_height: 720,
        };
        let frame = projector.project(&request);

        // Nearest is index 1 (the car itself, 0 m); visible: 5, 10, 20, 30 m.
        // The lookahead wraps to index 0 (1 m behind), which is dropped.
        assert_eq!(frame.overlay_points.len(), 4);
        assert_eq!(frame.segment, LOCAL_SEGMENT);
        assert_eq!(frame.target_speed, LOCAL_TARGET_SPEED_KMH);
        assert!(frame.on_track);
        assert!(frame.deviation_m < 1e-6);
    }

    #[test]
    fn local_projection_wraps_closed_loop() {
        // Car at the last outline point; the loop continues from index 0.
        let outline = vec![ahead_north(10.0), ahead_north(20.0), CAR];
        let cam = CameraModel::default();
        let projector = LocalProjector { outline: &outline, camera: &cam };
        let request = ProjectionRequest {
            latitude: CAR.lat,
            longitude: CAR.lon,
            heading: 0.0,
            speed: 0.0,
            canvas_width: 640,
            canvas_height: 480,
        };
        let frame = projector.project(&request);
        // Lookahead is capped at the loop length, so each point is visited once.
        assert_eq!(frame.overlay_points.len(), 2);
    }

    #[test]
    fn empty_outline_gives_empty_frame() {
        let cam = CameraModel::default();
        let projector = LocalProjector { outline: &[], camera: &cam };
        let request = ProjectionRequest {
            latitude: CAR.lat,
            longitude: CAR.lon,
            heading: 0.0,
            speed: 0.0,
            canvas_width: 1280,
            canvas_height: 720,
        };
        assert_eq!(projector.project(&request), OverlayFrame::empty());
    }

    #[test]
    fn request_accepts_camera_field_names() {
        let req: ProjectionRequest = serde_json::from_str(
            r#"{"latitude": 25.0, "longitude": 51.0, "heading": 45.0, "speed": 30.0,
                "camera_width": 1280, "camera_height": 720}"#,
        )
        .unwrap();
        assert_eq!(req.canvas_width, 1280);
    }
}
