//! Inbound sample model.
//!
//! Telemetry packets arrive as loosely-typed JSON. Every field is
//! optional and may hold a string, `null`, or nothing at all, so fields
//! are kept as raw [`serde_json::Value`]s and coerced on read.

use serde::Deserialize;
use serde_json::Value;

use crate::geo::GeoPoint;

/// One telemetry packet as received from the car.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawSample {
    #[serde(default)]
    pub voltage: Option<Value>,
    #[serde(default)]
    pub current: Option<Value>,
    #[serde(default)]
    pub power: Option<Value>,
    #[serde(default)]
    pub speed: Option<Value>,
    #[serde(default)]
    pub rpm: Option<Value>,
    #[serde(default)]
    pub distance_km: Option<Value>,
    #[serde(default)]
    pub latitude: Option<Value>,
    #[serde(default)]
    pub longitude: Option<Value>,
}

impl RawSample {
    /// Build a sample from any JSON value. Non-objects yield an empty sample.
    pub fn from_value(value: Value) -> Self {
        if !value.is_object() {
            return Self::default();
        }
        serde_json::from_value(value).unwrap_or_default()
    }

    /// Parse a JSON payload.
    pub fn from_json(payload: &str) -> Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_str(payload)?;
        Ok(Self::from_value(value))
    }

    /// Position carried by this sample, if both coordinates are usable.
    pub fn position(&self) -> Option<GeoPoint> {
        let lat = coordinate(self.latitude.as_ref(), 90.0)?;
        let lon = coordinate(self.longitude.as_ref(), 180.0)?;
        Some(GeoPoint::new(lat, lon))
    }
}

/// A position fix from the phone's own location provider.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct GpsFix {
    pub latitude: f64,
    pub longitude: f64,
    /// Ground speed reported by the provider, m/s.
    #[serde(default)]
    pub speed_mps: Option<f64>,
}

impl GpsFix {
    pub fn position(&self) -> Option<GeoPoint> {
        let lat = valid_coordinate(self.latitude, 90.0)?;
        let lon = valid_coordinate(self.longitude, 180.0)?;
        Some(GeoPoint::new(lat, lon))
    }
}

/// Coerce a field to a finite number, or None when it has no numeric reading.
///
/// Numeric strings are accepted; booleans count as 1/0. Empty strings
/// read as 0.
pub fn finite_number(value: Option<&Value>) -> Option<f64> {
    let v = match value? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                0.0
            } else {
                trimmed.parse::<f64>().ok()?
            }
        }
        Value::Bool(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        Value::Null => 0.0,
        Value::Array(_) | Value::Object(_) => return None,
    };

    v.is_finite().then_some(v)
}

/// Coerce a field to a finite number; anything unusable becomes 0.
pub fn safe_number(value: Option<&Value>) -> f64 {
    finite_number(value).unwrap_or(0.0)
}

fn coordinate(value: Option<&Value>, limit: f64) -> Option<f64> {
    valid_coordinate(finite_number(value)?, limit)
}

// Exact zero is how a missing fix shows up on the wire.
fn valid_coordinate(v: f64, limit: f64) -> Option<f64> {
    (v.is_finite() && v != 0.0 && v.abs() <= limit).then_some(v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn safe_number_coerces_invalid_to_zero() {
        assert_eq!(safe_number(None), 0.0);
        assert_eq!(safe_number(Some(&json!(null))), 0.0);
        assert_eq!(safe_number(Some(&json!("abc"))), 0.0);
        assert_eq!(safe_number(Some(&json!("Infinity"))), 0.0);
        assert_eq!(safe_number(Some(&json!([1, 2]))), 0.0);
        assert_eq!(safe_number(Some(&json!({"v": 1}))), 0.0);
    }

    #[test]
    fn safe_number_accepts_numbers_and_numeric_strings() {
        assert_eq!(safe_number(Some(&json!(48.5))), 48.5);
        assert_eq!(safe_number(Some(&json!(-3))), -3.0);
        assert_eq!(safe_number(Some(&json!(" 12.25 "))), 12.25);
        assert_eq!(safe_number(Some(&json!(true))), 1.0);
    }

    #[test]
    fn finite_number_distinguishes_missing() {
        assert_eq!(finite_number(None), None);
        assert_eq!(finite_number(Some(&json!("x"))), None);
        assert_eq!(finite_number(Some(&json!(2.0))), Some(2.0));
    }

    #[test]
    fn sample_from_json_with_mixed_fields() {
        let sample = RawSample::from_json(
            r#"{"voltage": "48.2", "current": null, "speed": 12, "latitude": 25.4887, "longitude": 51.45}"#,
        )
        .unwrap();

        assert_eq!(safe_number(sample.voltage.as_ref()), 48.2);
        assert_eq!(safe_number(sample.current.as_ref()), 0.0);
        assert_eq!(safe_number(sample.power.as_ref()), 0.0);
        let pos = sample.position().unwrap();
        assert!((pos.lat - 25.4887).abs() < 1e-9);
    }

    #[test]
    fn sample_position_rejects_zero_and_garbage() {
        let zero = RawSample::from_value(json!({"latitude": 0, "longitude": 51.45}));
        assert!(zero.position().is_none());

        let garbage = RawSample::from_value(json!({"latitude": "north", "longitude": 51.45}));
        assert!(garbage.position().is_none());

        let out_of_range = RawSample::from_value(json!({"latitude": 125.0, "longitude": 51.45}));
        assert!(out_of_range.position().is_none());

        let missing = RawSample::from_value(json!({"speed": 10}));
        assert!(missing.position().is_none());
    }

    #[test]
    fn non_object_payload_is_empty_sample() {
        let sample = RawSample::from_value(json!([1, 2, 3]));
        assert!(sample.speed.is_none());
        assert!(sample.position().is_none());
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(RawSample::from_json("{not json").is_err());
    }

    #[test]
    fn gps_fix_position_validation() {
        let fix = GpsFix { latitude: 25.49, longitude: 51.45, speed_mps: None };
        assert!(fix.position().is_some());

        let bad = GpsFix { latitude: f64::NAN, longitude: 51.45, speed_mps: None };
        assert!(bad.position().is_none());
    }
}
