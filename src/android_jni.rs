//! JNI bindings for the Android app.
//!
//! Each public function here corresponds to a `external fun` declaration
//! in RustBridge.kt. The function names follow JNI naming conventions:
//! Java_<package>_<class>_<method> with dots replaced by underscores.
//!
//! The app drives a single session held behind a mutex. Every call takes
//! the caller's timestamp in milliseconds so sample timing stays on the
//! Kotlin side's clock.

use std::sync::{Mutex, OnceLock, PoisonError};

use jni::objects::{JClass, JString};
use jni::sys::{jboolean, jdouble, jlong, jstring, JNI_FALSE, JNI_TRUE};
use jni::JNIEnv;
use log::{error, warn};

use crate::config::{TrackConfig, Tuning};
use crate::error::LoadError;
use crate::racing_line::RacingLineTable;
use crate::sample::GpsFix;
use crate::session::{log_session_start, Session};

static SESSION: OnceLock<Mutex<Option<Session>>> = OnceLock::new();

fn with_session<T>(f: impl FnOnce(&mut Session) -> T) -> Option<T> {
    let slot = SESSION.get_or_init(|| Mutex::new(None));
    let mut guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
    guard.as_mut().map(f)
}

fn replace_session(session: Session) {
    let slot = SESSION.get_or_init(|| Mutex::new(None));
    *slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(session);
}

/// Read an optional Java string. Null and empty both mean "not given".
fn optional_string(env: &mut JNIEnv, value: &JString) -> Option<String> {
    if value.is_null() {
        return None;
    }
    match env.get_string(value) {
        Ok(s) => Some(String::from(s)).filter(|s| !s.trim().is_empty()),
        Err(e) => {
            warn!("Unreadable string from Java: {e}");
            None
        }
    }
}

fn to_jboolean(value: bool) -> jboolean {
    if value {
        JNI_TRUE
    } else {
        JNI_FALSE
    }
}

fn build_session(
    track_json: Option<String>,
    tuning_json: Option<String>,
    racing_line_json: Option<String>,
) -> Result<Session, LoadError> {
    let track = match track_json {
        Some(json) => TrackConfig::from_json(&json)?,
        None => TrackConfig::lusail_short(),
    };
    let tuning = match tuning_json {
        Some(json) => Tuning::from_json(&json)?,
        None => Tuning::default(),
    };
    let racing_line = match racing_line_json {
        Some(json) => match RacingLineTable::from_json(&json) {
            Ok(table) => Some(table),
            Err(e) => {
                warn!("Racing line unavailable ({e}); guidance disabled");
                None
            }
        },
        None => None,
    };
    Ok(Session::new(track, tuning, racing_line))
}

/// Returns the library version.
/// Maps to: RustBridge.version() -> String
#[unsafe(no_mangle)]
pub extern "system" fn Java_com_racedash_app_RustBridge_version(
    env: JNIEnv,
    _class: JClass,
) -> jstring {
    match env.new_string(crate::VERSION) {
        Ok(s) => s.into_raw(),
        Err(_) => std::ptr::null_mut(),
    }
}

/// Route `log` output to logcat. Safe to call more than once.
/// Maps to: RustBridge.initLogging()
#[unsafe(no_mangle)]
pub extern "system" fn Java_com_racedash_app_RustBridge_initLogging(
    _env: JNIEnv,
    _class: JClass,
) {
    android_logger::init_once(
        android_logger::Config::default()
            .with_max_level(log::LevelFilter::Debug)
            .with_tag("racedash"),
    );
}

/// Start a fresh session, replacing any previous one.
/// Null arguments fall back to the built-in track and default tuning.
/// Maps to: RustBridge.startSession(trackJson: String?, tuningJson: String?, racingLineJson: String?) -> Boolean
#[unsafe(no_mangle)]
pub extern "system" fn Java_com_racedash_app_RustBridge_startSession(
    mut env: JNIEnv,
    _class: JClass,
    track_json: JString,
    tuning_json: JString,
    racing_line_json: JString,
) -> jboolean {
    let track = optional_string(&mut env, &track_json);
    let tuning = optional_string(&mut env, &tuning_json);
    let racing_line = optional_string(&mut env, &racing_line_json);

    match build_session(track, tuning, racing_line) {
        Ok(session) => {
            log_session_start(&session);
            replace_session(session);
            JNI_TRUE
        }
        Err(e) => {
            error!("Failed to start session: {e}");
            JNI_FALSE
        }
    }
}

/// Feed one telemetry packet (JSON object).
/// Returns false when there is no session, the JSON is unreadable, or
/// the packet was ignored because GPS fallback is active.
/// Maps to: RustBridge.ingestTelemetry(json: String, timestampMs: Long) -> Boolean
#[unsafe(no_mangle)]
pub extern "system" fn Java_com_racedash_app_RustBridge_ingestTelemetry(
    mut env: JNIEnv,
    _class: JClass,
    json: JString,
    timestamp_ms: jlong,
) -> jboolean {
    let Some(payload) = optional_string(&mut env, &json) else {
        return JNI_FALSE;
    };
    let packet = match serde_json::from_str::<serde_json::Value>(&payload) {
        Ok(packet) => packet,
        Err(e) => {
            warn!("Dropping unreadable telemetry packet: {e}");
            return JNI_FALSE;
        }
    };

    let accepted = with_session(|s| !s.ingest_telemetry_value(packet, timestamp_ms as f64).ignored);
    to_jboolean(accepted.unwrap_or(false))
}

/// Feed one phone location fix. Pass NaN for an unknown speed.
/// Maps to: RustBridge.ingestGpsFix(lat: Double, lon: Double, speedMps: Double, timestampMs: Long) -> Boolean
#[unsafe(no_mangle)]
pub extern "system" fn Java_com_racedash_app_RustBridge_ingestGpsFix(
    _env: JNIEnv,
    _class: JClass,
    latitude: jdouble,
    longitude: jdouble,
    speed_mps: jdouble,
    timestamp_ms: jlong,
) -> jboolean {
    let fix = GpsFix {
        latitude,
        longitude,
        speed_mps: speed_mps.is_finite().then_some(speed_mps),
    };
    let accepted = with_session(|s| !s.ingest_gps_fix(&fix, timestamp_ms as f64).ignored);
    to_jboolean(accepted.unwrap_or(false))
}

/// The telemetry connection is gone; switch to phone GPS for the rest of
/// the session.
/// Maps to: RustBridge.transportLost() -> Boolean
#[unsafe(no_mangle)]
pub extern "system" fn Java_com_racedash_app_RustBridge_transportLost(
    _env: JNIEnv,
    _class: JClass,
) -> jboolean {
    to_jboolean(with_session(Session::transport_lost).unwrap_or(false))
}

/// The device has no location provider.
/// Maps to: RustBridge.noPositionSource(reason: String)
#[unsafe(no_mangle)]
pub extern "system" fn Java_com_racedash_app_RustBridge_noPositionSource(
    mut env: JNIEnv,
    _class: JClass,
    reason: JString,
) {
    let reason = optional_string(&mut env, &reason).unwrap_or_else(|| "unknown".into());
    with_session(|s| s.no_position_source(&reason));
}

/// Current render frame as JSON, with the local overlay refreshed.
/// Returns null when no session is running.
/// Maps to: RustBridge.renderFrame(timestampMs: Long) -> String?
#[unsafe(no_mangle)]
pub extern "system" fn Java_com_racedash_app_RustBridge_renderFrame(
    env: JNIEnv,
    _class: JClass,
    timestamp_ms: jlong,
) -> jstring {
    let frame = with_session(|s| {
        if let Some(request) = s.projection_request() {
            let overlay = s.local_fallback().project(&request);
            s.apply_overlay(overlay);
        }
        s.render_frame(timestamp_ms as f64)
    });

    let json = match frame.map(|f| f.to_json()) {
        Some(Ok(json)) => json,
        Some(Err(e)) => {
            error!("Failed to serialize render frame: {e}");
            return std::ptr::null_mut();
        }
        None => return std::ptr::null_mut(),
    };

    match env.new_string(json) {
        Ok(s) => s.into_raw(),
        Err(_) => std::ptr::null_mut(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_nothing_given() {
        let session = build_session(None, None, None).unwrap();
        assert_eq!(session.track().name, "Lusail Short Circuit");
        assert_eq!(session.tuning().idle_timeout_ms, 15_000.0);
    }

    #[test]
    fn bad_track_json_is_an_error() {
        assert!(build_session(Some("{".into()), None, None).is_err());
    }

    #[test]
    fn bad_racing_line_only_disables_guidance() {
        let session = build_session(None, None, Some("[]".into())).unwrap();
        assert!(session.guidance().is_none());
    }
}
