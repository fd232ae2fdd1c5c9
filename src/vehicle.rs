//! Vehicle state and sample ingestion.
//!
//! [`VehicleState`] holds the latest normalized readings and the
//! session accumulators. Cumulative distance and energy only ever grow
//! by integration steps; lap figures are taken as differences against
//! them, never kept as separate counters.

use log::debug;
use serde::Serialize;

use crate::geo::{bearing_deg, haversine_km, GeoPoint};
use crate::sample::{finite_number, safe_number, GpsFix, RawSample};

/// Rough rpm-per-km/h ratio used when only GPS speed is known.
const GPS_RPM_PER_KMH: f64 = 50.0;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VehicleState {
    pub voltage: f64,
    pub current: f64,
    pub power: f64,
    pub speed_kmh: f64,
    pub rpm: f64,
    pub position: Option<GeoPoint>,
    /// Position before the last accepted fix. Only used for heading.
    pub previous_position: Option<GeoPoint>,
    /// 0..360, 0 = north.
    pub heading_deg: f64,
    pub cumulative_distance_km: f64,
    pub cumulative_energy_wh: f64,
    pub last_sample_ms: Option<f64>,
}

/// Limits applied during ingestion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IngestLimits {
    pub max_power_w: f64,
    pub heading_min_speed_kmh: f64,
}

/// What one ingestion step did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IngestOutcome {
    /// The sample carried a usable position.
    pub position_valid: bool,
    /// Energy was integrated for this sample.
    pub energy_integrated: bool,
    /// Hours since the previous sample (0 for the first one).
    pub dt_hours: f64,
}

impl VehicleState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hours since the previous sample, and record `now_ms` as the latest.
    ///
    /// The first sample, or one that goes backwards in time, yields 0.
    fn advance_clock(&mut self, now_ms: f64) -> f64 {
        let dt_ms = match self.last_sample_ms {
            Some(last) => (now_ms - last).max(0.0),
            None => 0.0,
        };
        self.last_sample_ms = Some(match self.last_sample_ms {
            Some(last) => last.max(now_ms),
            None => now_ms,
        });
        dt_ms / 3_600_000.0
    }

    /// Accept a new position; returns the distance moved in km.
    fn move_to(&mut self, position: GeoPoint, heading_min_speed_kmh: f64) -> f64 {
        let moved_km = match self.position {
            Some(prev) => {
                self.previous_position = Some(prev);
                if self.speed_kmh > heading_min_speed_kmh && prev != position {
                    self.heading_deg = bearing_deg(prev, position);
                }
                haversine_km(prev, position)
            }
            None => 0.0,
        };
        self.position = Some(position);
        moved_km
    }

    /// Ingest one telemetry packet.
    pub fn ingest_telemetry(
        &mut self,
        sample: &RawSample,
        now_ms: f64,
        limits: &IngestLimits,
    ) -> IngestOutcome {
        let dt_hours = self.advance_clock(now_ms);

        self.voltage = safe_number(sample.voltage.as_ref());
        self.current = safe_number(sample.current.as_ref());
        self.power = safe_number(sample.power.as_ref());
        self.speed_kmh = safe_number(sample.speed.as_ref());
        self.rpm = safe_number(sample.rpm.as_ref());

        let new_position = sample.position();
        let moved_km = match new_position {
            Some(p) => self.move_to(p, limits.heading_min_speed_kmh),
            None => 0.0,
        };

        // The car's odometer wins when it reports; otherwise integrate fixes.
        match finite_number(sample.distance_km.as_ref()) {
            Some(odometer) if odometer >= self.cumulative_distance_km => {
                self.cumulative_distance_km = odometer;
            }
            Some(_) => {}
            None => self.cumulative_distance_km += moved_km,
        }

        let energy_integrated = dt_hours > 0.0 && self.power.abs() < limits.max_power_w;
        if energy_integrated {
            self.cumulative_energy_wh += self.power * dt_hours;
        } else if self.power.abs() >= limits.max_power_w {
            debug!("Skipping energy step for implausible power {:.0} W", self.power);
        }

        IngestOutcome {
            position_valid: new_position.is_some(),
            energy_integrated,
            dt_hours,
        }
    }

    /// Ingest a fix from the phone's location provider.
    ///
    /// Only position, speed and distance change; the electrical readings
    /// are left alone and no energy is integrated.
    pub fn ingest_gps_fix(&mut self, fix: &GpsFix, now_ms: f64, limits: &IngestLimits) -> IngestOutcome {
        let dt_hours = self.advance_clock(now_ms);

        let Some(position) = fix.position() else {
            return IngestOutcome { position_valid: false, energy_integrated: false, dt_hours };
        };

        let step_km = self.position.map_or(0.0, |prev| haversine_km(prev, position));

        self.speed_kmh = match fix.speed_mps {
            Some(mps) if mps.is_finite() && mps >= 0.0 => mps * 3.6,
            _ if dt_hours > 0.0 => step_km / dt_hours,
            _ => 0.0,
        };
        self.rpm = self.speed_kmh * GPS_RPM_PER_KMH;

        let moved_km = self.move_to(position, limits.heading_min_speed_kmh);
        self.cumulative_distance_km += moved_km;

        IngestOutcome { position_valid: true, energy_integrated: false, dt_hours }
    }
}
