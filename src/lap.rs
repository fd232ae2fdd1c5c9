//! Lap detection with leave/return hysteresis.
//!
//! A lap is armed once the vehicle gets farther than the leave threshold
//! from the start point and completes when it comes back inside the much
//! tighter return threshold. GPS jitter around the line cannot trigger a
//! completion because it never reaches the leave distance.
//!
//! Per-lap distance and energy are differences against snapshots of the
//! session accumulators taken at each lap boundary.

use log::{debug, info, warn};
use serde::Serialize;

use crate::geo::{deg_to_m, planar_distance_deg, GeoPoint};

/// A recorded lap efficiency. Never modified after it is appended.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LapEfficiency {
    pub lap: u32,
    pub km_per_kwh: f64,
}

impl LapEfficiency {
    /// Display line for the efficiency list.
    pub fn label(&self) -> String {
        format!("LAP {}  {:.2} km/kWh", self.lap, self.km_per_kwh)
    }
}

/// Figures for a lap that just completed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LapSummary {
    pub lap: u32,
    pub distance_km: f64,
    pub energy_wh: f64,
    /// Computed efficiency; None when no positive energy was used.
    pub efficiency: Option<f64>,
    /// Whether the efficiency passed the sanity band and was recorded.
    pub recorded: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LapEvent {
    LeftStartZone,
    Completed(LapSummary),
}

/// Thresholds in raw degrees (see [`crate::geo::planar_distance_deg`]).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LapThresholds {
    pub leave_deg: f64,
    pub return_deg: f64,
    pub max_efficiency: f64,
}

#[derive(Debug, Clone)]
pub struct LapTracker {
    start: GeoPoint,
    lap: u32,
    start_distance_km: f64,
    start_energy_wh: f64,
    has_left_start: bool,
    efficiencies: Vec<LapEfficiency>,
}

impl LapTracker {
    pub fn new(start: GeoPoint) -> Self {
        Self {
            start,
            lap: 1,
            start_distance_km: 0.0,
            start_energy_wh: 0.0,
            has_left_start: false,
            efficiencies: Vec::new(),
        }
    }

    /// Current (in-progress) lap number, starting at 1.
    pub fn lap(&self) -> u32 {
        self.lap
    }

    pub fn has_left_start(&self) -> bool {
        self.has_left_start
    }

    /// Recorded efficiencies in completion order.
    pub fn efficiencies(&self) -> &[LapEfficiency] {
        &self.efficiencies
    }

    /// Evaluate one position against the start point.
    pub fn evaluate(
        &mut self,
        position: GeoPoint,
        distance_km: f64,
        energy_wh: f64,
        thresholds: &LapThresholds,
    ) -> Option<LapEvent> {
        let from_start = planar_distance_deg(position, self.start);

        if !self.has_left_start {
            if from_start > thresholds.leave_deg {
                self.has_left_start = true;
                debug!("Left start area ({:.0} m away)", deg_to_m(from_start));
                return Some(LapEvent::LeftStartZone);
            }
            return None;
        }

        if from_start < thresholds.return_deg {
            return Some(LapEvent::Completed(self.complete(
                distance_km,
                energy_wh,
                thresholds.max_efficiency,
            )));
        }

        None
    }

    fn complete(&mut self, distance_km: f64, energy_wh: f64, max_efficiency: f64) -> LapSummary {
        let lap_energy_wh = energy_wh - self.start_energy_wh;
        let lap_distance_km = distance_km - self.start_distance_km;

        let efficiency = (lap_energy_wh > 0.0).then(|| lap_distance_km / (lap_energy_wh / 1000.0));
        let recorded = matches!(efficiency, Some(e) if e > 0.0 && e < max_efficiency);

        match efficiency {
            Some(e) if recorded => {
                self.efficiencies.push(LapEfficiency { lap: self.lap, km_per_kwh: e });
                info!(
                    "Lap {} completed: {:.3} km, {:.2} Wh, {:.2} km/kWh",
                    self.lap, lap_distance_km, lap_energy_wh, e
                );
            }
            _ => warn!(
                "Lap {} completed with invalid efficiency ({:.3} km, {:.2} Wh)",
                self.lap, lap_distance_km, lap_energy_wh
            ),
        }

        let summary = LapSummary {
            lap: self.lap,
            distance_km: lap_distance_km,
            energy_wh: lap_energy_wh,
            efficiency,
            recorded,
        };

        self.lap += 1;
        self.start_distance_km = distance_km;
        self.start_energy_wh = energy_wh;
        self.has_left_start = false;

        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const START: GeoPoint = GeoPoint::new(25.488435783, 51.450190017);

    fn thresholds() -> LapThresholds {
        LapThresholds { leave_deg: 0.002, return_deg: 0.0003, max_efficiency: 10_000.0 }
    }

    /// Point `meters` north of the start, using the display conversion.
    fn north_of_start(meters: f64) -> GeoPoint {
        GeoPoint::new(START.lat + meters / 111_000.0, START.lon)
    }

    #[test]
    fn oscillation_near_start_never_completes() {
        let mut laps = LapTracker::new(START);
        for i in 0..200 {
            let m = if i % 2 == 0 { 25.0 } else { 40.0 };
            let event = laps.evaluate(north_of_start(m), i as f64 * 0.01, i as f64, &thresholds());
            assert!(event.is_none(), "unexpected event at step {i}: {event:?}");
        }
        assert_eq!(laps.lap(), 1);
        assert!(laps.efficiencies().is_empty());
    }

    #[test]
    fn out_and_back_completes_exactly_once() {
        let mut laps = LapTracker::new(START);
        let t = thresholds();

        assert_eq!(laps.evaluate(north_of_start(300.0), 0.3, 10.0, &t), Some(LapEvent::LeftStartZone));
        assert!(laps.evaluate(north_of_start(100.0), 0.5, 15.0, &t).is_none());

        let mut completions = 0;
        for _ in 0..5 {
            if let Some(LapEvent::Completed(_)) = laps.evaluate(north_of_start(10.0), 0.6, 20.0, &t) {
                completions += 1;
            }
        }
        assert_eq!(completions, 1);
        assert_eq!(laps.lap(), 2);
        assert!(!laps.has_left_start());
    }

    #[test]
    fn efficiency_matches_cumulative_deltas() {
        let mut laps = LapTracker::new(START);
        let t = thresholds();

        // First lap: 3.7 km on 25 Wh
        laps.evaluate(north_of_start(300.0), 1.0, 10.0, &t);
        let Some(LapEvent::Completed(first)) = laps.evaluate(north_of_start(5.0), 3.7, 25.0, &t) else {
            panic!("expected completion");
        };
        assert!(first.recorded);
        assert_eq!(first.efficiency, Some(3.7 / (25.0 / 1000.0)));

        // Second lap is measured from the new snapshot.
        laps.evaluate(north_of_start(300.0), 5.0, 30.0, &t);
        let Some(LapEvent::Completed(second)) = laps.evaluate(north_of_start(5.0), 7.5, 45.0, &t) else {
            panic!("expected completion");
        };
        assert!((second.distance_km - 3.8).abs() < 1e-12);
        assert!((second.energy_wh - 20.0).abs() < 1e-12);

        let recorded = laps.efficiencies();
        assert_eq!(recorded.len(), 2);
        assert_eq!(recorded[0].lap, 1);
        assert_eq!(recorded[1].lap, 2);
        assert_eq!(recorded[1].km_per_kwh, (7.5 - 3.7) / ((45.0 - 25.0) / 1000.0));
    }

    #[test]
    fn zero_energy_lap_advances_without_recording() {
        let mut laps = LapTracker::new(START);
        let t = thresholds();
        laps.evaluate(north_of_start(300.0), 1.0, 0.0, &t);
        let Some(LapEvent::Completed(summary)) = laps.evaluate(north_of_start(0.0), 3.7, 0.0, &t) else {
            panic!("expected completion");
        };
        assert_eq!(summary.efficiency, None);
        assert!(!summary.recorded);
        assert_eq!(laps.lap(), 2);
        assert!(laps.efficiencies().is_empty());
    }

    #[test]
    fn implausible_efficiency_is_not_recorded() {
        let mut laps = LapTracker::new(START);
        let t = thresholds();
        laps.evaluate(north_of_start(300.0), 0.0, 0.0, &t);
        // 3.7 km on 0.1 Wh = 37000 km/kWh
        let Some(LapEvent::Completed(summary)) = laps.evaluate(north_of_start(0.0), 3.7, 0.1, &t) else {
            panic!("expected completion");
        };
        assert!(summary.efficiency.unwrap() > 10_000.0);
        assert!(!summary.recorded);
        assert_eq!(laps.lap(), 2);
        assert!(laps.efficiencies().is_empty());
    }

    #[test]
    fn efficiency_label() {
        let e = LapEfficiency { lap: 3, km_per_kwh: 148.256 };
        assert_eq!(e.label(), "LAP 3  148.26 km/kWh");
    }
}
