//! Spatial current-draw heat map.
//!
//! A bounded FIFO of geolocated current readings. Intensity is scaled
//! against the largest |current| in the buffer at render time; no running
//! maximum is kept, so colors never go stale after evictions or clears.

use std::collections::VecDeque;

use log::debug;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HeatPoint {
    pub lat: f64,
    pub lon: f64,
    pub current_amps: f64,
}

/// A heat point with its render color.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HeatCell {
    pub lat: f64,
    pub lon: f64,
    pub current_amps: f64,
    /// 0.0 (lowest draw) to 1.0 (highest draw in the buffer).
    pub intensity: f64,
    /// HSL hue in degrees: 120 = green (low), 0 = red (high).
    pub hue: f64,
}

#[derive(Debug, Clone)]
pub struct HeatMap {
    points: VecDeque<HeatPoint>,
    capacity: usize,
    render_every: usize,
    inserted: u64,
    render_pending: bool,
}

impl HeatMap {
    pub fn new(capacity: usize, render_every: usize) -> Self {
        Self {
            points: VecDeque::with_capacity(capacity.min(1024)),
            capacity: capacity.max(1),
            render_every: render_every.max(1),
            inserted: 0,
            render_pending: false,
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> impl Iterator<Item = &HeatPoint> {
        self.points.iter()
    }

    /// Append a reading, evicting the oldest on overflow.
    ///
    /// Every `render_every`-th insertion requests a render.
    pub fn push(&mut self, point: HeatPoint) {
        if self.points.len() == self.capacity {
            self.points.pop_front();
        }
        self.points.push_back(point);
        self.inserted += 1;

        if self.inserted % self.render_every as u64 == 0 {
            self.render_pending = true;
        }
    }

    /// Drop every point and force a render.
    pub fn clear(&mut self) {
        let dropped = self.points.len();
        self.points.clear();
        self.render_pending = true;
        debug!("Heat map cleared ({dropped} points)");
    }

    /// Consume the pending render request, if any.
    pub fn take_render_request(&mut self) -> bool {
        std::mem::take(&mut self.render_pending)
    }

    /// Compute colors from the current buffer contents.
    pub fn render(&self) -> Vec<HeatCell> {
        let max = self
            .points
            .iter()
            .map(|p| p.current_amps.abs())
            .fold(1.0_f64, f64::max);

        self.points
            .iter()
            .map(|p| {
                let intensity = (p.current_amps.abs() / max).clamp(0.0, 1.0);
                HeatCell {
                    lat: p.lat,
                    lon: p.lon,
                    current_amps: p.current_amps,
                    intensity,
                    hue: (1.0 - intensity) * 120.0,
                }
            })
            .collect()
    }
}
