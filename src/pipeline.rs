//! Event-driven processing loop.
//!
//! One task owns the [`Session`] and consumes [`SourceEvent`]s in arrival
//! order. Render frames are paced by a [`FrameLimiter`] and published on a
//! watch channel, so a slow UI only ever sees the newest frame. Overlay
//! projection runs on its own task and reports back through the same
//! event queue; sample processing never waits for it.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};

use crate::error::PipelineError;
use crate::overlay::OverlayFrame;
use crate::projection::{project_with_fallback, ProjectionService};
use crate::render::{FrameLimiter, RenderFrame};
use crate::sample::GpsFix;
use crate::session::{log_session_start, Session};
use crate::sync::PiGpsPacket;

/// Input to the processing loop.
#[derive(Debug, Clone)]
pub enum SourceEvent {
    /// Raw telemetry packet as received from the car.
    Telemetry(Value),
    /// Fix from the phone's location provider.
    GpsFix(GpsFix),
    /// Fix from the camera unit, kept for video sync only.
    PiGps(PiGpsPacket),
    /// The telemetry transport is unreachable.
    TransportLost,
    /// The device has no location capability at all.
    NoPositionSource(String),
    /// A projection task finished.
    OverlayReady(OverlayFrame),
    /// Stop the loop and hand the session back.
    Shutdown,
}

/// Milliseconds since the pipeline started.
#[derive(Debug, Clone, Copy)]
struct PipelineClock {
    epoch: Instant,
}

impl PipelineClock {
    fn start() -> Self {
        Self { epoch: Instant::now() }
    }

    fn now_ms(&self) -> f64 {
        self.epoch.elapsed().as_millis() as f64
    }
}

pub struct PipelineHandle {
    events: mpsc::UnboundedSender<SourceEvent>,
    frames: watch::Receiver<Option<RenderFrame>>,
    task: JoinHandle<Session>,
}

impl PipelineHandle {
    /// Queue an event for processing.
    pub fn send(&self, event: SourceEvent) -> Result<(), PipelineError> {
        self.events.send(event).map_err(|_| PipelineError::Closed)
    }

    /// Extra sender for a producer running on its own task.
    pub fn sender(&self) -> mpsc::UnboundedSender<SourceEvent> {
        self.events.clone()
    }

    /// Receiver for published frames. None until the first frame.
    pub fn frames(&self) -> watch::Receiver<Option<RenderFrame>> {
        self.frames.clone()
    }

    /// Most recently published frame.
    pub fn latest_frame(&self) -> Option<RenderFrame> {
        self.frames.borrow().clone()
    }

    /// Stop after all queued events are processed and return the session.
    pub async fn shutdown(self) -> Result<Session, PipelineError> {
        // A failed send means the loop already ended; the join below still
        // reports how.
        let _ = self.events.send(SourceEvent::Shutdown);
        Ok(self.task.await?)
    }
}

/// Start the processing loop on the current tokio runtime.
pub fn spawn(session: Session, service: Option<Arc<dyn ProjectionService>>) -> PipelineHandle {
    log_session_start(&session);

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let (frames_tx, frames_rx) = watch::channel(None);

    let worker = Worker {
        limiter: FrameLimiter::new(session.tuning().frame_interval_ms),
        session,
        service,
        loopback: events_tx.downgrade(),
        frames: frames_tx,
        clock: PipelineClock::start(),
        projection_in_flight: false,
    };
    let task = tokio::spawn(worker.run(events_rx));

    PipelineHandle { events: events_tx, frames: frames_rx, task }
}

struct Worker {
    session: Session,
    service: Option<Arc<dyn ProjectionService>>,
    loopback: mpsc::WeakUnboundedSender<SourceEvent>,
    frames: watch::Sender<Option<RenderFrame>>,
    limiter: FrameLimiter,
    clock: PipelineClock,
    projection_in_flight: bool,
}

impl Worker {
    async fn run(mut self, mut events: mpsc::UnboundedReceiver<SourceEvent>) -> Session {
        let period_ms = self.session.tuning().frame_interval_ms.max(1.0) as u64;
        let mut ticker = interval(Duration::from_millis(period_ms));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!("Pipeline started (frame interval {period_ms} ms)");

        loop {
            tokio::select! {
                event = events.recv() => {
                    match event {
                        Some(SourceEvent::Shutdown) | None => break,
                        Some(event) => self.handle(event),
                    }
                }
                _ = ticker.tick() => self.paint(),
            }
        }

        info!("Pipeline stopped");
        self.session
    }

    fn handle(&mut self, event: SourceEvent) {
        let now = self.clock.now_ms();
        let changed = match event {
            SourceEvent::Telemetry(packet) => !self.session.ingest_telemetry_value(packet, now).ignored,
            SourceEvent::GpsFix(fix) => !self.session.ingest_gps_fix(&fix, now).ignored,
            SourceEvent::PiGps(packet) => {
                self.session.record_pi_gps(packet, now);
                false
            }
            SourceEvent::TransportLost => self.session.transport_lost(),
            SourceEvent::NoPositionSource(reason) => {
                self.session.no_position_source(&reason);
                true
            }
            SourceEvent::OverlayReady(frame) => {
                self.projection_in_flight = false;
                self.session.apply_overlay(frame);
                true
            }
            SourceEvent::Shutdown => false,
        };

        if changed {
            self.limiter.request();
        }
    }

    fn paint(&mut self) {
        // Keep the countdown moving while nothing else changes.
        if self.session.timer().is_running() {
            self.limiter.request();
        }

        let now = self.clock.now_ms();
        if !self.limiter.poll(now) {
            return;
        }

        self.frames.send_replace(Some(self.session.render_frame(now)));
        self.request_overlay();
    }

    /// Start a projection unless one is still running.
    fn request_overlay(&mut self) {
        if self.projection_in_flight {
            return;
        }
        let Some(request) = self.session.projection_request() else {
            return;
        };
        let Some(reply) = self.loopback.upgrade() else {
            return;
        };

        let service = self.service.clone();
        let fallback = self.session.local_fallback();
        self.projection_in_flight = true;

        tokio::spawn(async move {
            let (frame, source) = project_with_fallback(service, request, fallback).await;
            debug!("Overlay ready from {source:?} ({} points)", frame.overlay_points.len());
            let _ = reply.send(SourceEvent::OverlayReady(frame));
        });
    }
}
