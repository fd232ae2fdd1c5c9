//! Remote overlay projection with local fallback.
//!
//! The remote service is optional. A request runs as its own task with
//! a timeout; whatever happens (no service, error, timeout, a panicking
//! service) the caller receives an [`OverlayFrame`], falling back to the
//! local projector.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use log::debug;

use crate::config::{TrackConfig, Tuning};
use crate::error::ProjectionError;
use crate::overlay::{LocalProjector, OverlayFrame, ProjectionRequest};

pub type ProjectionFuture = Pin<Box<dyn Future<Output = Result<OverlayFrame, ProjectionError>> + Send>>;

/// A remote projection service.
pub trait ProjectionService: Send + Sync {
    fn project(&self, request: ProjectionRequest) -> ProjectionFuture;
}

/// Which path produced an overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlaySource {
    Remote,
    Local,
}

/// Owned inputs for local projection, cheap to move into a task.
#[derive(Debug, Clone)]
pub struct LocalFallback {
    pub track: Arc<TrackConfig>,
    pub tuning: Arc<Tuning>,
}

impl LocalFallback {
    pub fn project(&self, request: &ProjectionRequest) -> OverlayFrame {
        LocalProjector {
            outline: &self.track.outline,
            camera: &self.tuning.camera,
        }
        .project(request)
    }
}

/// Ask the remote service, falling back to local projection on any failure.
pub async fn project_with_fallback(
    service: Option<Arc<dyn ProjectionService>>,
    request: ProjectionRequest,
    fallback: LocalFallback,
) -> (OverlayFrame, OverlaySource) {
    let timeout_ms = fallback.tuning.projection_timeout_ms;

    let remote = match service {
        Some(service) => {
            let mut remote = tokio::spawn(service.project(request));
            match tokio::time::timeout(Duration::from_millis(timeout_ms), &mut remote).await {
                Ok(Ok(result)) => result,
                Ok(Err(e)) => Err(ProjectionError::Failed(format!("service task ended: {e}"))),
                Err(_) => {
                    remote.abort();
                    Err(ProjectionError::Timeout(timeout_ms))
                }
            }
        }
        None => Err(ProjectionError::Unavailable),
    };

    match remote {
        Ok(frame) => (frame, OverlaySource::Remote),
        Err(e) => {
            debug!("Using local overlay: {e}");
            (fallback.project(&request), OverlaySource::Local)
        }
    }
}
