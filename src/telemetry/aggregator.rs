use chrono::Utc;
use std::sync::Arc;

use crate::camera::CameraApi;
use crate::telemetry::types::{PtzCapabilities, StatusSnapshot};

/// Builds status snapshots and PTZ capabilities from the camera.
#[derive(Clone)]
pub struct StatusAggregator {
    camera: Arc<dyn CameraApi>,
}

impl StatusAggregator {
    pub fn new(camera: Arc<dyn CameraApi>) -> Self {
        Self { camera }
    }

    /// Queries the five resources concurrently. Never fails: a resource that errors is
    /// recorded in its own field and the rest of the snapshot is kept.
    pub async fn build(&self) -> StatusSnapshot {
        let (optics, geolocation, clock, device, temperature) = tokio::join!(
            self.camera.ptz_position(),
            self.camera.geolocation(),
            self.camera.clock(),
            self.camera.device_identity(),
            self.camera.temperature(),
        );

        let snapshot = StatusSnapshot {
            optics: optics.into(),
            geolocation: geolocation.into(),
            clock: clock.into(),
            device: device.into(),
            temperature: temperature.into(),
            fetched_at: Utc::now(),
        };

        let failed = snapshot.failed_fields();
        if !failed.is_empty() {
            tracing::warn!("Status snapshot degraded: {}", failed.join(", "));
        }

        snapshot
    }

    /// PTZ limits with per-field fallbacks; an unreachable camera yields the fallback set.
    pub async fn capabilities(&self) -> PtzCapabilities {
        match self.camera.ptz_limits().await {
            Ok(limits) => PtzCapabilities::from_limits(&limits),
            Err(err) => {
                tracing::warn!("PTZ limits unavailable, using fallback: {}", err);
                PtzCapabilities::fallback()
            }
        }
    }
}
