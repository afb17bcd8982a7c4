//! In-memory camera for unit tests.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::camera::CameraApi;
use crate::error::UpstreamError;
use crate::telemetry::types::{
    CameraClock, DeviceIdentity, Geolocation, Optics, PtzLimits, Temperature, TemperatureSensor,
};

#[derive(Clone, Default)]
pub struct FakeCamera {
    offline: bool,
    latency: Duration,
    geolocation_error: Arc<Mutex<Option<UpstreamError>>>,
    status_calls: Arc<AtomicUsize>,
}

impl FakeCamera {
    pub fn healthy() -> Self {
        Self::default()
    }

    pub fn offline() -> Self {
        Self {
            offline: true,
            ..Self::default()
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn fail_geolocation(&self, err: UpstreamError) {
        *self.geolocation_error.lock().unwrap() = Some(err);
    }

    /// Number of PTZ position queries, one per status build.
    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    async fn respond<T>(&self, value: T) -> Result<T, UpstreamError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if self.offline {
            return Err(UpstreamError::Transport("connection refused".to_string()));
        }
        Ok(value)
    }
}

#[async_trait]
impl CameraApi for FakeCamera {
    async fn ptz_position(&self) -> Result<Optics, UpstreamError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        self.respond(Optics {
            magnification: Some(1.0),
            pan: Some(10.0),
            tilt: Some(-5.0),
            raw_text: "pan=10\ntilt=-5\nzoom=1".to_string(),
        })
        .await
    }

    async fn geolocation(&self) -> Result<Geolocation, UpstreamError> {
        let injected = self.geolocation_error.lock().unwrap().clone();
        let result = self
            .respond(Geolocation {
                lat: Some(55.7),
                lng: Some(13.2),
                heading: Some(90.0),
                valid_position: true,
                valid_heading: true,
                text: None,
            })
            .await;
        match injected {
            Some(err) => Err(err),
            None => result,
        }
    }

    async fn clock(&self) -> Result<CameraClock, UpstreamError> {
        self.respond(CameraClock {
            camera_time: "2024-05-01T10:00:00+02:00".to_string(),
            timezone: Some("Europe/Stockholm".to_string()),
        })
        .await
    }

    async fn device_identity(&self) -> Result<DeviceIdentity, UpstreamError> {
        self.respond(DeviceIdentity {
            model: Some("Q6215-LE".to_string()),
            firmware: Some("10.12.114".to_string()),
            serial: Some("ACCC8EF00001".to_string()),
        })
        .await
    }

    async fn temperature(&self) -> Result<Temperature, UpstreamError> {
        self.respond(Temperature {
            sensors: vec![TemperatureSensor {
                id: "S0".to_string(),
                name: Some("Internal".to_string()),
                celsius: Some(31.0),
            }],
            heater_status: Some("Stopped".to_string()),
            heater_time_until_stop: Some(0.0),
            ir_state: Some("auto".to_string()),
        })
        .await
    }

    async fn ptz_limits(&self) -> Result<PtzLimits, UpstreamError> {
        self.respond(PtzLimits {
            min_zoom: Some(1.0),
            max_zoom: Some(9999.0),
            min_pan: Some(-180.0),
            max_pan: Some(180.0),
            min_tilt: Some(-90.0),
            max_tilt: Some(20.0),
        })
        .await
    }
}
