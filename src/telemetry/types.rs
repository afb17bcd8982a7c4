use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::UpstreamError;

/// One field of a snapshot: either the parsed data or the reason it is missing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Reading<T> {
    Failed { error: String },
    Ok(T),
}

impl<T> Reading<T> {
    pub fn data(&self) -> Option<&T> {
        match self {
            Reading::Ok(value) => Some(value),
            Reading::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Reading::Ok(_) => None,
            Reading::Failed { error } => Some(error),
        }
    }
}

impl<T> From<Result<T, UpstreamError>> for Reading<T> {
    fn from(result: Result<T, UpstreamError>) -> Self {
        match result {
            Ok(value) => Reading::Ok(value),
            Err(err) => Reading::Failed {
                error: err.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Optics {
    pub magnification: Option<f64>,
    pub pan: Option<f64>,
    pub tilt: Option<f64>,
    pub raw_text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Geolocation {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub heading: Option<f64>,
    pub valid_position: bool,
    pub valid_heading: bool,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CameraClock {
    pub camera_time: String,
    pub timezone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviceIdentity {
    pub model: Option<String>,
    pub firmware: Option<String>,
    pub serial: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TemperatureSensor {
    pub id: String,
    pub name: Option<String>,
    pub celsius: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Temperature {
    pub sensors: Vec<TemperatureSensor>,
    pub heater_status: Option<String>,
    /// Seconds until the heater stops, as reported by the camera.
    pub heater_time_until_stop: Option<f64>,
    /// IR cut filter state. `None` means the optional lookup was unavailable, not that it failed.
    pub ir_state: Option<String>,
}

/// Immutable aggregate of one telemetry read. Replaced wholesale by the next build.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub optics: Reading<Optics>,
    pub geolocation: Reading<Geolocation>,
    pub clock: Reading<CameraClock>,
    pub device: Reading<DeviceIdentity>,
    pub temperature: Reading<Temperature>,
    pub fetched_at: DateTime<Utc>,
}

impl StatusSnapshot {
    pub fn failed_fields(&self) -> Vec<&'static str> {
        let mut failed = Vec::new();
        if self.optics.error().is_some() {
            failed.push("optics");
        }
        if self.geolocation.error().is_some() {
            failed.push("geolocation");
        }
        if self.clock.error().is_some() {
            failed.push("clock");
        }
        if self.device.error().is_some() {
            failed.push("device");
        }
        if self.temperature.error().is_some() {
            failed.push("temperature");
        }
        failed
    }
}

/// Raw `PTZ.Limit.L1.*` values; anything the camera did not report is `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PtzLimits {
    pub min_zoom: Option<f64>,
    pub max_zoom: Option<f64>,
    pub min_pan: Option<f64>,
    pub max_pan: Option<f64>,
    pub min_tilt: Option<f64>,
    pub max_tilt: Option<f64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LimitSource {
    Camera,
    Partial,
    Fallback,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PtzCapabilities {
    pub min_zoom: f64,
    pub max_zoom: f64,
    pub min_pan: f64,
    pub max_pan: f64,
    pub min_tilt: f64,
    pub max_tilt: f64,
    pub source: LimitSource,
}

impl PtzCapabilities {
    pub const FALLBACK_MIN_ZOOM: f64 = 1.0;
    pub const FALLBACK_MAX_ZOOM: f64 = 9999.0;
    pub const FALLBACK_PAN_TILT: f64 = 172.0;

    pub fn fallback() -> Self {
        Self::from_limits(&PtzLimits::default())
    }

    /// Fills each missing limit with its fallback independently.
    pub fn from_limits(limits: &PtzLimits) -> Self {
        let reported = [
            limits.min_zoom,
            limits.max_zoom,
            limits.min_pan,
            limits.max_pan,
            limits.min_tilt,
            limits.max_tilt,
        ]
        .iter()
        .filter(|v| v.is_some())
        .count();

        let source = match reported {
            0 => LimitSource::Fallback,
            6 => LimitSource::Camera,
            _ => LimitSource::Partial,
        };

        Self {
            min_zoom: limits.min_zoom.unwrap_or(Self::FALLBACK_MIN_ZOOM),
            max_zoom: limits.max_zoom.unwrap_or(Self::FALLBACK_MAX_ZOOM),
            min_pan: limits.min_pan.unwrap_or(-Self::FALLBACK_PAN_TILT),
            max_pan: limits.max_pan.unwrap_or(Self::FALLBACK_PAN_TILT),
            min_tilt: limits.min_tilt.unwrap_or(-Self::FALLBACK_PAN_TILT),
            max_tilt: limits.max_tilt.unwrap_or(Self::FALLBACK_PAN_TILT),
            source,
        }
    }
}
