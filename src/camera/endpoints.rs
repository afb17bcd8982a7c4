//! The camera resources the relay reads, one method per resource.

use async_trait::async_trait;
use serde_json::json;

use crate::camera::CameraClient;
use crate::error::UpstreamError;
use crate::telemetry::types::{
    CameraClock, DeviceIdentity, Geolocation, Optics, PtzLimits, Temperature,
};
use crate::translator;

pub const PTZ_POSITION_PATH: &str = "/axis-cgi/com/ptz.cgi?query=position";
pub const PTZ_POSITION_LEGACY_PATH: &str = "/axis-cgi/com/ptz.cgi?query=position&camera=1";
pub const GEOLOCATION_PATH: &str = "/axis-cgi/geolocation/get.cgi";
pub const TIME_PATH: &str = "/axis-cgi/time.cgi";
pub const IDENTITY_PATH: &str = "/axis-cgi/param.cgi?action=list&group=Brand.ProdNbr,Properties.Firmware.Version,Properties.System.SerialNumber";
pub const IDENTITY_XML_PATH: &str = "/axis-cgi/param.cgi?action=listdefinitions&listformat=xmlschema&group=Brand,Properties";
pub const TEMPERATURE_PATH: &str = "/axis-cgi/temperaturecontrol.cgi?action=statusall";
pub const IR_CUT_FILTER_PATH: &str = "/axis-cgi/param.cgi?action=list&group=ImageSource.I0.DayNight.IrCutFilter";
pub const PTZ_LIMITS_PATH: &str = "/axis-cgi/param.cgi?action=list&group=PTZ.Limit.L1";

/// Typed access to the camera's telemetry resources. Every call resolves to a value or an
/// `UpstreamError`; none of them panic or hang past the client timeout.
#[async_trait]
pub trait CameraApi: Send + Sync {
    async fn ptz_position(&self) -> Result<Optics, UpstreamError>;

    async fn geolocation(&self) -> Result<Geolocation, UpstreamError>;

    async fn clock(&self) -> Result<CameraClock, UpstreamError>;

    async fn device_identity(&self) -> Result<DeviceIdentity, UpstreamError>;

    /// Temperature and heater status, enriched with the IR cut filter state when available.
    async fn temperature(&self) -> Result<Temperature, UpstreamError>;

    async fn ptz_limits(&self) -> Result<PtzLimits, UpstreamError>;
}

#[async_trait]
impl CameraApi for CameraClient {
    async fn ptz_position(&self) -> Result<Optics, UpstreamError> {
        let body = match self.get_text(PTZ_POSITION_PATH).await {
            Ok(body) => body,
            Err(err) if err.is_status() => {
                tracing::debug!("PTZ query failed ({}), trying legacy path", err);
                self.get_text(PTZ_POSITION_LEGACY_PATH).await?
            }
            Err(err) => return Err(err),
        };
        translator::parse_ptz_position(&body)
    }

    async fn geolocation(&self) -> Result<Geolocation, UpstreamError> {
        let body = self.get_text(GEOLOCATION_PATH).await?;
        translator::parse_geolocation(&body)
    }

    async fn clock(&self) -> Result<CameraClock, UpstreamError> {
        let request = json!({"apiVersion": "1.0", "method": "getDateTime"});
        let response = self.post_json(TIME_PATH, &request).await?;

        let parsed = translator::parse_clock(&response.body);
        if response.status.is_success() {
            return parsed;
        }

        match parsed {
            // A JSON error body explains more than the bare status does.
            Err(err) if response.body.trim_start().starts_with('{') => Err(err),
            _ => Err(UpstreamError::Status {
                status: response.status.as_u16(),
                path: TIME_PATH.to_string(),
            }),
        }
    }

    async fn device_identity(&self) -> Result<DeviceIdentity, UpstreamError> {
        let primary = match self.get_text(IDENTITY_PATH).await {
            Ok(body) => translator::parse_device_identity(&body),
            Err(err) => Err(err),
        };

        match primary {
            Ok(identity) => Ok(identity),
            Err(err) => {
                tracing::debug!("Identity query failed ({}), trying XML listing", err);
                let body = self.get_text(IDENTITY_XML_PATH).await?;
                translator::parse_device_identity_xml(&body)
            }
        }
    }

    async fn temperature(&self) -> Result<Temperature, UpstreamError> {
        let (status, ir) = tokio::join!(
            self.get_text(TEMPERATURE_PATH),
            self.get_text(IR_CUT_FILTER_PATH)
        );

        let mut temperature = translator::parse_temperature(&status?)?;
        temperature.ir_state = match ir {
            Ok(body) => translator::parse_ir_cut_filter(&body),
            Err(err) => {
                tracing::trace!("IR cut filter state unavailable: {}", err);
                None
            }
        };
        Ok(temperature)
    }

    async fn ptz_limits(&self) -> Result<PtzLimits, UpstreamError> {
        let body = self.get_text(PTZ_LIMITS_PATH).await?;
        translator::parse_ptz_limits(&body)
    }
}
