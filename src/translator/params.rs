//! Parsers for the camera's `key=value` text responses.

use std::collections::{BTreeMap, HashMap};

use crate::error::UpstreamError;
use crate::telemetry::types::{DeviceIdentity, Optics, PtzLimits, Temperature, TemperatureSensor};

/// Parses a numeric field, rejecting NaN and infinities.
pub fn parse_number(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// A `key=value` listing with the optional `root.` prefix stripped from every key.
#[derive(Debug, Clone, Default)]
pub struct ParamList {
    values: HashMap<String, String>,
}

impl ParamList {
    pub fn parse(body: &str) -> Result<Self, UpstreamError> {
        let trimmed = body.trim();
        if let Some(reason) = trimmed.strip_prefix("# Error:") {
            return Err(UpstreamError::parse(reason.trim().to_string()));
        }

        let mut values = HashMap::new();
        for line in trimmed.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim();
            let key = key.strip_prefix("root.").unwrap_or(key);
            values.insert(key.to_string(), value.trim().to_string());
        }

        Ok(Self { values })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    pub fn text(&self, key: &str) -> Option<String> {
        self.get(key).map(str::to_string)
    }

    pub fn number(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(parse_number)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

pub fn parse_ptz_position(body: &str) -> Result<Optics, UpstreamError> {
    let params = ParamList::parse(body)?;

    let pan = params.number("pan");
    let tilt = params.number("tilt");
    let magnification = params.number("zoom");

    if ["pan", "tilt", "zoom"].iter().all(|k| params.get(k).is_none()) {
        return Err(UpstreamError::parse("PTZ position response has no pan/tilt/zoom"));
    }

    Ok(Optics {
        magnification,
        pan,
        tilt,
        raw_text: body.trim().to_string(),
    })
}

pub fn parse_device_identity(body: &str) -> Result<DeviceIdentity, UpstreamError> {
    let params = ParamList::parse(body)?;

    let identity = DeviceIdentity {
        model: params.text("Brand.ProdNbr"),
        firmware: params.text("Properties.Firmware.Version"),
        serial: params.text("Properties.System.SerialNumber"),
    };

    if identity.model.is_none() && identity.firmware.is_none() && identity.serial.is_none() {
        return Err(UpstreamError::parse("device identity response has no known keys"));
    }

    Ok(identity)
}

/// Parses `Sensor.S<n>.<Field>` and `Heater.H0.<Field>` keys. IR state is filled in separately.
pub fn parse_temperature(body: &str) -> Result<Temperature, UpstreamError> {
    let params = ParamList::parse(body)?;

    let mut sensors: BTreeMap<u32, TemperatureSensor> = BTreeMap::new();
    for (key, value) in params.iter() {
        let Some(rest) = key.strip_prefix("Sensor.S") else {
            continue;
        };
        let Some((index, field)) = rest.split_once('.') else {
            continue;
        };
        let Ok(index) = index.parse::<u32>() else {
            continue;
        };

        let sensor = sensors.entry(index).or_insert_with(|| TemperatureSensor {
            id: format!("S{}", index),
            name: None,
            celsius: None,
        });
        match field {
            "Name" if !value.is_empty() => sensor.name = Some(value.to_string()),
            "Celsius" => sensor.celsius = parse_number(value),
            _ => {}
        }
    }

    let heater_status = params.text("Heater.H0.Status");
    let heater_time_until_stop = params.number("Heater.H0.TimeUntilStop");

    if sensors.is_empty() && heater_status.is_none() && heater_time_until_stop.is_none() {
        return Err(UpstreamError::parse("temperature response has no sensor or heater keys"));
    }

    Ok(Temperature {
        sensors: sensors.into_values().collect(),
        heater_status,
        heater_time_until_stop,
        ir_state: None,
    })
}

pub fn parse_ir_cut_filter(body: &str) -> Option<String> {
    ParamList::parse(body)
        .ok()?
        .text("ImageSource.I0.DayNight.IrCutFilter")
}

pub fn parse_ptz_limits(body: &str) -> Result<PtzLimits, UpstreamError> {
    let params = ParamList::parse(body)?;
    let limit = |field: &str| params.number(&format!("PTZ.Limit.L1.{}", field));

    Ok(PtzLimits {
        min_zoom: limit("MinZoom"),
        max_zoom: limit("MaxZoom"),
        min_pan: limit("MinPan"),
        max_pan: limit("MaxPan"),
        min_tilt: limit("MinTilt"),
        max_tilt: limit("MaxTilt"),
    })
}
