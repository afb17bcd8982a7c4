use serde_json::Value;

use crate::error::UpstreamError;
use crate::telemetry::types::CameraClock;

/// Longest slice of a non-JSON body quoted back in the error.
const SNIPPET_LEN: usize = 80;

pub fn parse_clock(body: &str) -> Result<CameraClock, UpstreamError> {
    let value: Value = serde_json::from_str(body.trim()).map_err(|_| {
        let snippet: String = body.trim().chars().take(SNIPPET_LEN).collect();
        UpstreamError::parse(format!("time service returned non-JSON body: {:?}", snippet))
    })?;

    if let Some(error) = value.get("error") {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error");
        let code = error.get("code").and_then(Value::as_i64);
        return Err(match code {
            Some(code) => UpstreamError::parse(format!("time service error {}: {}", code, message)),
            None => UpstreamError::parse(format!("time service error: {}", message)),
        });
    }

    let data = value
        .get("data")
        .ok_or_else(|| UpstreamError::parse("time service response has no data"))?;

    let camera_time = data
        .get("localDateTime")
        .or_else(|| data.get("dateTime"))
        .and_then(Value::as_str)
        .ok_or_else(|| UpstreamError::parse("time service response has no date-time"))?
        .to_string();

    let timezone = data
        .get("timeZone")
        .or_else(|| data.get("posixTimeZone"))
        .and_then(Value::as_str)
        .filter(|tz| !tz.is_empty())
        .map(str::to_string);

    Ok(CameraClock {
        camera_time,
        timezone,
    })
}
