use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::HashMap;

use crate::error::UpstreamError;
use crate::telemetry::types::{DeviceIdentity, Geolocation};
use crate::translator::params::parse_number;

/// Collects the text of every leaf element keyed by local name (namespace prefixes dropped).
/// The first occurrence of a name wins.
fn leaf_texts(xml: &str) -> Result<HashMap<String, String>, UpstreamError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut texts = HashMap::new();
    let mut current: Option<String> = None;
    let mut saw_element = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                saw_element = true;
                current = Some(String::from_utf8_lossy(e.local_name().as_ref()).to_string());
            }
            Event::Text(t) => {
                if let Some(name) = current.as_ref() {
                    let value = t.unescape()?.trim().to_string();
                    texts.entry(name.clone()).or_insert(value);
                }
            }
            Event::End(_) => current = None,
            Event::Empty(_) => saw_element = true,
            Event::Eof => break,
            _ => {}
        }
    }

    if !saw_element {
        return Err(UpstreamError::parse("response is not XML"));
    }

    Ok(texts)
}

fn parse_flag(raw: Option<&String>) -> bool {
    raw.map(|v| v.eq_ignore_ascii_case("true") || v == "1")
        .unwrap_or(false)
}

pub fn parse_geolocation(xml: &str) -> Result<Geolocation, UpstreamError> {
    let texts = leaf_texts(xml)?;

    if let Some(description) = texts.get("ErrorDescription") {
        return Err(UpstreamError::parse(format!("geolocation error: {}", description)));
    }
    if !texts.contains_key("Lat") && !texts.contains_key("ValidPosition") {
        return Err(UpstreamError::parse("geolocation response has no position"));
    }

    let number = |tag: &str| texts.get(tag).and_then(|v| parse_number(v));

    Ok(Geolocation {
        lat: number("Lat"),
        lng: number("Lng"),
        heading: number("Heading"),
        valid_position: parse_flag(texts.get("ValidPosition")),
        valid_heading: parse_flag(texts.get("ValidHeading")),
        text: texts.get("Text").filter(|t| !t.is_empty()).cloned(),
    })
}

/// Parses the XML parameter-definition listing used when the plain-text identity query fails.
pub fn parse_device_identity_xml(xml: &str) -> Result<DeviceIdentity, UpstreamError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut identity = DeviceIdentity {
        model: None,
        firmware: None,
        serial: None,
    };
    let mut current: Option<String> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                current = Some(String::from_utf8_lossy(e.local_name().as_ref()).to_string());
                read_parameter(&e, &mut identity)?;
            }
            Event::Empty(e) => read_parameter(&e, &mut identity)?,
            Event::Text(t) => {
                let value = t.unescape()?.trim().to_string();
                match current.as_deref() {
                    Some("model") if identity.model.is_none() => identity.model = Some(value),
                    Some("firmwareVersion") if identity.firmware.is_none() => {
                        identity.firmware = Some(value)
                    }
                    _ => {}
                }
            }
            Event::End(_) => current = None,
            Event::Eof => break,
            _ => {}
        }
    }

    if identity.model.is_none() && identity.firmware.is_none() && identity.serial.is_none() {
        return Err(UpstreamError::parse("device identity XML has no known parameters"));
    }

    Ok(identity)
}

fn read_parameter(
    element: &quick_xml::events::BytesStart<'_>,
    identity: &mut DeviceIdentity,
) -> Result<(), UpstreamError> {
    if element.local_name().as_ref() != b"parameter" {
        return Ok(());
    }

    let mut name = None;
    let mut value = None;
    for attr in element.attributes().flatten() {
        match attr.key.local_name().as_ref() {
            b"name" => name = Some(attr.unescape_value()?.to_string()),
            b"value" => value = Some(attr.unescape_value()?.to_string()),
            _ => {}
        }
    }

    let value = value.filter(|v| !v.is_empty());
    match name.as_deref() {
        Some("ProdNbr") => identity.model = value.or(identity.model.take()),
        Some("Version") => identity.firmware = value.or(identity.firmware.take()),
        Some("SerialNumber") => identity.serial = value.or(identity.serial.take()),
        _ => {}
    }

    Ok(())
}
