#![allow(dead_code)]

use axum::{
    extract::State,
    http::{header, HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Router,
};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use md5::{Digest, Md5};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use camera_relay::config::{AuthMode, CameraConfig};

pub const USERNAME: &str = "relay";
pub const PASSWORD: &str = "s3cret";
pub const REALM: &str = "AXIS_FAKE";
pub const NONCE: &str = "0123456789abcdef";

pub const PTZ_POSITION: &str = "pan=-12.5\ntilt=4.25\nzoom=2500\nautofocus=on\n";
pub const GEOLOCATION: &str = "<?xml version=\"1.0\"?><PositionResponse><Success><GetSuccess><Location><Lat>55.716</Lat><Lng>13.196</Lng><Heading>271.5</Heading></Location><ValidPosition>true</ValidPosition><ValidHeading>true</ValidHeading><Text>Pier</Text></GetSuccess></Success></PositionResponse>";
pub const CLOCK: &str = r#"{"apiVersion":"1.0","data":{"dateTime":"2024-05-01T08:00:00Z","localDateTime":"2024-05-01T10:00:00+02:00","timeZone":"Europe/Stockholm"}}"#;
pub const IDENTITY: &str = "root.Brand.ProdNbr=Q6215-LE\nroot.Properties.Firmware.Version=10.12.114\nroot.Properties.System.SerialNumber=ACCC8EF00001\n";
pub const IDENTITY_XML: &str = r#"<parameterDefinitions><model>Q6215-LE</model><firmwareVersion>10.12.114</firmwareVersion><parameter name="SerialNumber" value="ACCC8EF00001"/></parameterDefinitions>"#;
pub const TEMPERATURE: &str = "Sensor.S0.Name=Internal\nSensor.S0.Celsius=31.25\nHeater.H0.Status=Running\nHeater.H0.TimeUntilStop=120\n";
pub const IR_CUT_FILTER: &str = "root.ImageSource.I0.DayNight.IrCutFilter=auto\n";
pub const PTZ_LIMITS: &str = "root.PTZ.Limit.L1.MinZoom=1\nroot.PTZ.Limit.L1.MaxZoom=9999\nroot.PTZ.Limit.L1.MinPan=-180\nroot.PTZ.Limit.L1.MaxPan=180\nroot.PTZ.Limit.L1.MinTilt=-90\nroot.PTZ.Limit.L1.MaxTilt=20\n";

/// How the fake camera misbehaves.
#[derive(Debug, Clone)]
pub struct Behaviour {
    pub auth: AuthMode,
    pub legacy_ptz_only: bool,
    pub geolocation_delay: Option<Duration>,
    pub identity_text_broken: bool,
    pub ir_unavailable: bool,
    pub clock_body: Option<(StatusCode, String)>,
}

impl Default for Behaviour {
    fn default() -> Self {
        Self {
            auth: AuthMode::None,
            legacy_ptz_only: false,
            geolocation_delay: None,
            identity_text_broken: false,
            ir_unavailable: false,
            clock_body: None,
        }
    }
}

#[derive(Clone)]
struct FakeState {
    behaviour: Behaviour,
    hits: Arc<Mutex<Vec<String>>>,
}

pub struct FakeCameraServer {
    pub addr: SocketAddr,
    hits: Arc<Mutex<Vec<String>>>,
}

impl FakeCameraServer {
    pub async fn spawn(behaviour: Behaviour) -> Self {
        let hits = Arc::new(Mutex::new(Vec::new()));
        let state = FakeState {
            behaviour,
            hits: Arc::clone(&hits),
        };
        let app = Router::new().fallback(handle).with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, hits }
    }

    pub fn camera_config(&self, auth: AuthMode) -> CameraConfig {
        let mut config = CameraConfig::new(self.addr.to_string());
        config.username = Some(USERNAME.to_string());
        config.password = Some(PASSWORD.to_string());
        config.auth = Some(auth);
        config.timeout_ms = 1_000;
        config
    }

    /// Every request seen, as `path?query` (with `401 ` prefixed when auth was refused).
    pub fn hits(&self) -> Vec<String> {
        self.hits.lock().unwrap().clone()
    }

    pub fn hit_count(&self, needle: &str) -> usize {
        self.hits().iter().filter(|h| h.contains(needle)).count()
    }
}

fn md5_hex(input: &str) -> String {
    format!("{:x}", Md5::digest(input.as_bytes()))
}

fn digest_params(header: &str) -> HashMap<String, String> {
    header
        .trim_start_matches("Digest ")
        .split(", ")
        .filter_map(|part| part.split_once('='))
        .map(|(k, v)| (k.trim().to_string(), v.trim_matches('"').to_string()))
        .collect()
}

fn authorized(behaviour: &Behaviour, method: &Method, headers: &HeaderMap) -> bool {
    let header = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    match behaviour.auth {
        AuthMode::None => true,
        AuthMode::Basic => {
            header == format!("Basic {}", BASE64.encode(format!("{}:{}", USERNAME, PASSWORD)))
        }
        AuthMode::Digest => {
            if !header.starts_with("Digest ") {
                return false;
            }
            let params = digest_params(header);
            let get = |k: &str| params.get(k).cloned().unwrap_or_default();
            if get("nonce") != NONCE || get("username") != USERNAME {
                return false;
            }
            let ha1 = md5_hex(&format!("{}:{}:{}", USERNAME, REALM, PASSWORD));
            let ha2 = md5_hex(&format!("{}:{}", method, get("uri")));
            let expected = md5_hex(&format!(
                "{}:{}:{}:{}:auth:{}",
                ha1,
                NONCE,
                get("nc"),
                get("cnonce"),
                ha2
            ));
            get("response") == expected
        }
    }
}

fn text(body: &str) -> Response {
    (StatusCode::OK, body.to_string()).into_response()
}

async fn handle(
    State(state): State<FakeState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let behaviour = &state.behaviour;
    let target = match uri.query() {
        Some(query) => format!("{}?{}", uri.path(), query),
        None => uri.path().to_string(),
    };

    if !authorized(behaviour, &method, &headers) {
        state.hits.lock().unwrap().push(format!("401 {}", target));
        let mut response = (StatusCode::UNAUTHORIZED, "Unauthorized").into_response();
        if behaviour.auth == AuthMode::Digest {
            response.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                format!(r#"Digest realm="{}", nonce="{}", algorithm=MD5, qop="auth""#, REALM, NONCE)
                    .parse()
                    .unwrap(),
            );
        }
        return response;
    }
    state.hits.lock().unwrap().push(target.clone());

    let query = uri.query().unwrap_or("");
    match uri.path() {
        "/axis-cgi/com/ptz.cgi" => {
            if behaviour.legacy_ptz_only && !query.contains("camera=1") {
                (StatusCode::NOT_FOUND, "Not Found").into_response()
            } else {
                text(PTZ_POSITION)
            }
        }
        "/axis-cgi/geolocation/get.cgi" => {
            if let Some(delay) = behaviour.geolocation_delay {
                tokio::time::sleep(delay).await;
            }
            text(GEOLOCATION)
        }
        "/axis-cgi/time.cgi" => match &behaviour.clock_body {
            Some((status, body)) => (*status, body.clone()).into_response(),
            None => ([(header::CONTENT_TYPE, "application/json")], CLOCK).into_response(),
        },
        "/axis-cgi/temperaturecontrol.cgi" => text(TEMPERATURE),
        "/axis-cgi/param.cgi" => {
            if query.contains("listdefinitions") {
                text(IDENTITY_XML)
            } else if query.contains("Brand.ProdNbr") {
                if behaviour.identity_text_broken {
                    text("# Error: Error -1 getting param in group 'Brand'\n")
                } else {
                    text(IDENTITY)
                }
            } else if query.contains("IrCutFilter") {
                if behaviour.ir_unavailable {
                    (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response()
                } else {
                    text(IR_CUT_FILTER)
                }
            } else if query.contains("PTZ.Limit") {
                text(PTZ_LIMITS)
            } else {
                (StatusCode::NOT_FOUND, "Not Found").into_response()
            }
        }
        _ => (StatusCode::NOT_FOUND, "Not Found").into_response(),
    }
}
