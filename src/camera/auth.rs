use md5::{Digest, Md5};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::UpstreamError;

/// A parsed `WWW-Authenticate: Digest ...` challenge.
#[derive(Debug, Clone, PartialEq)]
pub struct DigestChallenge {
    pub realm: String,
    pub nonce: String,
    pub opaque: Option<String>,
    pub algorithm: Option<String>,
    pub qop: Option<String>,
    pub stale: bool,
}

impl DigestChallenge {
    pub fn parse(header: &str) -> Result<Self, UpstreamError> {
        let header = header.trim();
        let params = match header.get(..7) {
            Some(scheme) if scheme.eq_ignore_ascii_case("digest ") => &header[7..],
            _ => {
                return Err(UpstreamError::Auth(format!(
                    "unsupported challenge: {}",
                    header
                )))
            }
        };

        let mut realm = None;
        let mut nonce = None;
        let mut opaque = None;
        let mut algorithm = None;
        let mut qop = None;
        let mut stale = false;

        for (key, value) in split_params(params) {
            match key.to_ascii_lowercase().as_str() {
                "realm" => realm = Some(value),
                "nonce" => nonce = Some(value),
                "opaque" => opaque = Some(value),
                "algorithm" => algorithm = Some(value),
                "qop" => qop = Some(value),
                "stale" => stale = value.eq_ignore_ascii_case("true"),
                _ => {}
            }
        }

        Ok(Self {
            realm: realm.ok_or_else(|| UpstreamError::Auth("challenge without realm".into()))?,
            nonce: nonce.ok_or_else(|| UpstreamError::Auth("challenge without nonce".into()))?,
            opaque,
            algorithm,
            qop,
            stale,
        })
    }

    fn supports_qop_auth(&self) -> bool {
        self.qop
            .as_deref()
            .map(|q| q.split(',').any(|v| v.trim().eq_ignore_ascii_case("auth")))
            .unwrap_or(false)
    }

    fn is_sess(&self) -> bool {
        self.algorithm
            .as_deref()
            .map(|a| a.eq_ignore_ascii_case("MD5-sess"))
            .unwrap_or(false)
    }
}

/// Splits `a="x, y", b=z` into pairs, honouring quoted commas.
fn split_params(input: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    let mut rest = input.trim();

    while !rest.is_empty() {
        let Some(eq) = rest.find('=') else {
            break;
        };
        let key = rest[..eq].trim().trim_start_matches(',').trim().to_string();
        rest = rest[eq + 1..].trim_start();

        let value;
        if let Some(quoted) = rest.strip_prefix('"') {
            let end = quoted.find('"').unwrap_or(quoted.len());
            value = quoted[..end].to_string();
            rest = quoted.get(end + 1..).unwrap_or("");
        } else {
            let end = rest.find(',').unwrap_or(rest.len());
            value = rest[..end].trim().to_string();
            rest = &rest[end..];
        }
        rest = rest.trim_start().trim_start_matches(',').trim_start();
        pairs.push((key, value));
    }

    pairs
}

fn md5_hex(input: &str) -> String {
    format!("{:x}", Md5::digest(input.as_bytes()))
}

#[derive(Debug)]
struct NonceState {
    challenge: DigestChallenge,
    count: u32,
}

/// HTTP Digest credentials plus the last challenge, reused preemptively until the camera
/// refuses it.
#[derive(Debug)]
pub struct DigestAuth {
    username: String,
    password: String,
    state: Mutex<Option<NonceState>>,
}

impl DigestAuth {
    pub fn new(username: String, password: String) -> Self {
        Self {
            username,
            password,
            state: Mutex::new(None),
        }
    }

    /// Header for the next request, if a challenge has been seen.
    pub async fn authorization(&self, method: &str, uri: &str) -> Option<String> {
        let mut state = self.state.lock().await;
        let state = state.as_mut()?;
        state.count += 1;
        let cnonce = Uuid::new_v4().simple().to_string();
        Some(self.generate_header(&state.challenge, method, uri, state.count, &cnonce))
    }

    /// Stores a fresh challenge and returns the header answering it.
    pub async fn answer(&self, challenge: DigestChallenge, method: &str, uri: &str) -> String {
        let cnonce = Uuid::new_v4().simple().to_string();
        let header = self.generate_header(&challenge, method, uri, 1, &cnonce);
        *self.state.lock().await = Some(NonceState {
            challenge,
            count: 1,
        });
        header
    }

    pub async fn forget(&self) {
        *self.state.lock().await = None;
    }

    pub fn generate_header(
        &self,
        challenge: &DigestChallenge,
        method: &str,
        uri: &str,
        nonce_count: u32,
        cnonce: &str,
    ) -> String {
        let mut ha1 = md5_hex(&format!(
            "{}:{}:{}",
            self.username, challenge.realm, self.password
        ));
        if challenge.is_sess() {
            ha1 = md5_hex(&format!("{}:{}:{}", ha1, challenge.nonce, cnonce));
        }
        let ha2 = md5_hex(&format!("{}:{}", method, uri));
        let nc = format!("{:08x}", nonce_count);

        let mut header = if challenge.supports_qop_auth() {
            let response = md5_hex(&format!(
                "{}:{}:{}:{}:auth:{}",
                ha1, challenge.nonce, nc, cnonce, ha2
            ));
            format!(
                r#"Digest username="{}", realm="{}", nonce="{}", uri="{}", response="{}", qop=auth, nc={}, cnonce="{}""#,
                self.username, challenge.realm, challenge.nonce, uri, response, nc, cnonce
            )
        } else {
            let response = md5_hex(&format!("{}:{}:{}", ha1, challenge.nonce, ha2));
            format!(
                r#"Digest username="{}", realm="{}", nonce="{}", uri="{}", response="{}""#,
                self.username, challenge.realm, challenge.nonce, uri, response
            )
        };

        if let Some(algorithm) = &challenge.algorithm {
            header.push_str(&format!(", algorithm={}", algorithm));
        }
        if let Some(opaque) = &challenge.opaque {
            header.push_str(&format!(r#", opaque="{}""#, opaque));
        }

        header
    }
}
