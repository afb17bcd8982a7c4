use thiserror::Error;

/// Failure talking to, or understanding, the camera.
///
/// Never escapes the camera layer as a panic; the aggregator turns it into a per-field
/// `error` string via `Display`.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum UpstreamError {
    #[error("camera request timed out after {0} ms")]
    Timeout(u64),

    #[error("camera unreachable: {0}")]
    Transport(String),

    #[error("camera returned HTTP {status} for {path}")]
    Status { status: u16, path: String },

    #[error("camera authentication failed: {0}")]
    Auth(String),

    #[error("unexpected camera payload: {0}")]
    Parse(String),
}

impl UpstreamError {
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    pub fn is_status(&self) -> bool {
        matches!(self, Self::Status { .. })
    }
}

impl From<quick_xml::Error> for UpstreamError {
    fn from(err: quick_xml::Error) -> Self {
        Self::Parse(format!("malformed XML: {}", err))
    }
}

/// Failure of a cache build, shared by every caller coalesced onto that build.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CacheError {
    #[error("{0}")]
    Build(String),

    #[error("build of {0} aborted")]
    Aborted(String),
}
