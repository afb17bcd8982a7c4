use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Prefix for environment overrides, e.g. `CAMERA_RELAY__CAMERA__PASSWORD`.
const ENV_PREFIX: &str = "CAMERA_RELAY";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    pub camera: CameraConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub live: LiveConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_listen_address")]
    pub listen_address: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_true")]
    pub cors_permissive: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    None,
    Basic,
    Digest,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CameraConfig {
    pub address: String,
    #[serde(default = "default_scheme")]
    pub scheme: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub auth: Option<AuthMode>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_status_ttl_ms")]
    pub status_ttl_ms: u64,
    #[serde(default = "default_capabilities_ttl_ms")]
    pub capabilities_ttl_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LiveConfig {
    #[serde(default = "default_status_interval_ms")]
    pub status_interval_ms: u64,
    #[serde(default = "default_presence_interval_ms")]
    pub presence_interval_ms: u64,
    #[serde(default = "default_viewer_ttl_ms")]
    pub viewer_ttl_ms: u64,
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,
}

fn default_listen_address() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_scheme() -> String {
    "http".to_string()
}

fn default_timeout_ms() -> u64 {
    4_000
}

fn default_status_ttl_ms() -> u64 {
    2_000
}

fn default_capabilities_ttl_ms() -> u64 {
    300_000
}

fn default_status_interval_ms() -> u64 {
    2_000
}

fn default_presence_interval_ms() -> u64 {
    15_000
}

fn default_viewer_ttl_ms() -> u64 {
    65_000
}

fn default_keep_alive_secs() -> u64 {
    15
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_address: default_listen_address(),
            log_level: default_log_level(),
            cors_permissive: true,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            status_ttl_ms: default_status_ttl_ms(),
            capabilities_ttl_ms: default_capabilities_ttl_ms(),
        }
    }
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            status_interval_ms: default_status_interval_ms(),
            presence_interval_ms: default_presence_interval_ms(),
            viewer_ttl_ms: default_viewer_ttl_ms(),
            keep_alive_secs: default_keep_alive_secs(),
        }
    }
}

impl AppConfig {
    /// Loads the YAML file (if present) and layers `CAMERA_RELAY__*` environment overrides on top.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let builder = config::Config::builder()
            .add_source(
                config::File::from(path)
                    .format(config::FileFormat::Yaml)
                    .required(false),
            )
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"));

        let config: AppConfig = builder
            .build()
            .with_context(|| format!("Failed to read configuration from {}", path.display()))?
            .try_deserialize()
            .context("Failed to parse configuration")?;

        config.validate()?;
        Ok(config)
    }

    pub fn load_from_str(contents: &str) -> Result<Self> {
        let config: AppConfig = config::Config::builder()
            .add_source(config::File::from_str(contents, config::FileFormat::Yaml))
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Failed to parse YAML configuration")?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.camera.address.trim().is_empty() {
            bail!("camera.address must not be empty");
        }

        let durations = [
            ("camera.timeout_ms", self.camera.timeout_ms),
            ("cache.status_ttl_ms", self.cache.status_ttl_ms),
            ("cache.capabilities_ttl_ms", self.cache.capabilities_ttl_ms),
            ("live.status_interval_ms", self.live.status_interval_ms),
            ("live.presence_interval_ms", self.live.presence_interval_ms),
            ("live.viewer_ttl_ms", self.live.viewer_ttl_ms),
            ("live.keep_alive_secs", self.live.keep_alive_secs),
        ];
        for (name, value) in durations {
            if value == 0 {
                bail!("{} must be greater than zero", name);
            }
        }

        Ok(())
    }
}

impl CameraConfig {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            scheme: default_scheme(),
            username: None,
            password: None,
            auth: None,
            timeout_ms: default_timeout_ms(),
        }
    }

    pub fn base_url(&self) -> String {
        format!("{}://{}", self.scheme, self.address)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Basic when credentials exist and no mode was chosen explicitly.
    pub fn auth_mode(&self) -> AuthMode {
        match (self.auth, &self.username) {
            (Some(mode), _) => mode,
            (None, Some(_)) => AuthMode::Basic,
            (None, None) => AuthMode::None,
        }
    }
}

impl CacheConfig {
    pub fn status_ttl(&self) -> Duration {
        Duration::from_millis(self.status_ttl_ms)
    }

    pub fn capabilities_ttl(&self) -> Duration {
        Duration::from_millis(self.capabilities_ttl_ms)
    }
}

impl LiveConfig {
    pub fn status_interval(&self) -> Duration {
        Duration::from_millis(self.status_interval_ms)
    }

    pub fn presence_interval(&self) -> Duration {
        Duration::from_millis(self.presence_interval_ms)
    }

    pub fn viewer_ttl(&self) -> Duration {
        Duration::from_millis(self.viewer_ttl_ms)
    }

    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }
}
