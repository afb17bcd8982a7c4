use anyhow::{Context, Result};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use camera_relay::camera::CameraClient;
use camera_relay::config::AppConfig;
use camera_relay::server::{self, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config_path = std::env::var("CONFIG_PATH")
        .unwrap_or_else(|_| "config/relay.yaml".to_string());

    let config = AppConfig::load_from_file(&config_path)
        .context("Failed to load configuration")?;

    // Initialize tracing; RUST_LOG wins over the configured level
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("camera_relay={},tower_http=debug", config.server.log_level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting camera telemetry relay");
    tracing::info!(
        "Camera at {} (auth: {:?}, timeout: {} ms)",
        config.camera.base_url(),
        config.camera.auth_mode(),
        config.camera.timeout_ms
    );

    let camera = CameraClient::new(config.camera.clone())
        .context("Failed to create camera client")?;

    let state = AppState::new(Arc::new(camera), &config.cache, &config.live);
    tracing::info!(
        "Status cache TTL {:?}, capabilities cache TTL {:?}, viewer TTL {:?}",
        state.status_cache.ttl(),
        state.capabilities_cache.ttl(),
        state.presence.ttl()
    );

    server::start_server(&config.server, state).await?;

    Ok(())
}
