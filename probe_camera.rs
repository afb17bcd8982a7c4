// Queries every telemetry resource once, bypassing the caches, and prints what was parsed.
// Run with: CONFIG_PATH=config/relay.yaml cargo run --bin probe_camera

use std::sync::Arc;

use camera_relay::camera::{CameraApi, CameraClient};
use camera_relay::config::AppConfig;
use camera_relay::telemetry::StatusAggregator;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let config_path = std::env::var("CONFIG_PATH")
        .unwrap_or_else(|_| "config/relay.yaml".to_string());
    let config = AppConfig::load_from_file(&config_path)?;

    println!("Probing {} (auth: {:?})", config.camera.base_url(), config.camera.auth_mode());
    let camera = Arc::new(CameraClient::new(config.camera.clone())?);

    println!("\n=== PTZ position ===");
    match camera.ptz_position().await {
        Ok(optics) => println!("{:#?}", optics),
        Err(e) => eprintln!("PTZ position error: {}", e),
    }

    println!("\n=== PTZ limits ===");
    match camera.ptz_limits().await {
        Ok(limits) => println!("{:#?}", limits),
        Err(e) => eprintln!("PTZ limits error: {}", e),
    }

    println!("\n=== Aggregated snapshot ===");
    let aggregator = StatusAggregator::new(camera);
    let snapshot = aggregator.build().await;
    println!("{}", serde_json::to_string_pretty(&snapshot)?);

    let failed = snapshot.failed_fields();
    if failed.is_empty() {
        println!("\nAll resources answered");
    } else {
        println!("\nDegraded fields: {}", failed.join(", "));
    }

    Ok(())
}
