use anyhow::{Context, Result};
use std::net::SocketAddr;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::server::routes::{create_router, AppState};

pub async fn start_server(config: &ServerConfig, state: AppState) -> Result<()> {
    let addr: SocketAddr = config
        .listen_address
        .parse()
        .context("Failed to parse listen address")?;

    let hub = state.hub.clone();
    let mut app = create_router(state).layer(TraceLayer::new_for_http());
    if config.cors_permissive {
        app = app.layer(CorsLayer::permissive());
    }

    tracing::info!("Starting camera relay on {}", addr);
    match local_ip_address::local_ip() {
        Ok(ip) => tracing::info!("Live channel at: http://{}:{}/api/live", ip, addr.port()),
        Err(e) => tracing::debug!("Could not determine LAN address: {}", e),
    }

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            tracing::info!("Shutting down, closing {} live connection(s)", hub.open_connections());
            hub.shutdown();
        })
        .await
        .context("Server error")?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
