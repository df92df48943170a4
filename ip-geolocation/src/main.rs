use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use ip_geolocation::config::RunnerConfig;
use ip_geolocation::geo::GeoClient;
use ip_geolocation::host::{BroadcastEvents, FileStorage, SharedPosition};
use ip_geolocation::sensor::GeolocationRefresher;
use ip_geolocation::web::{AppState, create_router};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = RunnerConfig::from_env();

    let storage = FileStorage::open(&config.storage_path).expect("Failed to open device storage");
    info!(path = ?storage.path(), "opened device storage");

    let client = GeoClient::new(config.geo_client_config()).expect("Failed to create HTTP client");

    // Log device events the way a host would pick them up
    let events = BroadcastEvents::new();
    let mut event_rx = events.subscribe();
    tokio::spawn(async move {
        loop {
            match event_rx.recv().await {
                Ok(interface) => info!(?interface, "device event"),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "device event log lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let position = SharedPosition::new();

    let device = GeolocationRefresher::start(
        Arc::new(storage),
        Arc::new(events),
        Arc::new(position),
        Arc::new(client),
    );

    let app = create_router(AppState::new(device));

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .expect("Failed to bind listen address");
    info!(addr = %config.listen_addr, "IP geolocation sensor listening");
    info!("  GET  /health          - Health check");
    info!("  GET  /settings        - Settings with current values");
    info!("  PUT  /settings/{{key}}  - Change a setting");
    info!("  GET  /position        - Current position reading");

    if let Err(e) = axum::serve(listener, app).await {
        error!(error = %e, "server error");
    }
}
