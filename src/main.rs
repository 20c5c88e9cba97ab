use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use cluster_dashboard::{
    router,
    services::{ChannelOptions, DirectoryPoller},
    AppState, AuthService, ClusterService, Config, StatusSyncChannel,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load configuration: {:#}", e);
            return Err(e.into());
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    info!("🚀 Starting cluster dashboard...");
    info!("✅ Configuration loaded (API: {}, socket: {})", config.restapi_endpoint, config.websocket_url);

    let auth_service = AuthService::new(&config)?;
    let cluster_service = ClusterService::new(&config)?;

    if let Err(e) = auth_service.access_token().await {
        warn!("⚠️ Not signed in yet, will retry on the next directory poll: {:#}", e);
    }

    // One channel for this dashboard session
    let channel = StatusSyncChannel::mount(ChannelOptions::from_config(&config)?);

    let poller = DirectoryPoller::new(
        Arc::new(cluster_service.clone()),
        auth_service.clone(),
        channel.clone(),
        config.directory_poll_interval(),
    )
    .spawn();

    let app_state = AppState {
        config: config.clone(),
        auth_service: auth_service.clone(),
        cluster_service,
        channel: channel.clone(),
    };

    let app = router(app_state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            ),
    );

    let listener = match tokio::net::TcpListener::bind(&config.server_address).await {
        Ok(listener) => {
            info!("🌐 Dashboard API listening on {}", config.server_address);
            listener
        }
        Err(e) => {
            eprintln!("❌ Failed to bind to {}: {}", config.server_address, e);
            channel.unmount();
            return Err(e.into());
        }
    };

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    channel.unmount();
    poller.abort();
    if let Err(e) = auth_service.logout().await {
        warn!("⚠️ Keycloak logout failed: {:#}", e);
    }

    if let Err(e) = served {
        eprintln!("❌ Server error: {}", e);
        return Err(e.into());
    }

    info!("✅ Dashboard stopped gracefully");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
