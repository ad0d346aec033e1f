use std::net::SocketAddr;
use std::sync::Arc;

use shellcast_core::BrokerConfig;
use shellcast_gateway::app;
use shellcast_sessions::SessionManager;
use shellcast_store::Store;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "shellcast_gateway=info,tower_http=debug".into()),
        )
        .init();

    let config_path = std::env::var("SHELLCAST_CONFIG").ok();
    let config = BrokerConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        tracing::warn!("config load failed ({e}), using defaults");
        BrokerConfig::default()
    });

    let store = Store::open(&config.database.path)?;
    let sessions = SessionManager::new(store);
    sessions.restart_recovery().await?;

    let bind = config.gateway.bind.clone();
    let port = config.gateway.port;

    let state = Arc::new(app::AppState::new(config, sessions));
    let router = app::build_router(state);

    let addr: SocketAddr = format!("{bind}:{port}").parse()?;
    info!("shellcast gateway listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}
