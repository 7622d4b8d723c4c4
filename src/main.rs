use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use factura_api as api;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = api::config::load_config().context("failed to load configuration")?;
    api::config::init_tracing(&cfg.log_level);

    let db = api::db::establish_connection_from_app_config(&cfg)
        .await
        .context("failed to connect to the default tenant database")?;

    let registry = api::tenant::TenantRegistry::new(api::db::DbConfig::from_app_config(&cfg));
    registry.register_pool(api::DEFAULT_TENANT, Arc::new(db));

    let state = Arc::new(api::AppState::new(cfg.clone(), registry));
    let app = api::app_router(state);

    let listener = tokio::net::TcpListener::bind(cfg.listen_addr())
        .await
        .with_context(|| format!("failed to bind {}", cfg.listen_addr()))?;
    info!(addr = %cfg.listen_addr(), "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(%err, "failed to install shutdown handler");
        return;
    }
    info!("shutdown signal received");
}
