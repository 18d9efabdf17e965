mod api;
mod middleware;
mod scheduler;

use std::sync::Arc;

use stocksync_engine::{PgStore, StockStore, SyncOrchestrator, SyncSettings};
use stocksync_suppliers::{HttpSettings, SupplierRegistry};
use tracing_subscriber::EnvFilter;

use crate::{
    api::{build_app, AppState},
    middleware::{AuthState, RateLimitState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Arc::new(stocksync_core::load_app_config()?);
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = stocksync_db::PoolConfig::from_app_config(&config);
    let pool = stocksync_db::connect_pool(&config.database_url, pool_config).await?;
    let applied = stocksync_db::run_migrations(&pool).await?;
    tracing::info!(applied, "database migrations up to date");

    let registry = SupplierRegistry::with_defaults(&HttpSettings {
        timeout_secs: config.supplier_request_timeout_secs,
        user_agent: config.supplier_user_agent.clone(),
    })?;
    tracing::info!(connectors = ?registry.connectors(), "supplier adapters registered");

    let store: Arc<dyn StockStore> = Arc::new(PgStore::new(pool.clone()));
    let orchestrator = Arc::new(SyncOrchestrator::new(
        store,
        Arc::new(registry),
        SyncSettings::from_app_config(&config),
    ));

    let _scheduler =
        scheduler::build_scheduler(Arc::clone(&orchestrator), Arc::clone(&config)).await?;

    let auth = AuthState::from_env(&config.api_token_salt)?;
    let app = build_app(
        AppState { orchestrator, pool },
        auth,
        RateLimitState::from_app_config(&config),
        config.cors_allowed_origins.clone(),
    );

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, env = %config.env, "stocksync server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl-c");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
