use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tower_sessions_sqlx_store::PostgresStore;
use tracing::{info, warn};

use together::app_state::AppState;
use together::config::AppConfig;
use together::db;
use together::logging::init_tracing;
use together::routes;
use together::store::{MemoryStore, PgStore};
use together::utils::email::notifier_from_config;
use together::utils::shutdown::shutdown_signal;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;
    init_tracing(&config)?;

    let notifier = notifier_from_config(&config)?;

    let app = if config.uses_memory_store() {
        warn!("using the in-memory store, data is lost on restart");
        let state = AppState::new(Arc::new(MemoryStore::new()), notifier, config.bcrypt_cost);
        routes::create_app(state, tower_sessions::MemoryStore::default(), false)
    } else {
        let pool = db::connect_to_db(&config).await?;
        db::run_migrations(&pool).await?;

        let session_store = PostgresStore::new(pool.clone());
        session_store
            .migrate()
            .await
            .context("Failed to migrate session store")?;

        let state = AppState::new(Arc::new(PgStore::new(pool)), notifier, config.bcrypt_cost);
        routes::create_app(state, session_store, false)
    };

    let address = config.bind_address();
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;
    info!(%address, "starting api");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| {
            tracing::error!(error = %err, "server exited");
            err
        })?;

    Ok(())
}
