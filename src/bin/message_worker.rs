use std::sync::Arc;

use anyhow::anyhow;

use together::config::AppConfig;
use together::db;
use together::logging::init_tracing;
use together::store::PgStore;
use together::utils::email::notifier_from_config;
use together::utils::shutdown::shutdown_signal;
use together::worker::MessageWorker;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;
    init_tracing(&config)?;

    if config.uses_memory_store() {
        return Err(anyhow!(
            "message_worker shares its store with the API and needs a Postgres DATABASE_URL"
        ));
    }

    let pool = db::connect_to_db(&config).await?;
    db::run_migrations(&pool).await?;

    let store = Arc::new(PgStore::new(pool));
    let notifier = notifier_from_config(&config)?;
    let worker = MessageWorker::new(store.clone(), store, notifier, config.worker_poll_interval);

    worker.run(shutdown_signal()).await;
    Ok(())
}
