use std::path::PathBuf;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use idemgate_server::config::{self, ServerConfig, StoreBackend};
use idemgate_server::coordinator::Coordinator;
use idemgate_server::metrics::CoordinatorMetrics;
use idemgate_server::rest::{self, AppState};
use idemgate_server::shutdown::wait_for_shutdown;
use idemgate_server::store::{migrator, FingerprintStore, MemoryFingerprintStore, PgFingerprintStore};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .json()
        .init();

    let config = match std::env::var_os("IDEMGATE_CONFIG") {
        Some(path) => {
            let path = PathBuf::from(path);
            tracing::info!(path = %path.display(), "loading configuration");
            config::load_from_file(&path)?
        }
        None => ServerConfig::default(),
    };

    let store = open_store(&config).await?;
    let coordinator = Coordinator::new(
        store,
        config.idempotency.coordinator_settings(),
        config.storage_retry.retry_config(),
        CoordinatorMetrics::new(),
    );
    let sweeper = coordinator
        .sweeper()
        .spawn(coordinator.settings().sweep_interval);

    let app = rest::router(AppState::new(coordinator, config.jwt_secret.into_bytes()));
    let listener = tokio::net::TcpListener::bind(config.rest_addr).await?;
    tracing::info!(addr = %config.rest_addr, backend = ?config.store.backend, "idemgate server starting");

    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_shutdown())
        .await?;

    sweeper.abort();
    tracing::info!("idemgate server stopped");
    Ok(())
}

async fn open_store(
    config: &ServerConfig,
) -> Result<Arc<dyn FingerprintStore>, Box<dyn std::error::Error + Send + Sync>> {
    match config.store.backend {
        StoreBackend::Memory => Ok(Arc::new(MemoryFingerprintStore::new())),
        StoreBackend::Postgres => {
            let url = config
                .store
                .database_url
                .as_deref()
                .ok_or("store.database_url is required for the postgres backend")?;
            let store = PgFingerprintStore::connect(url, config.store.max_connections).await?;
            let applied = migrator::run_migrations(store.pool()).await?;
            tracing::info!(applied = applied.len(), "postgres store ready");
            Ok(Arc::new(store))
        }
    }
}
