use std::path::Path;

use thiserror::Error;

use super::schema::{ServerConfig, StoreBackend};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("parse: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("validation: {0}")]
    Validation(String),
}

pub fn load_from_file(path: &Path) -> Result<ServerConfig, LoadError> {
    let contents = std::fs::read_to_string(path)?;
    load_from_str(&contents)
}

pub fn load_from_str(yaml: &str) -> Result<ServerConfig, LoadError> {
    let cfg: ServerConfig = serde_yaml::from_str(yaml)?;
    validate(&cfg)?;
    Ok(cfg)
}

fn validate(cfg: &ServerConfig) -> Result<(), LoadError> {
    let idem = &cfg.idempotency;
    if cfg.jwt_secret.is_empty() {
        return Err(LoadError::Validation("jwt_secret must not be empty".into()));
    }
    if idem.ttl_secs == 0 {
        return Err(LoadError::Validation("idempotency.ttl_secs must be > 0".into()));
    }
    if idem.stale_after_secs == 0 || idem.stale_after_secs >= idem.ttl_secs {
        return Err(LoadError::Validation(
            "idempotency.stale_after_secs must be > 0 and < ttl_secs".into(),
        ));
    }
    if idem.max_wait_ms == 0 {
        return Err(LoadError::Validation(
            "idempotency.max_wait_ms must be > 0".into(),
        ));
    }
    if idem.poll_interval_ms == 0 || idem.poll_interval_ms > idem.max_poll_interval_ms {
        return Err(LoadError::Validation(
            "idempotency.poll_interval_ms must be > 0 and <= max_poll_interval_ms".into(),
        ));
    }
    if idem.sweep_interval_secs == 0 {
        return Err(LoadError::Validation(
            "idempotency.sweep_interval_secs must be > 0".into(),
        ));
    }
    if cfg.store.backend == StoreBackend::Postgres
        && cfg.store.database_url.as_deref().map_or(true, str::is_empty)
    {
        return Err(LoadError::Validation(
            "store.database_url is required for the postgres backend".into(),
        ));
    }
    if cfg.storage_retry.backoff_factor < 1.0 {
        return Err(LoadError::Validation(
            "storage_retry.backoff_factor must be >= 1.0".into(),
        ));
    }
    Ok(())
}
