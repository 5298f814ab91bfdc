pub mod config;
pub mod controllers;
pub mod dashboard;
pub mod db;
pub mod debounce;
pub mod errors;
pub mod events;
pub mod ids;
pub mod models;
pub mod records;
pub mod shell;

pub use crate::config::StorageConfig;
pub use crate::db::Storage;
pub use crate::errors::{AppError, AppResult};
pub use crate::events::{ChangeEvent, EventBus, EventKind};
pub use crate::shell::AppShell;

use std::path::Path;
use std::sync::Arc;
use tracing_appender::non_blocking::WorkerGuard;

static LOG_GUARD: std::sync::OnceLock<WorkerGuard> = std::sync::OnceLock::new();

/// Opens storage for `config` and builds the application shell with all collections loaded.
pub fn start(config: &StorageConfig) -> AppResult<AppShell> {
    std::fs::create_dir_all(config.data_dir())?;
    let storage = Arc::new(Storage::open(config)?);
    tracing::info!(
        data_dir = %config.data_dir().display(),
        backends = ?storage.backend_names(),
        "storage ready"
    );
    Ok(AppShell::new(storage))
}

pub fn init_tracing(log_dir: &Path) -> Result<(), String> {
    std::fs::create_dir_all(log_dir).map_err(|error| error.to_string())?;
    let file_appender = tracing_appender::rolling::daily(log_dir, "tracker.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let _ = LOG_GUARD.set(guard);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .json()
        .with_writer(non_blocking)
        .try_init()
        .map_err(|error| error.to_string())
}
