use once_cell::sync::{Lazy, OnceCell};
use std::sync::{Once, PoisonError, RwLock};
use tokio::sync::broadcast;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;

/// Keeps the non-blocking file writer alive for the life of the process
pub(super) static LOG_GUARD: OnceCell<WorkerGuard> = OnceCell::new();
pub(super) static INIT_ONCE: Once = Once::new();
pub(super) static INIT_ERROR: OnceCell<String> = OnceCell::new();
pub(super) static LOG_LINES: OnceCell<broadcast::Sender<String>> = OnceCell::new();

static WEB_LOG_LEVEL: Lazy<RwLock<Level>> = Lazy::new(|| RwLock::new(Level::INFO));

/// Level applied to the web log stream; lines below it are dropped
pub fn set_web_log_level(level: Level) {
    *WEB_LOG_LEVEL.write().unwrap_or_else(PoisonError::into_inner) = level;
}

pub fn get_web_log_level() -> Level {
    *WEB_LOG_LEVEL.read().unwrap_or_else(PoisonError::into_inner)
}
