//! Structured logging and tracing for chargectl
//!
//! Console, rolling file and an in-process broadcast stream (served to the web
//! API) are separate `tracing-subscriber` layers, each with its own level.

use crate::config::LoggingConfig;
use crate::error::{ChargeCtlError, Result};
use std::path::Path;
use tracing::{Level, Subscriber, info};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::writer::MakeWriter;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

mod broadcast;
mod level;
mod state;
mod structured;

pub use broadcast::subscribe_log_lines;
pub use level::{parse_line_level, parse_log_level, set_web_log_level_str};
pub use state::{get_web_log_level, set_web_log_level};
pub use structured::{LogContext, StructuredLogger, get_logger};

use broadcast::LineBroadcaster;
use level::{level_rank, min_level};
use state::{INIT_ERROR, INIT_ONCE, LOG_GUARD};

/// Initialize logging system based on configuration.
///
/// Only the first call installs the global subscriber; later calls return the
/// outcome of that first attempt.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    INIT_ONCE.call_once(|| {
        let init_result = (|| -> Result<()> {
            let base_level = parse_log_level(&config.level)?;
            let layer_level = |over: &Option<String>| {
                over.as_deref()
                    .and_then(|s| parse_log_level(s).ok())
                    .unwrap_or(base_level)
            };
            let console_level = layer_level(&config.console_level);
            let file_level = layer_level(&config.file_level);
            let web_level = layer_level(&config.web_level);

            // The global filter must pass the most verbose layer; each layer down-filters
            let most_verbose = min_level(min_level(console_level, file_level), web_level);
            let filter = build_env_filter(most_verbose);

            if should_use_console_only() {
                tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt_layer(std::io::stdout, config.json_format, console_level))
                    .with(broadcast_layer(config.json_format))
                    .init();
                info!(
                    "Logging initialized - console_level: {:?}, web_level: {:?}, console-only",
                    console_level, web_level
                );
            } else {
                init_file_logging(config, filter, console_level, file_level)?;
                info!(
                    "Logging initialized - console_level: {:?}, file_level: {:?}, web_level: {:?}, file: {}",
                    console_level, file_level, web_level, config.file
                );
            }

            set_web_log_level(web_level);
            Ok(())
        })();

        if let Err(e) = init_result {
            let _ = INIT_ERROR.set(e.to_string());
        }
    });

    if let Some(err) = INIT_ERROR.get() {
        return Err(ChargeCtlError::config(err.clone()));
    }
    Ok(())
}

fn build_env_filter(level: Level) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("chargectl={},tower_http=warn", level).into())
}

fn should_use_console_only() -> bool {
    cfg!(test) || std::env::var_os("CHARGECTL_DISABLE_FILE_LOG").is_some()
}

fn fmt_layer<S, W>(writer: W, json: bool, level: Level) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let base = fmt::layer()
        .with_writer(writer)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false);
    if json {
        base.json()
            .with_filter(LevelFilter::from_level(level))
            .boxed()
    } else {
        base.with_filter(LevelFilter::from_level(level)).boxed()
    }
}

// Captures everything; the web stream filters at runtime against the web level
fn broadcast_layer<S>(json: bool) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fmt_layer(LineBroadcaster::new(), json, Level::TRACE)
}

fn init_file_logging(
    config: &LoggingConfig,
    filter: EnvFilter,
    console_level: Level,
    file_level: Level,
) -> Result<()> {
    // A path with an extension names the file; its parent is the rotation dir
    let configured = Path::new(&config.file);
    let (dir, prefix, suffix) = match (configured.file_stem(), configured.extension()) {
        (Some(stem), Some(ext)) => (
            configured.parent().unwrap_or(configured),
            stem.to_string_lossy().into_owned(),
            ext.to_string_lossy().into_owned(),
        ),
        _ => (configured, "chargectl".to_string(), "log".to_string()),
    };

    let file_appender = rolling::Builder::new()
        .rotation(rolling::Rotation::DAILY)
        .filename_prefix(prefix)
        .filename_suffix(suffix)
        .max_log_files(config.backup_count.max(1) as usize)
        .build(dir)
        .map_err(|e| ChargeCtlError::io(format!("Failed to create log file appender: {}", e)))?;

    let (non_blocking_appender, guard) = non_blocking(file_appender);
    let _ = LOG_GUARD.set(guard);

    let console = config
        .console_output
        .then(|| fmt_layer(std::io::stdout, config.json_format, console_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer(non_blocking_appender, config.json_format, file_level))
        .with(broadcast_layer(config.json_format))
        .with(console)
        .init();
    Ok(())
}

/// Whether a formatted line should be emitted to the web SSE stream given the
/// current runtime web level
pub fn should_emit_to_web(line: &str) -> bool {
    let current = get_web_log_level();
    match parse_line_level(line) {
        Some(line_lvl) => level_rank(line_lvl) >= level_rank(current),
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        let config = LoggingConfig::default();
        assert!(init_logging(&config).is_ok());
        assert!(init_logging(&config).is_ok());
        get_logger("test_component").info("Test info message");
    }

    #[test]
    fn test_should_emit_unparsable_lines() {
        assert!(should_emit_to_web("no level marker here"));
    }
}
