use std::path::Path;

use anyhow::Result;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

use sl_config::{LogFormat, LoggingConfig};

/// Initialise the `tracing` subscriber stack from [`LoggingConfig`].
///
/// Events go to stderr (the data stream owns stdout), plus an optional
/// log file. Returns an optional [`WorkerGuard`] that must be held until
/// the process exits; dropping it flushes the non-blocking file writer.
///
/// Precedence: the `RUST_LOG` env-var overrides the configured level.
pub fn init_tracing(config: &LoggingConfig, base_dir: &Path) -> Result<Option<WorkerGuard>> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::try_new(&config.level)
            .map_err(|e| anyhow::anyhow!("invalid log filter {:?}: {e}", config.level))?
    };
    let is_json = config.format == LogFormat::Json;

    let mut guard = None;
    let file_layer = match &config.file {
        None => None,
        Some(file_path) => {
            let resolved = if file_path.is_relative() {
                base_dir.join(file_path)
            } else {
                file_path.clone()
            };
            let dir = resolved
                .parent()
                .ok_or_else(|| anyhow::anyhow!("log file path has no parent directory"))?;
            std::fs::create_dir_all(dir)?;
            let file_name = resolved
                .file_name()
                .ok_or_else(|| anyhow::anyhow!("log file path has no file name"))?
                .to_os_string();

            let appender = tracing_appender::rolling::never(dir, file_name);
            let (non_blocking, file_guard) = tracing_appender::non_blocking(appender);
            guard = Some(file_guard);

            let layer = fmt::layer().with_ansi(false).with_writer(non_blocking);
            let layer = if is_json { layer.json().boxed() } else { layer.boxed() };
            Some(layer)
        }
    };

    let stderr_layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);
    let stderr_layer = if is_json {
        stderr_layer.json().boxed()
    } else {
        stderr_layer.boxed()
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stderr_layer)
        .init();

    Ok(guard)
}
