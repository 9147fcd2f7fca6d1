use bindserve_error::{FatalError, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, prelude::*};

use crate::config::LoggingConfig;

pub const LOG_FILE_PREFIX: &str = "bindserve.log";

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Install the global subscriber: stderr always, plus a daily-rotated file
/// when `log_dir` is set. `RUST_LOG` overrides `config.filter`.
///
/// Keep the returned guard alive for as long as file logs should be flushed.
/// A subscriber that is already installed is left in place.
pub fn init_tracing(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.filter))
        .map_err(|e| FatalError::Config(format!("invalid log filter {:?}: {e}", config.filter)))?;

    let mut layers: Vec<BoxedLayer> = Vec::new();
    layers.push(stderr_layer(config.json));

    let guard = match &config.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir).map_err(|source| FatalError::FileOperation {
                operation: "create log directory",
                path: dir.clone(),
                source,
            })?;
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            layers.push(file_layer(config.json, writer));
            Some(guard)
        }
        None => None,
    };

    let _ = tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init();

    Ok(guard)
}

fn stderr_layer(json: bool) -> BoxedLayer {
    let layer = fmt::layer()
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr);
    if json {
        layer.json().boxed()
    } else {
        layer.boxed()
    }
}

fn file_layer(json: bool, writer: tracing_appender::non_blocking::NonBlocking) -> BoxedLayer {
    let layer = fmt::layer()
        .with_target(true)
        .with_level(true)
        .with_thread_ids(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(false)
        .with_writer(writer);
    if json {
        layer.json().boxed()
    } else {
        layer.boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_filter_is_a_config_error() {
        // Only meaningful when RUST_LOG does not take precedence.
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        let config = LoggingConfig {
            filter: "bindserve=notalevel[".into(),
            ..LoggingConfig::default()
        };
        let err = init_tracing(&config).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn file_logging_creates_directory_and_returns_guard() {
        let dir = tempfile::tempdir().unwrap();
        let log_dir = dir.path().join("logs");
        let config = LoggingConfig {
            log_dir: Some(log_dir.clone()),
            ..LoggingConfig::default()
        };
        let guard = init_tracing(&config).unwrap();
        assert!(guard.is_some());
        assert!(log_dir.is_dir());
    }
}
