//! Logging bootstrap
//!
//! Console output plus an append-only log file. Both layers share one
//! `EnvFilter` taken from `RUST_LOG`, falling back to the configured filter.

use podium_core::{ConfigError, LogConfig};
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Install the global subscriber. Call once, before any work starts.
pub fn init_logging(config: &LogConfig) -> Result<(), ConfigError> {
    if let Some(parent) = config.path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::Io {
            path: parent.display().to_string(),
            reason: e.to_string(),
        })?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.path)
        .map_err(|e| ConfigError::Io {
            path: config.path.display().to_string(),
            reason: e.to_string(),
        })?;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.filter));

    let file_layer = fmt::layer()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(false);
    let file_out = if config.json {
        file_layer.json().boxed()
    } else {
        file_layer.boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(false))
        .with(file_out)
        .try_init()
        .map_err(|e| ConfigError::InvalidValue {
            field: "log".to_string(),
            value: config.path.display().to_string(),
            reason: format!("Failed to init subscriber: {}", e),
        })?;

    tracing::info!(
        log_path = %config.path.display(),
        filter = %config.filter,
        json = config.json,
        "Logging initialized"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    // The global subscriber can be installed once per process, so this is
    // the only test that calls `init_logging`.
    #[test]
    fn test_json_logging_writes_parseable_lines() {
        let dir = TempDir::new().unwrap();
        let config = LogConfig {
            path: dir.path().join("logs").join("ingest.log"),
            filter: "info".to_string(),
            json: true,
        };

        init_logging(&config).unwrap();

        let contents = std::fs::read_to_string(&config.path).unwrap();
        let first = contents.lines().next().expect("log file has a line");
        let line: serde_json::Value = serde_json::from_str(first).unwrap();
        assert_eq!(line["fields"]["message"], "Logging initialized");
        assert_eq!(line["level"], "INFO");

        assert!(matches!(
            init_logging(&config),
            Err(ConfigError::InvalidValue { .. })
        ));
    }
}
