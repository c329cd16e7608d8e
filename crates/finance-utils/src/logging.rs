//! Logging and tracing utilities

use anyhow::Context;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Options for [`init_tracing`]
#[derive(Debug, Clone)]
pub struct LogOptions {
    /// Default filter directive, used when `RUST_LOG` is unset
    pub level: String,
    /// Append log lines to this file as well as stdout
    pub file: Option<PathBuf>,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

impl From<&crate::Settings> for LogOptions {
    fn from(settings: &crate::Settings) -> Self {
        Self {
            level: settings.effective_level(),
            file: settings.log_file.clone(),
        }
    }
}

/// Map a level name such as `INFO` or `WARNING` onto a tracing directive
pub fn normalize_level(level: &str) -> String {
    match level.trim().to_ascii_lowercase().as_str() {
        "warning" => "warn".to_string(),
        "critical" | "fatal" => "error".to_string(),
        "" => "info".to_string(),
        other => other.to_string(),
    }
}

/// Initialize the tracing subscriber
///
/// Installs a stdout formatter and, when `options.file` is set, a second
/// formatter without ANSI colors that appends to that file.
pub fn init_tracing(options: &LogOptions) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(normalize_level(&options.level)))
        .context("invalid log filter")?;

    let file_layer = match &options.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Arc::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .try_init()
        .context("tracing subscriber already initialized")?;

    tracing::debug!(level = %options.level, file = ?options.file, "tracing initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_level() {
        assert_eq!(normalize_level("INFO"), "info");
        assert_eq!(normalize_level("WARNING"), "warn");
        assert_eq!(normalize_level("critical"), "error");
        assert_eq!(normalize_level(""), "info");
        assert_eq!(normalize_level("debug"), "debug");
    }

    #[test]
    fn test_options_from_settings() {
        let settings = crate::Settings {
            debug: true,
            log_file: None,
            ..Default::default()
        };
        let options = LogOptions::from(&settings);
        assert_eq!(options.level, "debug");
        assert!(options.file.is_none());
    }

    #[test]
    fn test_init_with_log_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.log");
        let options = LogOptions {
            level: "info".to_string(),
            file: Some(path.clone()),
        };

        // Another test in this process may already own the global subscriber
        let _ = init_tracing(&options);
        assert!(path.exists());
    }
}
