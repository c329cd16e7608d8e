//! General application settings

use crate::env::{lookup_bool, lookup_non_empty, lookup_or, process_env};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Log file used when `LOG_FILE` is not set at all
pub const DEFAULT_LOG_FILE: &str = "finance_agent.log";

/// Data directory used when `DATA_DIR` is not set
pub const DEFAULT_DATA_DIR: &str = "./output";

/// Non-sensitive application settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Environment name (development, production, ...)
    pub environment: String,
    /// Debug mode
    pub debug: bool,
    /// Log level as written in the environment (e.g. `INFO`)
    pub log_level: String,
    /// Optional log file, in addition to stdout
    pub log_file: Option<PathBuf>,
    /// Directory that output files are written to by default
    pub data_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            debug: false,
            log_level: "INFO".to_string(),
            log_file: Some(PathBuf::from(DEFAULT_LOG_FILE)),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
        }
    }
}

impl Settings {
    /// Read settings from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(process_env)
    }

    /// Read settings through an arbitrary lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        // An explicitly empty LOG_FILE turns file logging off
        let log_file = match lookup("LOG_FILE") {
            None => Some(PathBuf::from(DEFAULT_LOG_FILE)),
            Some(path) if path.trim().is_empty() => None,
            Some(path) => Some(PathBuf::from(path.trim())),
        };

        Self {
            environment: lookup_or(&lookup, "ENVIRONMENT", "development"),
            debug: lookup_bool(&lookup, "DEBUG", false),
            log_level: lookup_or(&lookup, "LOG_LEVEL", "INFO"),
            log_file,
            data_dir: lookup_non_empty(&lookup, "DATA_DIR")
                .map_or_else(|| PathBuf::from(DEFAULT_DATA_DIR), PathBuf::from),
        }
    }

    /// Effective tracing level, with `DEBUG=true` forcing `debug`
    pub fn effective_level(&self) -> String {
        if self.debug {
            "debug".to_string()
        } else {
            crate::logging::normalize_level(&self.log_level)
        }
    }
}

/// Presence report for a set of credential variables
///
/// Only presence is recorded, never the values themselves.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct KeyReport {
    entries: Vec<(String, bool)>,
}

impl KeyReport {
    /// Check each key in `keys` against the process environment
    pub fn from_env(keys: &[&str]) -> Self {
        Self::from_lookup(keys, process_env)
    }

    /// Check each key in `keys` through an arbitrary lookup
    pub fn from_lookup<F>(keys: &[&str], lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let entries = keys
            .iter()
            .map(|key| ((*key).to_string(), lookup_non_empty(&lookup, key).is_some()))
            .collect();
        Self { entries }
    }

    /// All checked keys with their presence flag, in input order
    pub fn entries(&self) -> &[(String, bool)] {
        &self.entries
    }

    /// Keys that were not set
    pub fn missing(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(_, present)| !present)
            .map(|(key, _)| key.as_str())
            .collect()
    }

    /// Whether every checked key was set
    pub fn all_present(&self) -> bool {
        self.entries.iter().all(|(_, present)| *present)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |k: &str| vars.get(k).cloned()
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::from_lookup(lookup_from(&[]));
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.effective_level(), "info");
    }

    #[test]
    fn test_overrides() {
        let settings = Settings::from_lookup(lookup_from(&[
            ("ENVIRONMENT", "production"),
            ("LOG_LEVEL", "WARNING"),
            ("DATA_DIR", "/tmp/finance"),
            ("LOG_FILE", "app.log"),
        ]));

        assert_eq!(settings.environment, "production");
        assert_eq!(settings.effective_level(), "warn");
        assert_eq!(settings.data_dir, PathBuf::from("/tmp/finance"));
        assert_eq!(settings.log_file, Some(PathBuf::from("app.log")));
    }

    #[test]
    fn test_debug_forces_debug_level() {
        let settings =
            Settings::from_lookup(lookup_from(&[("DEBUG", "true"), ("LOG_LEVEL", "ERROR")]));
        assert!(settings.debug);
        assert_eq!(settings.effective_level(), "debug");
    }

    #[test]
    fn test_empty_log_file_disables_file_logging() {
        let settings = Settings::from_lookup(lookup_from(&[("LOG_FILE", "")]));
        assert_eq!(settings.log_file, None);
    }

    #[test]
    fn test_key_report() {
        let report = KeyReport::from_lookup(
            &["FINNHUB_API_KEY", "REDDIT_CLIENT_ID", "SEC_USER_AGENT"],
            lookup_from(&[("FINNHUB_API_KEY", "abc"), ("REDDIT_CLIENT_ID", " ")]),
        );

        assert!(!report.all_present());
        assert_eq!(report.missing(), vec!["REDDIT_CLIENT_ID", "SEC_USER_AGENT"]);
        assert_eq!(report.entries()[0], ("FINNHUB_API_KEY".to_string(), true));
    }

    #[test]
    fn test_key_report_serializes_presence_only() {
        let report =
            KeyReport::from_lookup(&["FINNHUB_API_KEY"], lookup_from(&[("FINNHUB_API_KEY", "secret")]));
        let json = serde_json::to_string(&report).unwrap();
        assert!(!json.contains("secret"));
    }
}
