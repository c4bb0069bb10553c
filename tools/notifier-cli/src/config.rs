//! CLI configuration management
//!
//! Sources, lowest precedence first: built-in defaults, an optional TOML file,
//! `NOTIFIER_*` environment variables, then command-line flags.

use anyhow::{anyhow, Context, Result};
use price_notifier::NotifierConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Complete CLI configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Engine configuration
    pub notifier: NotifierConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (compact, pretty, json)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "warn".to_string(), format: "compact".to_string() }
    }
}

/// Flag values that override every other source
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub log_level: Option<String>,
    pub log_format: Option<String>,
    pub workers: Option<usize>,
    pub delivery_timeout_ms: Option<u64>,
    pub no_delivery_timeout: bool,
}

/// Load configuration from an optional file, the environment and flags
pub fn load_config(path: Option<&Path>, overrides: &Overrides) -> Result<CliConfig> {
    let mut config = match path {
        Some(path) => load_from_file(path)?,
        None => CliConfig::default(),
    };

    load_from_env(&mut config, |key| std::env::var(key).ok())?;
    apply_overrides(&mut config, overrides);
    validate_config(&config)?;

    Ok(config)
}

/// Load configuration from a TOML file
fn load_from_file(path: &Path) -> Result<CliConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&raw).with_context(|| format!("Invalid config file: {}", path.display()))
}

pub fn parse_config(raw: &str) -> Result<CliConfig> {
    Ok(toml::from_str(raw)?)
}

/// Apply `NOTIFIER_*` variables; `lookup` abstracts the environment for tests
fn load_from_env<F>(config: &mut CliConfig, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(level) = lookup("NOTIFIER_LOG_LEVEL") {
        config.logging.level = level;
    }

    if let Some(format) = lookup("NOTIFIER_LOG_FORMAT") {
        config.logging.format = format;
    }

    if let Some(workers) = lookup("NOTIFIER_WORKERS") {
        config.notifier.dispatch.worker_threads = workers
            .parse()
            .with_context(|| format!("NOTIFIER_WORKERS is not a number: {workers}"))?;
    }

    if let Some(timeout) = lookup("NOTIFIER_DELIVERY_TIMEOUT_MS") {
        config.notifier.dispatch.delivery_timeout_ms = match timeout.as_str() {
            "none" | "off" => None,
            ms => Some(ms.parse().with_context(|| {
                format!("NOTIFIER_DELIVERY_TIMEOUT_MS is not a number: {timeout}")
            })?),
        };
    }

    Ok(())
}

fn apply_overrides(config: &mut CliConfig, overrides: &Overrides) {
    if let Some(level) = &overrides.log_level {
        config.logging.level = level.clone();
    }
    if let Some(format) = &overrides.log_format {
        config.logging.format = format.clone();
    }
    if let Some(workers) = overrides.workers {
        config.notifier.dispatch.worker_threads = workers;
    }
    if let Some(ms) = overrides.delivery_timeout_ms {
        config.notifier.dispatch.delivery_timeout_ms = Some(ms);
    }
    if overrides.no_delivery_timeout {
        config.notifier.dispatch.delivery_timeout_ms = None;
    }
}

/// Validate configuration
fn validate_config(config: &CliConfig) -> Result<()> {
    match config.logging.level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => return Err(anyhow!("Invalid log level: {}", config.logging.level)),
    }

    match config.logging.format.as_str() {
        "compact" | "pretty" | "json" => {}
        _ => return Err(anyhow!("Invalid log format: {}", config.logging.format)),
    }

    config.notifier.validate().context("Invalid notifier configuration")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = parse_config(
            r#"
            [notifier.dispatch]
            worker_threads = 8

            [logging]
            format = "json"
            "#,
        )
        .unwrap();

        assert_eq!(config.notifier.dispatch.worker_threads, 8);
        assert_eq!(config.notifier.dispatch.delivery_timeout_ms, Some(5000));
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.logging.level, "warn");
        assert!(config.notifier.shutdown.drain_on_shutdown);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[notifier.pricing]\nallow_non_positive = true").unwrap();

        let config = load_config(Some(file.path()), &Overrides::default()).unwrap();
        assert!(config.notifier.pricing.allow_non_positive);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let result = load_config(Some(Path::new("/nonexistent/notifier.toml")), &Overrides::default());
        assert!(result.is_err());
    }

    #[test]
    fn test_env_overrides_file() {
        let mut config = parse_config("[logging]\nlevel = \"error\"").unwrap();
        load_from_env(
            &mut config,
            env(&[
                ("NOTIFIER_LOG_LEVEL", "debug"),
                ("NOTIFIER_WORKERS", "2"),
                ("NOTIFIER_DELIVERY_TIMEOUT_MS", "off"),
            ]),
        )
        .unwrap();

        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.notifier.dispatch.worker_threads, 2);
        assert_eq!(config.notifier.dispatch.delivery_timeout_ms, None);
    }

    #[test]
    fn test_env_rejects_garbage_numbers() {
        let mut config = CliConfig::default();
        assert!(load_from_env(&mut config, env(&[("NOTIFIER_WORKERS", "many")])).is_err());
        assert!(load_from_env(&mut config, env(&[("NOTIFIER_DELIVERY_TIMEOUT_MS", "soon")])).is_err());
    }

    #[test]
    fn test_flags_override_everything() {
        let mut config = CliConfig::default();
        load_from_env(&mut config, env(&[("NOTIFIER_WORKERS", "2")])).unwrap();
        apply_overrides(
            &mut config,
            &Overrides { workers: Some(6), delivery_timeout_ms: Some(250), ..Default::default() },
        );

        assert_eq!(config.notifier.dispatch.worker_threads, 6);
        assert_eq!(config.notifier.dispatch.delivery_timeout_ms, Some(250));

        apply_overrides(&mut config, &Overrides { no_delivery_timeout: true, ..Default::default() });
        assert_eq!(config.notifier.dispatch.delivery_timeout_ms, None);
    }

    #[test]
    fn test_validation() {
        assert!(validate_config(&CliConfig::default()).is_ok());

        let mut config = CliConfig::default();
        config.logging.level = "loud".to_string();
        assert!(validate_config(&config).is_err());

        let mut config = CliConfig::default();
        config.logging.format = "xml".to_string();
        assert!(validate_config(&config).is_err());

        let mut config = CliConfig::default();
        config.notifier.dispatch.worker_threads = 0;
        assert!(validate_config(&config).is_err());
    }
}
