//! Structured logging setup.
//!
//! The engine logs through `tracing` macros only. Binaries (and tests that
//! want output) install a subscriber once with [`init_logging`]:
//!
//! | Variable              | Default | Meaning                                   |
//! |-----------------------|---------|-------------------------------------------|
//! | `BRRTMVC_LOG_LEVEL`   | `info`  | `trace`, `debug`, `info`, `warn`, `error` |
//! | `BRRTMVC_LOG_FORMAT`  | `json`  | `json` or `pretty`                        |
//! | `BRRTMVC_LOG_TARGETS` | unset   | extra filter directives, comma separated  |
//!
//! `RUST_LOG`, when set, takes precedence over `BRRTMVC_LOG_LEVEL`. Target
//! directives that do not parse are skipped and reported as a warning once
//! the subscriber is up.

use std::env;

use tracing::{warn, Level};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::error::ApplicationError;

/// Log format: JSON for production, pretty-print for development
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl LogFormat {
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "pretty" => LogFormat::Pretty,
            _ => LogFormat::Json,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Log level: trace/debug/info/warn/error
    pub log_level: String,
    pub format: LogFormat,
    /// Extra directives such as `brrtmvc::router=debug`
    pub target_filter: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            format: LogFormat::Json,
            target_filter: None,
        }
    }
}

impl LogConfig {
    /// Parse configuration from environment variables with defaults
    pub fn from_env() -> Self {
        Self {
            log_level: env::var("BRRTMVC_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: LogFormat::parse(
                &env::var("BRRTMVC_LOG_FORMAT").unwrap_or_else(|_| "json".to_string()),
            ),
            target_filter: env::var("BRRTMVC_LOG_TARGETS")
                .ok()
                .filter(|s| !s.trim().is_empty()),
        }
    }

    /// Development settings: debug level, pretty output.
    #[must_use]
    pub fn default_dev() -> Self {
        Self {
            log_level: "debug".to_string(),
            format: LogFormat::Pretty,
            target_filter: None,
        }
    }

    #[must_use]
    pub fn level(&self) -> Level {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        }
    }

    /// The filter [`init_logging`] installs, and the `target_filter`
    /// directives it had to drop because they do not parse.
    pub fn env_filter(&self) -> (EnvFilter, Vec<String>) {
        let mut filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.level().as_str()));
        let mut rejected = Vec::new();

        if let Some(targets) = &self.target_filter {
            for directive in targets.split(',').map(str::trim).filter(|d| !d.is_empty()) {
                match directive.parse() {
                    Ok(parsed) => filter = filter.add_directive(parsed),
                    Err(_) => rejected.push(directive.to_string()),
                }
            }
        }
        (filter, rejected)
    }
}

/// Install the global subscriber described by `config`. Output goes to
/// stderr, leaving stdout to the CLI reports.
///
/// A second call fails with [`ApplicationError::Logging`]; the first
/// subscriber stays in place.
///
/// ```no_run
/// use brrtmvc::logging::{init_logging, LogConfig};
///
/// init_logging(&LogConfig::from_env()).expect("logging");
/// ```
pub fn init_logging(config: &LogConfig) -> Result<(), ApplicationError> {
    let fmt_layer = match config.format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer()
            .pretty()
            .with_target(true)
            .with_thread_ids(false)
            .with_writer(std::io::stderr)
            .boxed(),
    };

    let (filter, rejected) = config.env_filter();
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| ApplicationError::Logging(e.to_string()))?;

    for directive in &rejected {
        warn!(directive = %directive, "Invalid log filter directive ignored");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parse() {
        assert_eq!(LogFormat::parse("json"), LogFormat::Json);
        assert_eq!(LogFormat::parse("PRETTY"), LogFormat::Pretty);
        assert_eq!(LogFormat::parse("invalid"), LogFormat::Json);
    }

    #[test]
    fn test_log_config_default() {
        let config = LogConfig::default();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.format, LogFormat::Json);
        assert!(config.target_filter.is_none());
    }

    #[test]
    fn test_log_config_default_dev() {
        let config = LogConfig::default_dev();
        assert_eq!(config.level(), Level::DEBUG);
        assert_eq!(config.format, LogFormat::Pretty);
    }

    #[test]
    fn test_level_parse_falls_back_to_info() {
        let config = LogConfig {
            log_level: "loud".to_string(),
            ..LogConfig::default()
        };
        assert_eq!(config.level(), Level::INFO);
    }

    #[test]
    fn test_invalid_target_directives_are_collected() {
        let config = LogConfig {
            target_filter: Some("brrtmvc::router=debug, not a directive==, ,".to_string()),
            ..LogConfig::default()
        };
        let (_filter, rejected) = config.env_filter();
        assert_eq!(rejected, vec!["not a directive==".to_string()]);

        let (_filter, rejected) = LogConfig::default().env_filter();
        assert!(rejected.is_empty());
    }

    #[test]
    fn test_second_init_fails() {
        let config = LogConfig {
            target_filter: Some("brrtmvc::router=debug, not a directive==".to_string()),
            ..LogConfig::default()
        };
        // Another test in this binary may have installed one already.
        init_logging(&config).ok();
        let second = init_logging(&config);
        assert!(matches!(second, Err(ApplicationError::Logging(_))));
    }
}
