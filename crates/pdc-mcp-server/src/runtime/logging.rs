//! Logging config and setup
//!
//! Logs go to stderr unless a directory is configured, in which case they are
//! written to rolling files there. Stdout is never used since the stdio
//! transport speaks MCP over it.

mod defaults;
mod log_rotation_kind;
mod parsers;

use std::path::{Path, PathBuf};

use log_rotation_kind::LogRotationKind;
use schemars::JsonSchema;
use serde::Deserialize;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::RollingFileAppender;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use super::Config;

/// Logging related options
#[derive(Debug, Deserialize, JsonSchema)]
pub struct Logging {
    /// The log level to use for tracing
    #[serde(
        default = "defaults::level",
        deserialize_with = "parsers::from_str"
    )]
    #[schemars(schema_with = "super::schemas::level")]
    pub level: Level,

    /// The output directory to use for log files
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Log file rotation period to use when log file path provided
    /// [default: Hourly]
    #[serde(default = "defaults::rotation")]
    pub rotation: LogRotationKind,
}

impl Default for Logging {
    fn default() -> Self {
        Self {
            level: defaults::level(),
            path: None,
            rotation: defaults::rotation(),
        }
    }
}

impl Logging {
    fn env_filter(&self) -> Result<EnvFilter, anyhow::Error> {
        let mut env_filter = EnvFilter::from_default_env().add_directive(self.level.into());

        if self.level == Level::INFO {
            env_filter = env_filter.add_directive("rmcp=warn".parse()?);
        }
        Ok(env_filter)
    }
}

/// Sets up either file logging or stderr logging depending on provided configuration options
pub fn setup_logging(config: &Config) -> Result<Option<WorkerGuard>, anyhow::Error> {
    let env_filter = config.logging.env_filter()?;

    if let Some(path) = &config.logging.path {
        setup_file_logging(path, env_filter, config.logging.rotation.clone())
    } else {
        setup_stderr_logging(env_filter)
    }
}

/// Sets up rolling file appender logging but falls back to stderr logging on failure
fn setup_file_logging(
    log_path: &Path,
    env_filter: EnvFilter,
    log_rotation: LogRotationKind,
) -> Result<Option<WorkerGuard>, anyhow::Error> {
    if std::fs::create_dir_all(log_path).is_err() {
        eprintln!("Could not build log path - falling back to stderr");
        return setup_stderr_logging(env_filter);
    }

    let (non_blocking_writer, guard) = match RollingFileAppender::builder()
        .rotation(log_rotation.into())
        .filename_prefix("pdc_mcp_server")
        .filename_suffix("log")
        .build(log_path)
    {
        Ok(appender) => tracing_appender::non_blocking(appender),
        Err(_error) => {
            eprintln!("Log file setup failed - falling back to stderr");
            return setup_stderr_logging(env_filter);
        }
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking_writer)
                .with_ansi(false)
                .with_target(false),
        )
        .init();

    Ok(Some(guard))
}

/// Sets up stderr logging
fn setup_stderr_logging(env_filter: EnvFilter) -> Result<Option<WorkerGuard>, anyhow::Error> {
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true)
                .with_target(false),
        )
        .init();

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_info_on_stderr() {
        let logging = Logging::default();

        assert_eq!(logging.level, Level::INFO);
        assert!(logging.path.is_none());
        assert!(matches!(logging.rotation, LogRotationKind::Hourly));
    }

    #[test]
    fn parses_level_and_rotation() {
        let logging: Logging = serde_json::from_str(
            r#"{ "level": "warn", "path": "/var/log/pdc", "rotation": "never" }"#,
        )
        .unwrap();

        assert_eq!(logging.level, Level::WARN);
        assert_eq!(logging.path, Some(PathBuf::from("/var/log/pdc")));
        assert!(matches!(logging.rotation, LogRotationKind::Never));
    }

    #[test]
    fn rejects_unknown_level() {
        assert!(serde_json::from_str::<Logging>(r#"{ "level": "loud" }"#).is_err());
    }

    #[test]
    fn env_filter_quiets_protocol_logs_at_info() {
        let filter = Logging::default().env_filter().unwrap().to_string();
        assert!(filter.contains("rmcp=warn"));

        let debug = Logging {
            level: Level::DEBUG,
            ..Logging::default()
        };
        assert!(!debug.env_filter().unwrap().to_string().contains("rmcp=warn"));
    }
}
