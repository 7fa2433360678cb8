//! Logging configuration using tracing

use std::path::PathBuf;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::error::{Error, Result};

/// Environment variable controlling the log filter
pub const LOG_ENV: &str = "DEVMON_LOG";

/// Filter used when `DEVMON_LOG` is unset or invalid
pub const DEFAULT_FILTER: &str = "devmon=info,warn";

/// Log file name inside the log directory
pub const LOG_FILE_NAME: &str = "devmon.log";

/// Where log output goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    /// Daily-rotated `devmon.log` in the given directory
    File(PathBuf),
    /// Standard error, for interactive use
    Stderr,
}

/// Initialize the logging subsystem
///
/// Log level is controlled by the `DEVMON_LOG` environment variable.
///
/// # Examples
/// ```bash
/// DEVMON_LOG=debug devmon replay scenario.toml
/// DEVMON_LOG=devmon_app=trace devmon replay scenario.toml
/// ```
pub fn init(target: LogTarget) -> Result<()> {
    match target {
        LogTarget::File(log_dir) => {
            std::fs::create_dir_all(&log_dir)?;
            let file_appender = RollingFileAppender::new(Rotation::DAILY, &log_dir, LOG_FILE_NAME);

            tracing_subscriber::registry()
                .with(env_filter())
                .with(
                    fmt::layer()
                        .with_writer(file_appender)
                        .with_ansi(false)
                        .with_target(true)
                        .with_file(true)
                        .with_line_number(true)
                        .with_timer(fmt::time::ChronoLocal::new(
                            "%Y-%m-%d %H:%M:%S%.3f".to_string(),
                        )),
                )
                .try_init()
                .map_err(|e| Error::logging(e.to_string()))?;

            tracing::info!("devmon starting, log directory: {}", log_dir.display());
        }
        LogTarget::Stderr => {
            tracing_subscriber::registry()
                .with(env_filter())
                .with(
                    fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_target(true),
                )
                .try_init()
                .map_err(|e| Error::logging(e.to_string()))?;
        }
    }

    Ok(())
}

/// Build the filter from `DEVMON_LOG`, falling back to [`DEFAULT_FILTER`]
pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_env_filter_default() {
        std::env::remove_var(LOG_ENV);
        let filter = env_filter().to_string();
        assert!(filter.contains("devmon=info"));
    }

    #[test]
    #[serial]
    fn test_env_filter_override() {
        std::env::set_var(LOG_ENV, "debug");
        let filter = env_filter().to_string();
        std::env::remove_var(LOG_ENV);
        assert_eq!(filter, "debug");
    }
}
