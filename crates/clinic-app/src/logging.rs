//! Logging and tracing setup
//!
//! Pretty console output for development, daily-rolled JSON files for bug
//! reports, and `RUST_LOG` taking precedence over the configured filter.

use std::path::PathBuf;

use clinic_settings::LoggingSettings;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

const DEVELOPMENT_FILTER: &str = "info,clinic_app=debug,clinic_core=debug,clinic_driver_sqlite=debug,clinic_schema=debug,clinic_query=debug,clinic_forms=debug";
const PRODUCTION_FILTER: &str = "warn,clinic_app=info,clinic_driver_sqlite=info,clinic_schema=info,clinic_query=info";

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub log_dir: PathBuf,

    /// JSON output to daily-rolled files
    pub enable_json_logs: bool,

    pub enable_console_logs: bool,

    /// File and line of each event
    pub include_location: bool,

    /// Span open/close events
    pub enable_spans: bool,

    /// Filter used when `RUST_LOG` is unset
    pub default_filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: clinic_settings::log_dir(),
            enable_json_logs: false,
            enable_console_logs: true,
            include_location: cfg!(debug_assertions),
            enable_spans: cfg!(debug_assertions),
            default_filter: DEVELOPMENT_FILTER.to_string(),
        }
    }
}

impl LoggingConfig {
    /// Quiet console, JSON files kept for bug reports
    pub fn production() -> Self {
        Self {
            log_dir: clinic_settings::log_dir(),
            enable_json_logs: true,
            enable_console_logs: false,
            include_location: false,
            enable_spans: false,
            default_filter: PRODUCTION_FILTER.to_string(),
        }
    }

    pub fn development() -> Self {
        Self::default()
    }

    /// Console only, no files
    pub fn testing() -> Self {
        Self {
            log_dir: std::env::temp_dir().join("clinic-tests"),
            enable_json_logs: false,
            enable_console_logs: true,
            include_location: true,
            enable_spans: true,
            default_filter: "debug".to_string(),
        }
    }

    /// The build profile's preset with the user's toggles applied
    pub fn from_settings(settings: &LoggingSettings) -> Self {
        let preset = if cfg!(debug_assertions) {
            Self::development()
        } else {
            Self::production()
        };
        Self {
            log_dir: settings.log_dir.clone(),
            enable_json_logs: settings.enable_json_logs,
            enable_console_logs: settings.enable_console_logs,
            default_filter: settings
                .filter
                .clone()
                .unwrap_or_else(|| preset.default_filter.clone()),
            ..preset
        }
    }
}

/// Install the global subscriber.
///
/// Fails if a subscriber is already installed.
pub fn init(config: LoggingConfig) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_filter));

    let span_events = if config.enable_spans {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let mut layers = Vec::new();

    if config.enable_console_logs {
        let console_layer = fmt::layer()
            .with_target(true)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_span_events(span_events.clone())
            .with_ansi(true)
            .pretty()
            .with_filter(env_filter.clone())
            .boxed();
        layers.push(console_layer);
    }

    if config.enable_json_logs {
        std::fs::create_dir_all(&config.log_dir)?;
        let file_appender = tracing_appender::rolling::daily(&config.log_dir, "clinic.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        // the writer thread must outlive every event of the process
        std::mem::forget(guard);

        let json_layer = fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .with_span_events(span_events)
            .with_ansi(false)
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_writer(non_blocking)
            .with_filter(env_filter)
            .boxed();
        layers.push(json_layer);
    }

    tracing_subscriber::registry().with(layers).try_init()?;

    tracing::info!(
        log_dir = %config.log_dir.display(),
        json_enabled = config.enable_json_logs,
        console_enabled = config.enable_console_logs,
        "Logging system initialized"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_production_config() {
        let config = LoggingConfig::production();
        assert!(!config.enable_console_logs);
        assert!(config.enable_json_logs);
        assert!(!config.include_location);
    }

    #[test]
    fn test_testing_config_writes_no_files() {
        let config = LoggingConfig::testing();
        assert!(config.enable_console_logs);
        assert!(!config.enable_json_logs);
    }

    #[test]
    fn test_settings_override_preset() {
        let settings = LoggingSettings {
            enable_console_logs: false,
            enable_json_logs: true,
            filter: Some("clinic_query=trace".into()),
            log_dir: PathBuf::from("/var/log/clinic"),
        };
        let config = LoggingConfig::from_settings(&settings);
        assert!(!config.enable_console_logs);
        assert!(config.enable_json_logs);
        assert_eq!(config.default_filter, "clinic_query=trace");
        assert_eq!(config.log_dir, PathBuf::from("/var/log/clinic"));

        let config = LoggingConfig::from_settings(&LoggingSettings {
            filter: None,
            ..settings
        });
        assert!(!config.default_filter.is_empty());
    }
}
