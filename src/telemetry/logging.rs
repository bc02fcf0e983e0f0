//! Logging setup
//!
//! Library code logs with `tracing`; `init_logging` installs the subscriber,
//! which also collects `log` records from wgpu and winit. Console output is
//! compact by default, JSON on request, and can be mirrored to a file.

use std::path::PathBuf;

use tracing::Subscriber;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*, Layer};

/// Filter variable, checked before `RUST_LOG`
pub const LOG_ENV: &str = "SPHERE_LOG";

/// Set to `json` for JSON console output
pub const LOG_FORMAT_ENV: &str = "SPHERE_LOG_FORMAT";

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Write to stderr (default: true)
    pub console_enabled: bool,
    /// Also write to `file_path` (default: false)
    pub file_enabled: bool,
    /// Log file (default: `immersive_sphere.log` in the working directory)
    pub file_path: Option<PathBuf>,
    /// JSON console output (default: false)
    pub json_format: bool,
    /// Filter used when neither env variable is set (default: "info")
    pub default_level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            console_enabled: true,
            file_enabled: false,
            file_path: None,
            json_format: false,
            default_level: "info".to_string(),
        }
    }
}

impl LogConfig {
    /// Whether JSON output is selected, by env or config
    pub fn use_json(&self) -> bool {
        Self::json_from(std::env::var(LOG_FORMAT_ENV).ok().as_deref(), self.json_format)
    }

    fn json_from(value: Option<&str>, fallback: bool) -> bool {
        value.map(|v| v.eq_ignore_ascii_case("json")).unwrap_or(fallback)
    }

    fn log_path(&self) -> PathBuf {
        self.file_path
            .clone()
            .unwrap_or_else(|| PathBuf::from("immersive_sphere.log"))
    }
}

/// Initialize the global subscriber.
///
/// Keep the returned guard alive for the whole program so the file writer
/// flushes.
///
/// ```no_run
/// use immersive_sphere::telemetry::{init_logging, LogConfig};
///
/// let _guard = init_logging(&LogConfig::default()).expect("Failed to initialize logging");
/// ```
pub fn init_logging(config: &LogConfig) -> Result<Option<WorkerGuard>, Box<dyn std::error::Error + Send + Sync>> {
    let env_filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_env("RUST_LOG"))
        .unwrap_or_else(|_| EnvFilter::new(&config.default_level));
    let use_json = config.use_json();

    let subscriber = tracing_subscriber::registry().with(env_filter);
    let mut file_guard = None;

    if config.file_enabled {
        let log_path = config.log_path();
        let file = std::fs::File::create(&log_path)?;
        let (non_blocking, guard) = tracing_appender::non_blocking(file);
        file_guard = Some(guard);

        let file_layer = fmt::layer()
            .with_writer(non_blocking)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_ansi(false);

        subscriber
            .with(file_layer)
            .with(console_layer(config.console_enabled, use_json))
            .try_init()?;
        eprintln!("Logging to file: {}", log_path.display());
    } else {
        subscriber
            .with(console_layer(config.console_enabled, use_json))
            .try_init()?;
    }

    tracing::info!(
        target: "immersive_sphere",
        version = env!("CARGO_PKG_VERSION"),
        json_format = use_json,
        file_enabled = config.file_enabled,
        "Logging initialized"
    );

    Ok(file_guard)
}

/// Compact or JSON stderr output, or nothing when disabled
fn console_layer<S>(enabled: bool, json: bool) -> Option<Box<dyn Layer<S> + Send + Sync>>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    if !enabled {
        return None;
    }
    let layer = if json {
        fmt::layer()
            .json()
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .boxed()
    } else {
        fmt::layer().with_target(true).compact().boxed()
    };
    Some(layer)
}

pub use tracing_appender::non_blocking::WorkerGuard as LogGuard;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_config_default() {
        let config = LogConfig::default();
        assert!(config.console_enabled);
        assert!(!config.file_enabled);
        assert!(!config.json_format);
        assert_eq!(config.default_level, "info");
        assert_eq!(config.log_path(), PathBuf::from("immersive_sphere.log"));
    }

    #[test]
    fn test_json_selection() {
        assert!(LogConfig::json_from(Some("JSON"), false));
        assert!(!LogConfig::json_from(Some("pretty"), true));
        assert!(LogConfig::json_from(None, true));
        assert!(!LogConfig::json_from(None, false));
    }
}
