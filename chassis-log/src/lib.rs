//! Logging configuration for Chassis applications.
//!
//! A thin layer over `tracing-subscriber`: pick a level, format, and output,
//! then call [`LogConfig::init`] once at startup. Defaults to JSON on STDOUT.
//!
//! ```no_run
//! use chassis_log::{LogConfig, LogFormat, LogLevel};
//!
//! let _guard = LogConfig::new()
//!     .level(LogLevel::Debug)
//!     .format(LogFormat::Pretty)
//!     .init();
//!
//! tracing::info!("logging initialized");
//! ```

use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

// Re-export the macros callers actually use.
pub use tracing::{debug, error, info, trace, warn};

/// Minimum level of events that reach the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Convert to a `tracing` level.
    pub fn to_tracing_level(&self) -> Level {
        match self {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }

    /// Directive string for `EnvFilter`.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }

    /// Parse a level name, case-insensitive.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "trace" => Some(LogLevel::Trace),
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" | "warning" => Some(LogLevel::Warn),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }
}

/// Output format for log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Structured JSON, machine-readable (default).
    Json,
    /// Plain single-line text.
    Plain,
    /// Colored, multi-line format for development.
    Pretty,
    /// Minimal single-line format.
    Compact,
}

/// Where log events are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogOutput {
    /// Write to STDOUT (default).
    Stdout,
    /// Write to STDERR.
    Stderr,
    /// Write to rotating files in a directory.
    File {
        directory: String,
        prefix: String,
        rotation: Rotation,
    },
}

/// File rotation strategy for [`LogOutput::File`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotation {
    Hourly,
    Daily,
    Never,
}

impl Rotation {
    fn appender(&self, directory: &str, prefix: &str) -> tracing_appender::rolling::RollingFileAppender {
        match self {
            Rotation::Hourly => tracing_appender::rolling::hourly(directory, prefix),
            Rotation::Daily => tracing_appender::rolling::daily(directory, prefix),
            Rotation::Never => tracing_appender::rolling::never(directory, prefix),
        }
    }
}

/// Logging configuration builder.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Level filter.
    pub level: LogLevel,
    /// Output format.
    pub format: LogFormat,
    /// Output destination.
    pub output: LogOutput,
    /// Include the event target (module path).
    pub targets: bool,
    /// Include thread ids.
    pub thread_ids: bool,
    /// Custom filter directives; overrides `level` when set.
    pub env_filter: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Json,
            output: LogOutput::Stdout,
            targets: true,
            thread_ids: false,
            env_filter: None,
        }
    }
}

impl LogConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn output(mut self, output: LogOutput) -> Self {
        self.output = output;
        self
    }

    pub fn with_targets(mut self, enable: bool) -> Self {
        self.targets = enable;
        self
    }

    pub fn with_thread_ids(mut self, enable: bool) -> Self {
        self.thread_ids = enable;
        self
    }

    /// Custom filter directives, e.g. `"chassis=debug,hyper=info"`.
    pub fn with_env_filter(mut self, filter: impl Into<String>) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    /// Install the global subscriber.
    ///
    /// Returns a guard that flushes buffered output when dropped; keep it
    /// alive for the lifetime of the program. Returns `None` when a global
    /// subscriber was already installed (common in tests).
    pub fn init(self) -> Option<WorkerGuard> {
        let filter = match &self.env_filter {
            Some(directives) => EnvFilter::new(directives),
            None => EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(self.level.as_str())),
        };

        let (writer, guard) = match &self.output {
            LogOutput::Stdout => tracing_appender::non_blocking(std::io::stdout()),
            LogOutput::Stderr => tracing_appender::non_blocking(std::io::stderr()),
            LogOutput::File {
                directory,
                prefix,
                rotation,
            } => tracing_appender::non_blocking(rotation.appender(directory, prefix)),
        };

        let layer = fmt::layer()
            .with_writer(writer)
            .with_target(self.targets)
            .with_thread_ids(self.thread_ids);

        let installed = match self.format {
            LogFormat::Json => tracing_subscriber::registry()
                .with(filter)
                .with(layer.json())
                .try_init()
                .is_ok(),
            LogFormat::Plain => tracing_subscriber::registry()
                .with(filter)
                .with(layer.with_ansi(false))
                .try_init()
                .is_ok(),
            LogFormat::Pretty => tracing_subscriber::registry()
                .with(filter)
                .with(layer.pretty())
                .try_init()
                .is_ok(),
            LogFormat::Compact => tracing_subscriber::registry()
                .with(filter)
                .with(layer.compact())
                .try_init()
                .is_ok(),
        };

        installed.then_some(guard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_parse() {
        assert_eq!(LogLevel::parse("debug"), Some(LogLevel::Debug));
        assert_eq!(LogLevel::parse("WARNING"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::parse("nope"), None);
    }

    #[test]
    fn test_level_directive() {
        assert_eq!(LogLevel::Trace.as_str(), "trace");
        assert_eq!(LogLevel::Error.to_tracing_level(), Level::ERROR);
    }

    #[test]
    fn test_config_builder() {
        let config = LogConfig::new()
            .level(LogLevel::Debug)
            .format(LogFormat::Compact)
            .output(LogOutput::Stderr)
            .with_thread_ids(true)
            .with_env_filter("chassis=trace");

        assert_eq!(config.level, LogLevel::Debug);
        assert_eq!(config.format, LogFormat::Compact);
        assert_eq!(config.output, LogOutput::Stderr);
        assert!(config.thread_ids);
        assert_eq!(config.env_filter.as_deref(), Some("chassis=trace"));
    }

    #[test]
    fn test_default_is_json_stdout() {
        let config = LogConfig::default();
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.output, LogOutput::Stdout);
    }
}
