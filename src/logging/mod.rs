//! Logging configuration and initialization
//!
//! Centralized `tracing` setup for the harness. Output is either
//! human-readable or JSON, and the filter is resolved in this order:
//!
//! 1. `RUST_LOG` (standard tracing filter, e.g. "debug,reqwest=info")
//! 2. `ROCFORGE_BENCH_LOG_LEVEL` (error, warn, info, debug, trace)
//! 3. the level passed in [`LoggingConfig`] (default `info`)
//!
//! `ROCFORGE_BENCH_LOG_FORMAT` selects "human" or "json" when the caller
//! does not pick a format explicitly.
//!
//! Scoped subscribers (trace sessions) build their console output with
//! [`scoped_console_layer`] so they log the same way as the global one.

use std::str::FromStr;

use clap::ValueEnum;
use once_cell::sync::OnceCell;
use thiserror::Error;
use tracing::Subscriber;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, registry::LookupSpan, util::SubscriberInitExt, EnvFilter, Layer,
};

/// Configuration of the installed global subscriber
static INSTALLED: OnceCell<LoggingConfig> = OnceCell::new();

/// Environment variable for log level override
pub const LOG_LEVEL_ENV: &str = "ROCFORGE_BENCH_LOG_LEVEL";

/// Environment variable for log format (json/human)
pub const LOG_FORMAT_ENV: &str = "ROCFORGE_BENCH_LOG_FORMAT";

/// Errors that can occur during logging initialization
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log level: {0}")]
    InvalidLogLevel(String),

    #[error("invalid log format: {0}")]
    InvalidLogFormat(String),

    #[error("failed to install subscriber: {0}")]
    InitFailed(String),
}

/// Log level enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Convert to EnvFilter string
    pub fn as_filter_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl FromStr for LogLevel {
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            other => Err(LoggingError::InvalidLogLevel(other.to_string())),
        }
    }
}

/// Log format enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    /// Human-readable colored output
    #[default]
    Human,
    /// JSON structured output
    Json,
}

impl FromStr for LogFormat {
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "human" | "pretty" | "console" => Ok(LogFormat::Human),
            "json" | "structured" => Ok(LogFormat::Json),
            other => Err(LoggingError::InvalidLogFormat(other.to_string())),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Default)]
pub struct LoggingConfig {
    pub level: LogLevel,
    /// `None` defers to `ROCFORGE_BENCH_LOG_FORMAT`
    pub format: Option<LogFormat>,
    /// Include file/line in log lines
    pub with_file_info: bool,
}

impl LoggingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = Some(format);
        self
    }

    pub fn with_file_info(mut self, with_file_info: bool) -> Self {
        self.with_file_info = with_file_info;
        self
    }

    /// Format after applying the environment override
    pub fn resolved_format(&self) -> LogFormat {
        self.format.unwrap_or_else(|| {
            std::env::var(LOG_FORMAT_ENV)
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_default()
        })
    }
}

/// Initialize logging with the given configuration.
///
/// Idempotent: only the first call installs a subscriber. Later calls
/// return `Ok(())` without touching the global state.
pub fn init_with_config(config: &LoggingConfig) -> Result<(), LoggingError> {
    let mut result = Ok(());
    INSTALLED.get_or_init(|| {
        result = install(config);
        config.clone()
    });
    result
}

/// Initialize logging from environment variables only
pub fn init_logging_default() {
    init_with_config(&LoggingConfig::new()).ok();
}

/// Configuration the global subscriber was installed with
pub fn installed_config() -> Option<&'static LoggingConfig> {
    INSTALLED.get()
}

fn install(config: &LoggingConfig) -> Result<(), LoggingError> {
    let env_filter = build_env_filter(config.level)?;
    tracing_subscriber::registry()
        .with(console_layer(config, env_filter))
        .try_init()
        .map_err(|e| LoggingError::InitFailed(e.to_string()))
}

fn console_layer<S>(config: &LoggingConfig, filter: EnvFilter) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a> + 'static,
{
    match config.resolved_format() {
        LogFormat::Json => fmt::layer()
            .json()
            .with_target(false)
            .with_file(config.with_file_info)
            .with_line_number(config.with_file_info)
            .with_filter(filter)
            .boxed(),
        LogFormat::Human => fmt::layer()
            .with_target(true)
            .with_file(config.with_file_info)
            .with_line_number(config.with_file_info)
            .with_filter(filter)
            .boxed(),
    }
}

/// Build the environment filter for log level.
fn build_env_filter(default_level: LogLevel) -> Result<EnvFilter, LoggingError> {
    if let Ok(rust_log) = std::env::var("RUST_LOG") {
        return EnvFilter::try_new(rust_log)
            .map_err(|e| LoggingError::InvalidLogLevel(e.to_string()));
    }

    if let Ok(level) = std::env::var(LOG_LEVEL_ENV) {
        if let Ok(level) = level.parse::<LogLevel>() {
            return Ok(EnvFilter::new(level.as_filter_str()));
        }
    }

    Ok(EnvFilter::new(default_level.as_filter_str()))
}

/// Console output for a scoped subscriber, formatted like `config`.
///
/// Uses the same filter precedence as the global subscriber. An unparsable
/// `RUST_LOG` falls back to the configured level.
pub fn scoped_console_layer<S>(config: &LoggingConfig) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a> + 'static,
{
    let filter = build_env_filter(config.level)
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_filter_str()));
    console_layer(config, filter)
}
