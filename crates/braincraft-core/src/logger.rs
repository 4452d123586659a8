//! Context-tagged logging on top of `tracing`.
//!
//! A [`Logger`] is handed to each component at construction. Outside
//! development mode only errors are emitted; the mode is decided once at
//! process start and captured in [`LogSettings`].

use std::error::Error;
use std::fmt;
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Verbosity flag resolved once when the process starts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LogSettings {
    pub development: bool,
}

impl LogSettings {
    pub fn development() -> Self {
        Self { development: true }
    }

    pub fn production() -> Self {
        Self { development: false }
    }

    fn default_filter(&self) -> &'static str {
        if self.development {
            "debug"
        } else {
            "error"
        }
    }
}

#[derive(Debug, Clone)]
pub struct Logger {
    context: String,
    settings: LogSettings,
}

impl Logger {
    pub fn new(context: impl Into<String>, settings: LogSettings) -> Self {
        Self {
            context: context.into(),
            settings,
        }
    }

    /// A logger that keeps only errors, for tests and defaults
    pub fn quiet(context: impl Into<String>) -> Self {
        Self::new(context, LogSettings::production())
    }

    /// Derive a logger for a sub-component sharing the same settings
    pub fn child(&self, context: impl Into<String>) -> Self {
        Self::new(context, self.settings)
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn settings(&self) -> LogSettings {
        self.settings
    }

    pub fn enabled(&self, level: LogLevel) -> bool {
        level == LogLevel::Error || self.settings.development
    }

    pub fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message);
    }

    pub fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    pub fn warn(&self, message: &str) {
        self.log(LogLevel::Warn, message);
    }

    pub fn error(&self, message: &str) {
        self.log(LogLevel::Error, message);
    }

    /// Log an error together with its source chain
    pub fn error_with(&self, message: &str, err: &dyn Error) {
        let chain = error_chain(err);
        tracing::error!(context = %self.context, error = %chain, "{}", message);
    }

    pub fn log(&self, level: LogLevel, message: &str) {
        if !self.enabled(level) {
            return;
        }
        let context = self.context.as_str();
        match level {
            LogLevel::Debug => tracing::debug!(context, "{}", message),
            LogLevel::Info => tracing::info!(context, "{}", message),
            LogLevel::Warn => tracing::warn!(context, "{}", message),
            LogLevel::Error => tracing::error!(context, "{}", message),
        }
    }
}

fn error_chain(err: &dyn Error) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}

/// Install the global subscriber writing to `path`.
///
/// The terminal UI owns stderr, so events go to a file. `RUST_LOG` overrides
/// the level picked from `settings`.
pub fn init_tracing(settings: LogSettings, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(path)?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.default_filter()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install tracing subscriber: {}", e))?;

    Ok(())
}
