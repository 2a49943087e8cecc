//! Logging setup
//!
//! Structured logging through `tracing`, with a choice of human or JSON output.

use serde::{Deserialize, Serialize};
use std::{io, str::FromStr, sync::Arc};
use tracing_subscriber::{
    filter::Directive,
    fmt::{self, writer::BoxMakeWriter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Output format (json, pretty, compact)
    pub format: LogFormat,
    /// Append to this file instead of stdout
    pub log_file_path: Option<String>,
    /// Custom filter directives
    pub filter_directives: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
    Compact,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" => Ok(LogFormat::Pretty),
            "compact" => Ok(LogFormat::Compact),
            other => Err(format!(
                "unknown log format '{}', expected json, pretty or compact",
                other
            )),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            log_file_path: None,
            filter_directives: vec!["tower_http=info".to_string()],
        }
    }
}

impl LoggingConfig {
    /// Same configuration at a different level
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    /// Same configuration with a different output format
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Append to `path` instead of writing to stdout
    pub fn with_log_file(mut self, path: impl Into<String>) -> Self {
        self.log_file_path = Some(path.into());
        self
    }
}

/// Initialize the logging system
///
/// When `RUST_LOG` is set it replaces both `config.level` and
/// `config.filter_directives`.
pub fn init_logging(
    config: &LoggingConfig,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = build_filter(config, std::env::var(EnvFilter::DEFAULT_ENV).ok().as_deref())?;

    let writer = match &config.log_file_path {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            BoxMakeWriter::new(Arc::new(file))
        }
        None => BoxMakeWriter::new(io::stdout),
    };
    // Escape codes only make sense on a terminal.
    let ansi = config.log_file_path.is_none();

    let registry = tracing_subscriber::registry().with(filter);

    match config.format {
        LogFormat::Json => {
            let fmt_layer = fmt::layer().json().with_writer(writer);
            registry.with(fmt_layer).try_init()?;
        }
        LogFormat::Pretty => {
            let fmt_layer = fmt::layer().pretty().with_ansi(ansi).with_writer(writer);
            registry.with(fmt_layer).try_init()?;
        }
        LogFormat::Compact => {
            let fmt_layer = fmt::layer().compact().with_ansi(ansi).with_writer(writer);
            registry.with(fmt_layer).try_init()?;
        }
    }

    Ok(())
}

/// Filter from `RUST_LOG` if given, otherwise level plus default directives.
///
/// The default directives are parsed either way so a bad one is always
/// reported.
fn build_filter(
    config: &LoggingConfig,
    rust_log: Option<&str>,
) -> Result<EnvFilter, Box<dyn std::error::Error + Send + Sync>> {
    let directives = config
        .filter_directives
        .iter()
        .map(|directive| directive.parse::<Directive>())
        .collect::<Result<Vec<_>, _>>()?;

    if let Some(rust_log) = rust_log.filter(|value| !value.trim().is_empty()) {
        return Ok(EnvFilter::try_new(rust_log)?);
    }

    Ok(directives
        .into_iter()
        .fold(EnvFilter::try_new(&config.level)?, EnvFilter::add_directive))
}
