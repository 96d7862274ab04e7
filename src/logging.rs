//! Logging System
//!
//! Structured logging on top of `tracing`. Level, format and destination come from
//! [`LoggingConfig`], which the binary assembles from defaults, the config file, the
//! environment and CLI flags (in increasing precedence).

use crate::error::PipelineError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

pub const LOG_ENV: &str = "DDXGEN_LOG";
pub const LOG_FORMAT_ENV: &str = "DDXGEN_LOG_FORMAT";
pub const LOG_OUTPUT_ENV: &str = "DDXGEN_LOG_OUTPUT";
pub const LOG_MODULES_ENV: &str = "DDXGEN_LOG_MODULES";

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Disable all log output when false
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Log level or filter directive: trace, debug, info, warn, error, off
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format: json, text
    #[serde(default = "default_format")]
    pub format: String,

    /// Output destination: stdout, stderr, file
    #[serde(default = "default_output")]
    pub output: String,

    /// Log file path when output is "file"; defaults to the user data directory
    #[serde(default)]
    pub file: Option<PathBuf>,

    /// Enable colored output (text format, terminal destinations only)
    #[serde(default = "default_true")]
    pub color: bool,

    /// Module-specific log levels
    #[serde(default)]
    pub modules: BTreeMap<String, String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_format() -> String {
    "text".to_string()
}

fn default_output() -> String {
    "stderr".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: default_log_level(),
            format: default_format(),
            output: default_output(),
            file: None,
            color: true,
            modules: BTreeMap::new(),
        }
    }
}

impl LoggingConfig {
    /// Overlay the `DDXGEN_LOG*` environment variables.
    pub fn apply_env(&mut self) -> Result<(), PipelineError> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), PipelineError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(level) = lookup(LOG_ENV).filter(|v| !v.trim().is_empty()) {
            self.level = level.trim().to_string();
        }
        if let Some(format) = lookup(LOG_FORMAT_ENV).filter(|v| !v.trim().is_empty()) {
            self.format = format.trim().to_string();
        }
        if let Some(output) = lookup(LOG_OUTPUT_ENV).filter(|v| !v.trim().is_empty()) {
            self.output = output.trim().to_string();
        }
        if let Some(modules) = lookup(LOG_MODULES_ENV) {
            for (module, level) in parse_module_levels(&modules)? {
                self.modules.insert(module, level);
            }
        }
        Ok(())
    }

    /// Resolved log file path.
    pub fn log_file(&self) -> PathBuf {
        self.file.clone().unwrap_or_else(default_log_file)
    }
}

/// `$XDG_DATA_HOME/ddxgen/ddxgen.log`, or `ddxgen.log` when no home directory is known.
pub fn default_log_file() -> PathBuf {
    directories::ProjectDirs::from("", "", "ddxgen")
        .map(|dirs| dirs.data_dir().join("ddxgen.log"))
        .unwrap_or_else(|| PathBuf::from("ddxgen.log"))
}

/// Parse `module=level,module=level`.
fn parse_module_levels(spec: &str) -> Result<Vec<(String, String)>, PipelineError> {
    spec.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| match part.split_once('=') {
            Some((module, level)) if !module.trim().is_empty() && !level.trim().is_empty() => {
                Ok((module.trim().to_string(), level.trim().to_string()))
            }
            _ => Err(PipelineError::Config(format!(
                "Invalid module log level '{}' (expected module=level)",
                part
            ))),
        })
        .collect()
}

/// Output destination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputDestination {
    Stdout,
    Stderr,
    File,
}

fn parse_output_destination(output: &str) -> Result<OutputDestination, PipelineError> {
    match output {
        "stdout" => Ok(OutputDestination::Stdout),
        "stderr" => Ok(OutputDestination::Stderr),
        "file" => Ok(OutputDestination::File),
        _ => Err(PipelineError::Config(format!(
            "Invalid log output: {} (must be 'stdout', 'stderr', or 'file')",
            output
        ))),
    }
}

fn validate_format(format: &str) -> Result<(), PipelineError> {
    if format != "json" && format != "text" {
        return Err(PipelineError::Config(format!(
            "Invalid log format: {} (must be 'json' or 'text')",
            format
        )));
    }
    Ok(())
}

/// Build the event filter from the level and module directives.
fn build_env_filter(config: &LoggingConfig) -> Result<EnvFilter, PipelineError> {
    if config.level == "off" {
        return Ok(EnvFilter::new("off"));
    }

    let mut filter = EnvFilter::try_new(&config.level).map_err(|e| {
        PipelineError::Config(format!("Invalid log level '{}': {}", config.level, e))
    })?;
    for (module, module_level) in &config.modules {
        let directive = format!("{}={}", module, module_level);
        filter = filter.add_directive(
            directive
                .parse()
                .map_err(|e| PipelineError::Config(format!("Invalid log directive: {}", e)))?,
        );
    }
    Ok(filter)
}

fn open_log_file(path: &PathBuf) -> Result<std::fs::File, PipelineError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| {
                PipelineError::Config(format!("Failed to create log directory: {}", e))
            })?;
        }
    }
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| {
            PipelineError::Config(format!("Failed to open log file {}: {}", path.display(), e))
        })
}

/// Initialize the global subscriber.
///
/// With `enabled = false` nothing is installed and every event is dropped.
pub fn init_logging(config: &LoggingConfig) -> Result<(), PipelineError> {
    if !config.enabled {
        return Ok(());
    }

    let filter = build_env_filter(config)?;
    validate_format(&config.format)?;
    let destination = parse_output_destination(&config.output)?;

    let (writer, ansi) = match destination {
        OutputDestination::Stdout => (BoxMakeWriter::new(std::io::stdout), config.color),
        OutputDestination::Stderr => (BoxMakeWriter::new(std::io::stderr), config.color),
        OutputDestination::File => {
            let file = open_log_file(&config.log_file())?;
            (BoxMakeWriter::new(std::sync::Mutex::new(file)), false)
        }
    };

    let subscriber = Registry::default().with(filter);
    let installed = if config.format == "json" {
        subscriber
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_writer(writer),
            )
            .try_init()
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_ansi(ansi)
                    .with_writer(writer),
            )
            .try_init()
    };

    installed.map_err(|e| PipelineError::Config(format!("Failed to initialize logging: {}", e)))
}
