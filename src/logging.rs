//! Log setup for the module binary.
//!
//! Every run appends to a log file. Warnings are echoed to stderr when it is a
//! terminal; stdout carries nothing but the module result.

use anyhow::{Context, Result};
use log::LevelFilter;
use simplelog::{
    ColorChoice, CombinedLogger, Config, ConfigBuilder, SharedLogger, TermLogger, TerminalMode,
    WriteLogger,
};
use std::fs::{self, File, OpenOptions};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

const DEFAULT_MAX_SIZE: u64 = 10 * 1024 * 1024;

/// Where run logs go and how much of them to keep.
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub path: PathBuf,
    /// Level written to the file. The terminal only ever sees warnings and errors.
    pub level: LevelFilter,
    /// A file above this many bytes is set aside at startup. 0 keeps it forever.
    pub max_size: u64,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("passgroup.log"),
            level: LevelFilter::Info,
            max_size: DEFAULT_MAX_SIZE,
        }
    }
}

impl LogConfig {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            ..Default::default()
        }
    }

    pub fn with_level(mut self, level: LevelFilter) -> Self {
        self.level = level;
        self
    }

    pub fn with_max_size(mut self, max_size: u64) -> Self {
        self.max_size = max_size;
        self
    }
}

/// Installs the global logger. Fails if one is already installed or the log
/// file cannot be opened.
pub fn init_logging(config: &LogConfig) -> Result<()> {
    let file = open_log_file(config)?;

    let mut loggers: Vec<Box<dyn SharedLogger>> =
        vec![WriteLogger::new(config.level, file_config(), file)];
    if std::io::stderr().is_terminal() {
        loggers.push(TermLogger::new(
            LevelFilter::Warn,
            terminal_config(),
            TerminalMode::Stderr,
            ColorChoice::Auto,
        ));
    }
    CombinedLogger::init(loggers).context("Failed to initialize logger")?;

    log::debug!(
        "Logging to {} at level {:?}",
        config.path.display(),
        config.level
    );
    Ok(())
}

fn open_log_file(config: &LogConfig) -> Result<File> {
    if let Some(parent) = config.path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create log directory {}", parent.display()))?;
    }
    if config.max_size > 0 {
        let size = fs::metadata(&config.path).map(|m| m.len()).unwrap_or(0);
        if size > config.max_size {
            rotate_log(&config.path)?;
        }
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.path)
        .with_context(|| format!("Failed to open log file {}", config.path.display()))
}

fn file_config() -> Config {
    ConfigBuilder::new()
        .set_time_format_rfc3339()
        .set_target_level(LevelFilter::Off)
        .set_location_level(LevelFilter::Debug)
        .build()
}

fn terminal_config() -> Config {
    ConfigBuilder::new()
        .set_time_level(LevelFilter::Off)
        .set_target_level(LevelFilter::Off)
        .set_location_level(LevelFilter::Off)
        .build()
}

/// Moves `passgroup.log` aside as `passgroup.log.<timestamp>`.
fn rotate_log(path: &Path) -> Result<PathBuf> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("passgroup.log");
    let rotated = path.with_file_name(format!(
        "{}.{}",
        name,
        chrono::Local::now().format("%Y%m%d_%H%M%S")
    ));
    fs::rename(path, &rotated)
        .with_context(|| format!("Failed to rotate log file {}", path.display()))?;
    Ok(rotated)
}

/// Evaluates `$body` and logs how long it took at debug level.
#[macro_export]
macro_rules! log_timed {
    ($op:expr, $body:expr) => {{
        let start = std::time::Instant::now();
        let result = $body;
        log::debug!("{} completed in {:?}", $op, start.elapsed());
        result
    }};
}
