use anyhow::{Context, Result};
use chrono::Local;
use std::fmt::Write as _;
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use tracing::Level;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;

/// Local wall-clock timestamps, `2025-01-31 14:05:09`
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalTimestamp;

impl FormatTime for LocalTimestamp {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        write!(w, "[{}]", Local::now().format("%Y-%m-%d %H:%M:%S"))
    }
}

/// Parse a level name from config, defaulting to INFO
pub fn parse_level(name: &str) -> Level {
    name.trim().parse::<Level>().unwrap_or(Level::INFO)
}

/// Install the global subscriber, appending to `log_path` (created if needed)
pub fn init_file_logging(log_path: &Path, level: Level) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .with_context(|| format!("Failed to open log file: {}", log_path.display()))?;

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_timer(LocalTimestamp)
        .with_ansi(false)
        .with_target(false)
        .with_writer(Mutex::new(file))
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install log subscriber: {}", e))
}

/// Fallback when the log file can't be opened: warnings and errors to stderr
pub fn init_stderr_logging(level: Level) {
    let _ = tracing_subscriber::fmt()
        .with_max_level(level.min(Level::WARN))
        .with_timer(LocalTimestamp)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
