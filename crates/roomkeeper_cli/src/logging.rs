//! Logging initialisation.

use roomkeeper_core::{LogLevel, LogSection};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::EnvFilter;

/// Resolves the effective level: `--verbose` wins over the config file.
pub fn level(verbose: bool, log: &LogSection) -> LogLevel {
    if verbose {
        LogLevel::Debug
    } else {
        log.log_level()
    }
}

/// Splits the configured log file into its directory and base name.
///
/// The daily appender writes `<name>.<date>` next to the configured path.
pub fn file_parts(path: &Path) -> Result<(PathBuf, String), Box<dyn std::error::Error>> {
    let name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| format!("log file {} has no file name", path.display()))?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    Ok((dir, name.to_string()))
}

/// Installs the global subscriber, writing to a daily-rotated `log.file`
/// when set.
///
/// The returned guard flushes the file writer on drop and must be held
/// for the life of the process.
pub fn init(
    verbose: bool,
    log: &LogSection,
) -> Result<Option<WorkerGuard>, Box<dyn std::error::Error>> {
    let filter = EnvFilter::new(level(verbose, log).as_directive());

    match &log.file {
        Some(path) => {
            let (dir, name) = file_parts(path)?;
            std::fs::create_dir_all(&dir)?;
            let (writer, guard) = non_blocking(rolling::daily(dir, name));
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(writer)
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
            Ok(None)
        }
    }
}
