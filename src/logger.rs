//! Diagnostic logging for cloudcfg
//!
//! Diagnostics go to stderr at `warn` and above by default. With debug logging
//! enabled (config or `--debug`) everything from `debug` up is also appended
//! to ~/.cloudcfg/cloudcfg.log. `RUST_LOG` overrides the filter.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, registry, EnvFilter};

const LOG_FILE_NAME: &str = "cloudcfg.log";

/// Keeps the file writer flushing until dropped
pub struct LogGuard {
    _file: Option<WorkerGuard>,
    pub log_path: Option<PathBuf>,
}

fn filter(default: &str) -> EnvFilter {
    filter_from(std::env::var(EnvFilter::DEFAULT_ENV).ok().as_deref(), default)
}

/// `RUST_LOG`-style directives when given and valid, `default` otherwise
fn filter_from(directives: Option<&str>, default: &str) -> EnvFilter {
    directives
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(default))
}

/// Initialize logging
///
/// `log_dir` is where the debug log file goes when `debug_enabled` is set.
pub fn init_logging(debug_enabled: bool, log_dir: &Path) -> Result<LogGuard> {
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(filter("cloudcfg=warn"));

    if !debug_enabled {
        registry()
            .with(stderr_layer)
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to set tracing subscriber: {}", e))?;
        return Ok(LogGuard {
            _file: None,
            log_path: None,
        });
    }

    fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create log directory: {}", log_dir.display()))?;

    let appender = tracing_appender::rolling::never(log_dir, LOG_FILE_NAME);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let file_layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_filter(filter("cloudcfg=debug"));

    registry()
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to set tracing subscriber: {}", e))?;

    Ok(LogGuard {
        _file: Some(guard),
        log_path: Some(log_path_in(log_dir)),
    })
}

/// Path of the debug log inside `log_dir`
pub fn log_path_in(log_dir: &Path) -> PathBuf {
    log_dir.join(LOG_FILE_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_path_in() {
        assert_eq!(
            log_path_in(Path::new("/home/u/.cloudcfg")),
            PathBuf::from("/home/u/.cloudcfg/cloudcfg.log")
        );
    }

    #[test]
    fn test_filter_falls_back_to_default() {
        assert_eq!(filter_from(None, "cloudcfg=debug").to_string(), "cloudcfg=debug");
    }

    #[test]
    fn test_filter_prefers_directives() {
        assert_eq!(
            filter_from(Some("cloudcfg=trace"), "cloudcfg=warn").to_string(),
            "cloudcfg=trace"
        );
    }
}
