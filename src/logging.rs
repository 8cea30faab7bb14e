//! Tracing subscriber setup.
//!
//! Filter precedence: an explicit override (the `--log-level` flag), then
//! `RUST_LOG`, then `logging.level` from the config file. A directive that
//! fails to parse falls back to `info`.

use crate::config::{LogOutput, LoggingConfig};
use crate::error::{Error, Result};
use std::fs::File;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

/// Pick the filter directive to use
fn resolve_directive(override_level: Option<&str>, env: Option<String>, configured: &str) -> String {
    override_level
        .map(str::to_string)
        .or(env)
        .filter(|d| !d.trim().is_empty())
        .unwrap_or_else(|| configured.to_string())
}

fn build_filter(directive: &str) -> EnvFilter {
    EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Truncate (or create) the log file, creating its directory first
fn open_log_file(path: &Path) -> std::io::Result<File> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    File::create(path)
}

/// Install the global tracing subscriber
///
/// With `output = "file"` each start replaces the previous log. If the file
/// cannot be opened the error goes to stderr and logging continues on stdout.
pub fn init_logging(config: &LoggingConfig, override_level: Option<&str>) -> Result<()> {
    let directive = resolve_directive(
        override_level,
        std::env::var("RUST_LOG").ok(),
        &config.level,
    );
    let filter = build_filter(&directive);

    let file = match config.output {
        LogOutput::Stdout => None,
        LogOutput::File => match open_log_file(&config.file_path) {
            Ok(file) => Some(file),
            Err(e) => {
                eprintln!(
                    "failed to open log file {}: {}; logging to stdout",
                    config.file_path.display(),
                    e
                );
                None
            }
        },
    };

    let installed = match file {
        Some(file) => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .try_init(),
        None => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .compact()
            .try_init(),
    };

    installed.map_err(|e| Error::Config {
        message: format!("failed to install log subscriber: {e}"),
        key: Some("logging".into()),
    })
}

#[cfg(test)]
// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn override_beats_environment_and_config() {
        let directive = resolve_directive(Some("debug"), Some("warn".into()), "info");
        assert_eq!(directive, "debug");
    }

    #[test]
    fn environment_beats_config() {
        let directive = resolve_directive(None, Some("torrent_dl=trace".into()), "info");
        assert_eq!(directive, "torrent_dl=trace");
    }

    #[test]
    fn config_level_used_when_nothing_else_set() {
        assert_eq!(resolve_directive(None, None, "warn"), "warn");
        assert_eq!(resolve_directive(None, Some("  ".into()), "warn"), "warn");
    }

    #[test]
    fn unparsable_directive_falls_back_to_info() {
        assert!(EnvFilter::try_new("torrent_dl=loudest").is_err());
        let filter = build_filter("torrent_dl=loudest");
        assert_eq!(filter.max_level_hint(), Some(tracing::level_filters::LevelFilter::INFO));
    }

    #[test]
    fn log_file_is_replaced_on_open() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("logs").join("server.log");

        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "previous run").unwrap();

        open_log_file(&path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    }

    #[test]
    fn log_directory_is_created() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("logs").join("server.log");

        open_log_file(&path).unwrap();
        assert!(path.exists());
    }
}
