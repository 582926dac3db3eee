use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};
use thiserror::Error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub const LOG_ENV: &str = "ZONESIM_LOG";
pub const LOG_FILE: &str = "zone.log";

static INSTALLED: OnceLock<PathBuf> = OnceLock::new();

#[derive(Debug, Error)]
pub enum LogError {
    #[error("log directory create failed for {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("open log {path} failed: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Installs the global subscriber: stderr plus `<root>/log/zone.log`.
/// Later calls return the path chosen by the first one.
pub fn init(root: &Path) -> Result<PathBuf, LogError> {
    if let Some(path) = INSTALLED.get() {
        return Ok(path.clone());
    }
    let log_dir = root.join("log");
    std::fs::create_dir_all(&log_dir).map_err(|source| LogError::CreateDir {
        path: log_dir.clone(),
        source,
    })?;
    let path = log_dir.join(LOG_FILE);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|source| LogError::Open {
            path: path.clone(),
            source,
        })?;

    let installed = tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        .try_init();
    if installed.is_err() {
        // Someone else owns the global subscriber; keep theirs.
        tracing::debug!(path = %path.display(), "subscriber already installed");
    }
    Ok(INSTALLED.get_or_init(|| path).clone())
}

/// Stderr-only subscriber for tools without a data root.
pub fn init_stderr() {
    let _ = tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_creates_log_file_and_is_idempotent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let first = init(dir.path()).expect("init");
        assert!(first.exists());
        let other = tempfile::tempdir().expect("tempdir");
        let second = init(other.path()).expect("second init");
        assert_eq!(first, second);
    }
}
