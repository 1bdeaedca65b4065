use std::fmt;
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Mutex;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// Outcome tag appended to every lifecycle log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    Error,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Ok => f.write_str("OK"),
            Status::Error => f.write_str("ERROR"),
        }
    }
}

/// Formats a log entry as `<message>, <status>`.
pub fn trace(message: impl fmt::Display, status: Status) -> String {
    format!("{message}, {status}")
}

#[derive(Debug, Error)]
#[error("unable to secure log {path}: {source}")]
pub struct LogError {
    path: String,
    source: std::io::Error,
}

pub fn open_log_file(path: impl AsRef<Path>) -> Result<File, LogError> {
    let path = path.as_ref();
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| LogError {
            path: path.display().to_string(),
            source,
        })
}

/// Routes all tracing output to the process log file for the lifetime of the
/// process. `RUST_LOG` overrides the default `info` filter.
pub fn init(path: impl AsRef<Path>) -> Result<(), LogError> {
    let file = open_log_file(path)?;
    tracing::subscriber::set_global_default(subscriber(file)).map_err(|err| LogError {
        path: "<global subscriber>".to_string(),
        source: std::io::Error::new(std::io::ErrorKind::Other, err),
    })
}

pub(crate) fn subscriber(file: File) -> impl tracing::Subscriber + Send + Sync + 'static {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_target(false)
        .with_writer(Mutex::new(file))
        .finish()
}
