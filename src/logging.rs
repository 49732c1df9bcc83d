//! Logging setup.
//!
//! Every run logs to two sinks: stdout, and a size-bounded log file that is
//! rotated once it fills up. The dispatcher is built explicitly so callers
//! (and tests) decide where it is installed.

use crate::error::LogError;
use file_rotate::compression::Compression;
use file_rotate::suffix::AppendCount;
use file_rotate::{ContentLimit, FileRotate};
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::Dispatch;
use tracing_subscriber::filter::{EnvFilter, LevelFilter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, Registry};

/// Log file rotates once it reaches this many bytes.
pub const DEFAULT_MAX_BYTES: usize = 1024 * 1024;

/// Number of rotated files kept next to the live one.
pub const DEFAULT_BACKUPS: usize = 1;

/// Where and how much to log.
#[derive(Debug, Clone)]
pub struct LogSettings {
    pub file: PathBuf,
    pub level: tracing::Level,
    pub max_bytes: usize,
    pub backups: usize,
}

impl LogSettings {
    pub fn new(file: PathBuf, level: tracing::Level) -> Self {
        Self {
            file,
            level,
            max_bytes: DEFAULT_MAX_BYTES,
            backups: DEFAULT_BACKUPS,
        }
    }
}

/// Build a dispatcher writing to stdout and the rotating log file.
///
/// `RUST_LOG` directives, when set, refine the level chosen on the command line.
/// The log file's directory is created if it doesn't exist yet.
pub fn build_dispatch(settings: &LogSettings) -> Result<Dispatch, LogError> {
    if let Some(parent) = settings.file.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| LogError::Directory {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let rotating = FileRotate::new(
        &settings.file,
        AppendCount::new(settings.backups),
        ContentLimit::Bytes(settings.max_bytes),
        Compression::None,
        #[cfg(unix)]
        None,
    );

    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(settings.level).into())
        .from_env_lossy();

    let stdout_layer = fmt::layer().with_writer(std::io::stdout);
    let file_layer = fmt::layer()
        .with_ansi(false)
        .with_writer(Mutex::new(rotating));

    let subscriber = Registry::default()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer);

    Ok(Dispatch::new(subscriber))
}
