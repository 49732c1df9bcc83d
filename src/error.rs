//! Error types for each stage of the reporting run.
//!
//! Every stage has its own enum so the orchestrator can tell a fatal
//! warehouse failure apart from a per-coach render or mail failure.

use std::path::PathBuf;
use thiserror::Error;

/// Failure to assemble the runtime configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("required environment variable '{0}' is not set")]
    MissingVar(&'static str),

    #[error("environment variable '{name}' is invalid: {reason}")]
    InvalidVar { name: &'static str, reason: String },

    #[error("failed to load config file {}: {reason}", path.display())]
    File { path: PathBuf, reason: String },
}

/// The log file can't be set up.
#[derive(Debug, Error)]
pub enum LogError {
    #[error("failed to create log directory {}: {source}", path.display())]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Misuse of the command-line flags.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UsageError {
    #[error("--test requires both --coach and --to (e.g. --test --coach 'Jane Smith' --to you@example.com)")]
    TestModeIncomplete,

    #[error("cannot use both --verbose and --quiet")]
    VerboseAndQuiet,
}

/// Anything that goes wrong talking to the warehouse.
#[derive(Debug, Error)]
pub enum WarehouseError {
    #[error("invalid private key: {0}")]
    Key(String),

    #[error("failed to sign authentication token: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("warehouse request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("warehouse returned {status} (code {code}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    #[error("warehouse session is already closed")]
    SessionClosed,

    #[error("unexpected value in column '{column}': {reason}")]
    Decode { column: String, reason: String },
}

/// Rendering a coach's report failed.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("template rendering failed: {0}")]
    Template(#[from] askama::Error),
}

/// Building or delivering an email failed.
#[derive(Debug, Error)]
pub enum MailError {
    #[error("invalid email address '{address}': {reason}")]
    Address { address: String, reason: String },

    #[error("failed to build message: {0}")]
    Build(#[from] lettre::error::Error),

    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    #[error("failed to write preview {}: {source}", path.display())]
    Preview {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
