//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::error::UsageError;
use clap::Parser;
use std::path::PathBuf;

/// coach-feedback - weekly feedback reports for coaches
///
/// Pulls consented customer feedback for a week from the warehouse, builds an
/// HTML summary per coach, and emails each coach their own report.
///
/// Examples:
///   coach-feedback
///   coach-feedback --test --coach "Jane Smith" --to you@example.com
///   coach-feedback --dry-run --output-dir ./previews
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Test mode: query the current week and send to a single override address
    #[arg(long)]
    pub test: bool,

    /// (Test mode) Coach name to pull the report for (case-insensitive)
    #[arg(long, value_name = "NAME")]
    pub coach: Option<String>,

    /// (Test mode) Email address to send the report to instead of the real coach
    #[arg(long, value_name = "EMAIL")]
    pub to: Option<String>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .coach-feedback.toml in the current directory.
    /// Secrets are always read from the environment.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log file (rotated at 1 MiB, one backup kept)
    #[arg(
        long,
        default_value = "status.log",
        value_name = "FILE",
        env = "COACH_FEEDBACK_LOG_FILE"
    )]
    pub log_file: PathBuf,

    /// Render reports to --output-dir instead of emailing them
    #[arg(long)]
    pub dry_run: bool,

    /// Directory dry-run reports are written to
    #[arg(long, default_value = "reports", value_name = "DIR")]
    pub output_dir: PathBuf,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (errors only)
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), UsageError> {
        if self.verbose && self.quiet {
            return Err(UsageError::VerboseAndQuiet);
        }

        if self.test {
            let coach = self.coach.as_deref().map(str::trim).unwrap_or("");
            let to = self.to.as_deref().map(str::trim).unwrap_or("");
            if coach.is_empty() || to.is_empty() {
                return Err(UsageError::TestModeIncomplete);
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
