//! coach-feedback - weekly feedback reports for coaches
//!
//! Queries the warehouse for consented customer feedback from one week,
//! renders an HTML summary per coach, and emails each coach their report.
//!
//! Exit codes:
//!   0 - Success, or no feedback to send
//!   1 - Usage or configuration error, warehouse failure, or at least one
//!       coach whose report could not be delivered

mod analysis;
mod cli;
mod config;
mod error;
mod logging;
mod mail;
mod models;
mod pipeline;
mod report;
mod warehouse;

use anyhow::{Context, Result};
use cli::Args;
use config::Config;
use logging::LogSettings;
use mail::{PreviewMailer, SmtpMailer};
use pipeline::RunPlan;
use tracing::{debug, error, info};
use warehouse::SnowflakeSession;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Initialize logging
    let dispatch = match logging::build_dispatch(&LogSettings::new(
        args.log_file.clone(),
        args.log_level(),
    )) {
        Ok(dispatch) => dispatch,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };
    if let Err(e) = tracing::dispatcher::set_global_default(dispatch) {
        eprintln!("Error: failed to initialize logging: {}", e);
    }

    info!("coach-feedback v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    let exit_code = match run_job(args).await {
        Ok(code) => code,
        Err(e) => {
            error!("Run failed: {:#}", e);
            1
        }
    };

    std::process::exit(exit_code);
}

/// Run the reporting job. Returns the exit code.
async fn run_job(args: Args) -> Result<i32> {
    // Usage errors stop the run before anything touches the network
    let plan = match RunPlan::from_args(&args) {
        Ok(plan) => plan,
        Err(e) => {
            error!("{}", e);
            return Ok(1);
        }
    };

    let config = match Config::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return Ok(1);
        }
    };
    debug!("Configuration: {:?}", config);

    let mut session = SnowflakeSession::connect(&config.warehouse)
        .context("failed to open warehouse session")?;

    let outcome = if args.dry_run {
        info!(
            "Dry run: reports will be written to {}",
            args.output_dir.display()
        );
        let mailer = PreviewMailer::new(args.output_dir.clone());
        pipeline::run(&plan, &mut session, &mailer).await
    } else {
        let mailer = SmtpMailer::new(config.smtp.clone());
        pipeline::run(&plan, &mut session, &mailer).await
    }
    .context("failed to fetch feedback from the warehouse")?;

    Ok(outcome.exit_code())
}
