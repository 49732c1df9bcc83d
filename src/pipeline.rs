//! Run orchestration.
//!
//! One pass: fetch the week's feedback, release the warehouse session, then
//! render and deliver a report per coach. A coach whose report fails is
//! recorded and skipped; the rest still go out.

use crate::analysis::total_responses;
use crate::cli::Args;
use crate::error::{UsageError, WarehouseError};
use crate::mail::Mailer;
use crate::models::CoachReport;
use crate::report::{render_report, subject_line};
use crate::warehouse::FeedbackSource;
use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{debug, error, info};

/// Which week to report on and who receives the mail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunPlan {
    /// Last week's feedback, each coach gets their own report.
    Production,
    /// This week's feedback for one coach, all mail goes to `recipient`.
    Test { coach: String, recipient: String },
}

impl RunPlan {
    pub fn from_args(args: &Args) -> Result<Self, UsageError> {
        args.validate()?;

        if !args.test {
            return Ok(RunPlan::Production);
        }

        match (args.coach.as_deref(), args.to.as_deref()) {
            (Some(coach), Some(to)) => Ok(RunPlan::Test {
                coach: coach.trim().to_string(),
                recipient: to.trim().to_string(),
            }),
            _ => Err(UsageError::TestModeIncomplete),
        }
    }

    pub fn is_test(&self) -> bool {
        matches!(self, RunPlan::Test { .. })
    }

    /// Weeks relative to the current one.
    pub fn week_offset(&self) -> i32 {
        match self {
            RunPlan::Production => -1,
            RunPlan::Test { .. } => 0,
        }
    }

    pub fn coach_filter(&self) -> Option<&str> {
        match self {
            RunPlan::Production => None,
            RunPlan::Test { coach, .. } => Some(coach.as_str()),
        }
    }

    /// `(email, display name)` a coach's report is delivered to.
    pub fn recipient<'a>(&'a self, report: &'a CoachReport) -> (&'a str, &'a str) {
        match self {
            RunPlan::Production => (report.coach_email.as_str(), report.coach_name.as_str()),
            RunPlan::Test { recipient, .. } => (recipient.as_str(), recipient.as_str()),
        }
    }

    fn period_label(&self) -> String {
        match self {
            RunPlan::Production => "last week".to_string(),
            RunPlan::Test { coach, .. } => format!("this week for coach: {}", coach),
        }
    }
}

/// How a run ended, short of a fatal warehouse error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The query matched nothing; no mail was sent.
    NoFeedback,
    Completed { sent: usize, failed: Vec<String> },
}

impl RunOutcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            RunOutcome::Completed { failed, .. } if !failed.is_empty() => 1,
            _ => 0,
        }
    }
}

/// Execute one reporting run.
///
/// The source is always closed before this returns, including when fetching
/// fails. Warehouse errors are fatal and returned; per-coach failures are
/// logged and collected in the outcome.
pub async fn run<S, M>(plan: &RunPlan, source: &mut S, mailer: &M) -> Result<RunOutcome, WarehouseError>
where
    S: FeedbackSource + ?Sized,
    M: Mailer + ?Sized,
{
    if let RunPlan::Test { coach, recipient } = plan {
        info!("TEST MODE — coach: '{}', sending to: {}", coach, recipient);
    }

    let fetched = source
        .fetch_feedback(plan.week_offset(), plan.coach_filter())
        .await;
    source.close().await;
    let coaches = fetched?;

    if coaches.is_empty() {
        info!(
            "No consented feedback found for {}. No emails sent.",
            plan.period_label()
        );
        return Ok(RunOutcome::NoFeedback);
    }

    info!(
        "Preparing reports for {} coach(es) covering {} response(s).",
        coaches.len(),
        total_responses(&coaches)
    );
    debug!("Coaches: {:?}", coaches.coach_names());

    let mut sent = 0;
    let mut failed = Vec::new();

    for report in &coaches {
        match deliver(plan, report, mailer).await {
            Ok(()) => sent += 1,
            Err(e) => {
                error!(
                    "Failed to process/send report for {}: {:#}",
                    report.coach_name, e
                );
                failed.push(report.coach_name.clone());
            }
        }
    }

    if failed.is_empty() {
        info!("All done. Reports sent to {} coach(es).", sent);
    } else {
        error!("Finished with errors for coaches: {:?}", failed);
    }

    Ok(RunOutcome::Completed { sent, failed })
}

/// Render, address and send one coach's report.
async fn deliver<M>(plan: &RunPlan, report: &CoachReport, mailer: &M) -> Result<()>
where
    M: Mailer + ?Sized,
{
    let html = render_report(report, Utc::now())
        .with_context(|| format!("rendering report for {}", report.coach_name))?;
    let subject = subject_line(report, plan.is_test());
    let (to_email, to_name) = plan.recipient(report);

    mailer
        .send(to_email, to_name, &subject, &html)
        .await
        .with_context(|| format!("sending report to {}", to_email))?;

    Ok(())
}
