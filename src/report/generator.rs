//! HTML report generation.
//!
//! Renders one coach's week of feedback through `templates/report.html`.
//! Every interpolated value is HTML-escaped by the template engine, so free
//! text from members can't inject markup.

use crate::error::RenderError;
use crate::models::{CoachReport, FeedbackRow, MAX_RATING};
use askama::Template;
use chrono::{DateTime, Utc};

/// Subject prefix for test-mode runs.
pub const TEST_SUBJECT_PREFIX: &str = "[TEST] ";

#[derive(Template)]
#[template(path = "report.html")]
struct ReportTemplate<'a> {
    coach_name: &'a str,
    week_start: String,
    total_responses: usize,
    avg_rating: Option<f64>,
    max_rating: u32,
    feedback_rows: &'a [FeedbackRow],
    generated_at: String,
}

/// Render the HTML body for one coach.
pub fn render_report(report: &CoachReport, generated_at: DateTime<Utc>) -> Result<String, RenderError> {
    let template = ReportTemplate {
        coach_name: &report.coach_name,
        week_start: report.week_start.long_label(),
        total_responses: report.total_responses(),
        avg_rating: report.average_rating(),
        max_rating: MAX_RATING,
        feedback_rows: &report.rows,
        generated_at: generated_at.format("%Y-%m-%d %H:%M UTC").to_string(),
    };

    Ok(template.render()?)
}

/// Subject line for a coach's report email.
pub fn subject_line(report: &CoachReport, test_mode: bool) -> String {
    let subject = format!(
        "Your Weekly Feedback Summary — Week of {}",
        report.week_start.short_label()
    );

    if test_mode {
        format!("{}{}", TEST_SUBJECT_PREFIX, subject)
    } else {
        subject
    }
}
