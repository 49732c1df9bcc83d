//! Data models for the feedback reports.
//!
//! This module contains the typed rows decoded from the warehouse and the
//! per-coach aggregates the reports are rendered from.

use chrono::{NaiveDate, NaiveDateTime};
use std::collections::HashMap;
use std::fmt;

/// Highest value on the "my coach cares" rating scale.
pub const MAX_RATING: u32 = 5;

/// Start of the calendar week a submission belongs to.
///
/// The warehouse normally returns a timestamp; anything that can't be
/// recognized as one is kept verbatim so it can still be shown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WeekStart {
    Date(NaiveDate),
    Raw(String),
}

impl WeekStart {
    /// Interpret a warehouse value as a week start.
    pub fn parse(raw: &str) -> Self {
        match parse_timestamp(raw) {
            Some(ts) => WeekStart::Date(ts.date()),
            None => match NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d") {
                Ok(date) => WeekStart::Date(date),
                Err(_) => WeekStart::Raw(raw.to_string()),
            },
        }
    }

    /// Format with a `strftime` pattern, or return the raw text unchanged.
    pub fn format(&self, pattern: &str) -> String {
        match self {
            WeekStart::Date(date) => date.format(pattern).to_string(),
            WeekStart::Raw(raw) => raw.clone(),
        }
    }

    /// Long form used in the report body, e.g. "March 03, 2025".
    pub fn long_label(&self) -> String {
        self.format("%B %d, %Y")
    }

    /// Short form used in subject lines, e.g. "Mar 03, 2025".
    pub fn short_label(&self) -> String {
        self.format("%b %d, %Y")
    }
}

impl fmt::Display for WeekStart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.long_label())
    }
}

/// Parse a warehouse timestamp.
///
/// Accepts the SQL API's epoch form (`"1740960000.000000000"`) as well as
/// ISO-like text (`"2025-03-03 10:15:00.000"` or `"2025-03-03T10:15:00"`).
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();

    if let Some(ts) = parse_epoch(raw) {
        return Some(ts);
    }

    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|pattern| NaiveDateTime::parse_from_str(raw, pattern).ok())
}

fn parse_epoch(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, "%s%.f").ok()
}

/// One consented form submission, flattened by the feedback query.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedbackRow {
    pub submission_id: String,
    pub created_at: NaiveDateTime,
    pub week_start: WeekStart,
    pub customer_name: Option<String>,
    pub coach_name: String,
    pub coach_email: String,
    #[allow(dead_code)] // Always true: the query only returns consented rows
    pub consent_to_share: bool,
    /// `None` when the consent answer was not a "Yes".
    pub share_anonymized: Option<bool>,
    /// Suppressed whenever the member asked to be anonymized.
    pub member_name: Option<String>,
    pub rating: Option<u32>,
    pub comments: Option<String>,
    pub consent_raw: Option<String>,
    pub testimonial_consent_raw: Option<String>,
}

impl FeedbackRow {
    /// Submission date as shown in the report table.
    pub fn submitted_label(&self) -> String {
        self.created_at.format("%b %d, %Y").to_string()
    }

    /// Whether the member asked for their name to be withheld.
    pub fn is_anonymized(&self) -> bool {
        self.share_anonymized == Some(true)
    }
}

/// All feedback for one coach in the reporting week.
#[derive(Debug, Clone, PartialEq)]
pub struct CoachReport {
    pub coach_name: String,
    pub coach_email: String,
    pub week_start: WeekStart,
    /// Most recent submission first.
    pub rows: Vec<FeedbackRow>,
}

impl CoachReport {
    /// Start a report from the first row seen for a coach.
    pub fn from_first_row(row: &FeedbackRow) -> Self {
        Self {
            coach_name: row.coach_name.clone(),
            coach_email: row.coach_email.clone(),
            week_start: row.week_start.clone(),
            rows: Vec::new(),
        }
    }

    pub fn total_responses(&self) -> usize {
        self.rows.len()
    }

    /// Mean of the non-null ratings, rounded to one decimal place with ties
    /// to even (4.25 becomes 4.2).
    pub fn average_rating(&self) -> Option<f64> {
        let ratings: Vec<u32> = self.rows.iter().filter_map(|r| r.rating).collect();
        if ratings.is_empty() {
            return None;
        }

        let mean = ratings.iter().map(|&r| f64::from(r)).sum::<f64>() / ratings.len() as f64;
        Some((mean * 10.0).round_ties_even() / 10.0)
    }
}

/// Coach reports keyed by coach name.
///
/// Iterates in the order coaches first appear in the query result, which is
/// most recent submission first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoachReports {
    reports: Vec<CoachReport>,
    index: HashMap<String, usize>,
}

impl CoachReports {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a row to its coach's report, creating the report if needed.
    pub fn push_row(&mut self, row: FeedbackRow) {
        let slot = match self.index.get(&row.coach_name) {
            Some(&slot) => slot,
            None => {
                self.reports.push(CoachReport::from_first_row(&row));
                let slot = self.reports.len() - 1;
                self.index.insert(row.coach_name.clone(), slot);
                slot
            }
        };
        self.reports[slot].rows.push(row);
    }

    #[cfg(test)]
    pub fn get(&self, coach_name: &str) -> Option<&CoachReport> {
        self.index.get(coach_name).map(|&slot| &self.reports[slot])
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CoachReport> {
        self.reports.iter()
    }

    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    pub fn coach_names(&self) -> Vec<&str> {
        self.reports.iter().map(|r| r.coach_name.as_str()).collect()
    }
}

impl<'a> IntoIterator for &'a CoachReports {
    type Item = &'a CoachReport;
    type IntoIter = std::slice::Iter<'a, CoachReport>;

    fn into_iter(self) -> Self::IntoIter {
        self.reports.iter()
    }
}
