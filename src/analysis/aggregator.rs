//! Feedback aggregation.
//!
//! Groups the flat rows returned by the warehouse into one report per coach.

use crate::models::{CoachReports, FeedbackRow};

/// Group rows by coach name.
///
/// Row order within each coach, and the order coaches appear in, both follow
/// the input order (the warehouse sorts newest first).
pub fn group_by_coach(rows: Vec<FeedbackRow>) -> CoachReports {
    let mut grouped = CoachReports::new();

    for row in rows {
        grouped.push_row(row);
    }

    grouped
}

/// Total number of responses across every coach.
pub fn total_responses(reports: &CoachReports) -> usize {
    reports.iter().map(|r| r.total_responses()).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::tests::sample_row;

    #[test]
    fn test_group_by_coach_preserves_order() {
        let rows = vec![
            sample_row("Jane Smith", "s3", Some(5)),
            sample_row("Omar Haddad", "s2", Some(3)),
            sample_row("Jane Smith", "s1", Some(4)),
        ];

        let grouped = group_by_coach(rows);

        assert_eq!(grouped.coach_names(), vec!["Jane Smith", "Omar Haddad"]);

        let jane = grouped.get("Jane Smith").unwrap();
        let ids: Vec<&str> = jane.rows.iter().map(|r| r.submission_id.as_str()).collect();
        assert_eq!(ids, vec!["s3", "s1"]);
        assert_eq!(jane.coach_email, "jane.smith@example.com");
        assert_eq!(jane.average_rating(), Some(4.5));

        assert_eq!(grouped.get("Omar Haddad").unwrap().total_responses(), 1);
        assert_eq!(total_responses(&grouped), 3);
    }

    #[test]
    fn test_group_by_coach_is_case_sensitive_on_name() {
        let rows = vec![
            sample_row("Jane Smith", "s1", Some(5)),
            sample_row("jane smith", "s2", Some(5)),
        ];

        assert_eq!(group_by_coach(rows).len(), 2);
    }

    #[test]
    fn test_group_by_coach_empty() {
        let grouped = group_by_coach(Vec::new());
        assert!(grouped.is_empty());
        assert_eq!(total_responses(&grouped), 0);
    }

    #[test]
    fn test_grouping_is_deterministic() {
        let rows = vec![
            sample_row("Jane Smith", "s2", Some(4)),
            sample_row("Omar Haddad", "s1", None),
        ];

        assert_eq!(group_by_coach(rows.clone()), group_by_coach(rows));
    }
}
