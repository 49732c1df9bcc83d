//! The feedback query and the SQL API wire format around it.
//!
//! Results come back as arrays of strings; [`decode_rows`] maps them onto
//! [`FeedbackRow`] by column name so a renamed or missing column fails loudly
//! instead of producing empty reports.

use crate::error::WarehouseError;
use crate::models::{parse_timestamp, FeedbackRow, WeekStart};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Consented feedback for one week, one row per submission.
///
/// Bindings: `1` week offset from the current week, `2` and `3` optional
/// coach name (case-insensitive exact match).
pub const FEEDBACK_QUERY: &str = r#"
WITH qa AS (
  SELECT
      s.ID                         AS submission_id,
      s.CREATED_AT::timestamp_ntz  AS created_at,
      s.FORM_ID::string            AS form_id,
      f.value:"name"::string       AS question_name,
      f.value:"text"::string       AS question_text,
      f.value:"type"::string       AS question_type,
      COALESCE(
        f.value:"prettyFormat"::string,
        f.value:"answer"::string,
        CASE WHEN IS_OBJECT(f.value:"answer") THEN TO_VARCHAR(f.value:"answer") END
      ) AS answer_value
  FROM RAW__JOTFORM_VIEW.SUBMISSIONS s,
       LATERAL FLATTEN(input => s.ANSWERS) f
),
per_submission AS (
  SELECT
      submission_id,
      created_at,
      form_id,
      MAX(IFF(question_name = 'agency',            answer_value, NULL)) AS customer_name,
      MAX(IFF(question_name = 'selectCoach',       answer_value, NULL)) AS coach_name,
      MAX(IFF(question_name = 'name',              answer_value, NULL)) AS member_name,
      MAX(IFF(question_name = 'commentsquestions', answer_value, NULL)) AS comments,
      MAX(IFF(question_name = 'yourFeedback',      answer_value, NULL)) AS consent_raw,
      MAX(IFF(
        LOWER(question_text) LIKE '%consent to use my testimonial%',
        answer_value, NULL
      )) AS testimonial_consent_raw,
      MAX(IFF(
        LOWER(question_text) LIKE '%my coach cares%' OR question_name IN ('myCoach', 'typeA7'),
        TRY_TO_NUMBER(REGEXP_SUBSTR(answer_value, '^[0-9]+')),
        NULL
      )) AS rating
  FROM qa
  GROUP BY 1, 2, 3
),
final AS (
  SELECT
    submission_id,
    created_at,
    DATE_TRUNC('WEEK', created_at) AS week_start,
    customer_name,
    coach_name,
    IFF(consent_raw ILIKE 'Yes%', TRUE, FALSE) AS consent_to_share,
    CASE
      WHEN consent_raw ILIKE 'Yes%' AND LOWER(consent_raw) LIKE '%anonym%' THEN TRUE
      WHEN consent_raw ILIKE 'Yes%' THEN FALSE
      ELSE NULL
    END AS share_anonymized,
    CASE
      WHEN consent_raw ILIKE 'Yes%' AND LOWER(consent_raw) LIKE '%anonym%' THEN NULL
      ELSE member_name
    END AS member_name,
    rating,
    comments,
    consent_raw,
    testimonial_consent_raw
  FROM per_submission
)
SELECT
  f.*,
  d.coach_email
FROM final f
JOIN ANALYTICS_CORE.DIM__COACHES d
  ON f.coach_name = d.coach_name
WHERE f.consent_to_share = TRUE
  AND f.coach_name IS NOT NULL
  AND f.week_start = DATE_TRUNC('WEEK', DATEADD('week', ?, CURRENT_DATE))
  AND (? IS NULL OR LOWER(f.coach_name) = LOWER(?))
ORDER BY f.created_at DESC
"#;

/// Body of `POST /api/v2/statements`.
#[derive(Debug, Serialize)]
pub struct StatementRequest<'a> {
    pub statement: &'a str,
    pub database: &'a str,
    pub warehouse: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<&'a str>,
    pub bindings: BTreeMap<String, Binding>,
}

/// A positional bind value. The SQL API takes every value as text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Binding {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub value: Option<String>,
}

/// Bindings for [`FEEDBACK_QUERY`].
pub fn feedback_bindings(week_offset: i32, coach_filter: Option<&str>) -> BTreeMap<String, Binding> {
    let coach = Binding {
        kind: "TEXT",
        value: coach_filter.map(str::to_string),
    };

    BTreeMap::from([
        (
            "1".to_string(),
            Binding {
                kind: "FIXED",
                value: Some(week_offset.to_string()),
            },
        ),
        ("2".to_string(), coach.clone()),
        ("3".to_string(), coach),
    ])
}

/// Any response from the statements endpoint.
///
/// A still-running statement only carries the handle and status URL; later
/// partitions only carry `data`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatementResponse {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub statement_handle: Option<String>,
    #[serde(default)]
    pub statement_status_url: Option<String>,
    #[serde(default)]
    pub result_set_meta_data: Option<ResultSetMetaData>,
    #[serde(default)]
    pub data: Vec<Vec<Option<String>>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultSetMetaData {
    #[serde(default)]
    pub num_rows: u64,
    pub row_type: Vec<ColumnType>,
    #[serde(default)]
    pub partition_info: Vec<PartitionInfo>,
}

#[derive(Debug, Deserialize)]
pub struct ColumnType {
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartitionInfo {
    #[serde(default)]
    pub row_count: u64,
}

/// Column positions by lower-cased name.
struct Columns(HashMap<String, usize>);

impl Columns {
    fn new(meta: &ResultSetMetaData) -> Self {
        Columns(
            meta.row_type
                .iter()
                .enumerate()
                .map(|(i, c)| (c.name.to_lowercase(), i))
                .collect(),
        )
    }

    fn cell<'r>(&self, row: &'r [Option<String>], column: &str) -> Result<Option<&'r str>, WarehouseError> {
        let index = *self.0.get(column).ok_or_else(|| WarehouseError::Decode {
            column: column.to_string(),
            reason: "column missing from result set".to_string(),
        })?;

        row.get(index)
            .map(|value| value.as_deref())
            .ok_or_else(|| WarehouseError::Decode {
                column: column.to_string(),
                reason: format!("row has only {} values", row.len()),
            })
    }

    fn text(&self, row: &[Option<String>], column: &str) -> Result<Option<String>, WarehouseError> {
        Ok(self.cell(row, column)?.map(str::to_string))
    }

    fn required_text(&self, row: &[Option<String>], column: &str) -> Result<String, WarehouseError> {
        self.text(row, column)?.ok_or_else(|| null_in(column))
    }

    fn flag(&self, row: &[Option<String>], column: &str) -> Result<Option<bool>, WarehouseError> {
        self.cell(row, column)?
            .map(|value| match value.to_ascii_lowercase().as_str() {
                "true" | "1" => Ok(true),
                "false" | "0" => Ok(false),
                other => Err(WarehouseError::Decode {
                    column: column.to_string(),
                    reason: format!("'{}' is not a boolean", other),
                }),
            })
            .transpose()
    }

    fn rating(&self, row: &[Option<String>], column: &str) -> Result<Option<u32>, WarehouseError> {
        self.cell(row, column)?
            .map(|value| {
                value.trim().parse::<u32>().map_err(|_| WarehouseError::Decode {
                    column: column.to_string(),
                    reason: format!("'{}' is not a whole number", value),
                })
            })
            .transpose()
    }
}

fn null_in(column: &str) -> WarehouseError {
    WarehouseError::Decode {
        column: column.to_string(),
        reason: "unexpected null".to_string(),
    }
}

/// Map raw result rows onto [`FeedbackRow`]s, keeping their order.
pub fn decode_rows(
    meta: &ResultSetMetaData,
    data: &[Vec<Option<String>>],
) -> Result<Vec<FeedbackRow>, WarehouseError> {
    let columns = Columns::new(meta);

    data.iter()
        .map(|row| decode_row(&columns, row))
        .collect()
}

fn decode_row(columns: &Columns, row: &[Option<String>]) -> Result<FeedbackRow, WarehouseError> {
    let created_raw = columns.required_text(row, "created_at")?;
    let created_at = parse_timestamp(&created_raw).ok_or_else(|| WarehouseError::Decode {
        column: "created_at".to_string(),
        reason: format!("'{}' is not a timestamp", created_raw),
    })?;

    Ok(FeedbackRow {
        submission_id: columns.required_text(row, "submission_id")?,
        created_at,
        week_start: WeekStart::parse(&columns.required_text(row, "week_start")?),
        customer_name: columns.text(row, "customer_name")?,
        coach_name: columns.required_text(row, "coach_name")?,
        coach_email: columns.required_text(row, "coach_email")?,
        consent_to_share: columns
            .flag(row, "consent_to_share")?
            .ok_or_else(|| null_in("consent_to_share"))?,
        share_anonymized: columns.flag(row, "share_anonymized")?,
        member_name: columns.text(row, "member_name")?,
        rating: columns.rating(row, "rating")?,
        comments: columns.text(row, "comments")?,
        consent_raw: columns.text(row, "consent_raw")?,
        testimonial_consent_raw: columns.text(row, "testimonial_consent_raw")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const RESPONSE: &str = r#"{
      "resultSetMetaData": {
        "numRows": 2,
        "format": "jsonv2",
        "partitionInfo": [{"rowCount": 2, "uncompressedSize": 1024}],
        "rowType": [
          {"name": "SUBMISSION_ID", "type": "text", "nullable": true},
          {"name": "CREATED_AT", "type": "timestamp_ntz", "nullable": true},
          {"name": "WEEK_START", "type": "timestamp_ntz", "nullable": true},
          {"name": "CUSTOMER_NAME", "type": "text", "nullable": true},
          {"name": "COACH_NAME", "type": "text", "nullable": true},
          {"name": "CONSENT_TO_SHARE", "type": "boolean", "nullable": false},
          {"name": "SHARE_ANONYMIZED", "type": "boolean", "nullable": true},
          {"name": "MEMBER_NAME", "type": "text", "nullable": true},
          {"name": "RATING", "type": "fixed", "nullable": true},
          {"name": "COMMENTS", "type": "text", "nullable": true},
          {"name": "CONSENT_RAW", "type": "text", "nullable": true},
          {"name": "TESTIMONIAL_CONSENT_RAW", "type": "text", "nullable": true},
          {"name": "COACH_EMAIL", "type": "text", "nullable": true}
        ]
      },
      "data": [
        ["5891", "1741185000.000000000", "1740960000.000000000", "Acme Staffing", "Jane Smith",
         "true", "true", null, "5", "Great coach", "Yes, but keep me anonymous", "Yes", "jane@example.com"],
        ["5890", "1741098600.000000000", "1740960000.000000000", "Birch Homecare", "Jane Smith",
         "true", "false", "Pat Doe", null, null, "Yes", null, "jane@example.com"]
      ],
      "code": "090001",
      "statementStatusUrl": "/api/v2/statements/01b2-0000?requestId=abc",
      "statementHandle": "01b2-0000",
      "message": "Statement executed successfully."
    }"#;

    fn response() -> StatementResponse {
        serde_json::from_str(RESPONSE).unwrap()
    }

    #[test]
    fn test_decode_rows() {
        let response = response();
        let meta = response.result_set_meta_data.as_ref().unwrap();
        assert_eq!(meta.num_rows, 2);
        assert_eq!(meta.partition_info.len(), 1);

        let rows = decode_rows(meta, &response.data).unwrap();
        assert_eq!(rows.len(), 2);

        let first = &rows[0];
        assert_eq!(first.submission_id, "5891");
        assert_eq!(first.coach_name, "Jane Smith");
        assert_eq!(first.coach_email, "jane@example.com");
        assert_eq!(
            first.week_start,
            WeekStart::Date(NaiveDate::from_ymd_opt(2025, 3, 3).unwrap())
        );
        assert!(first.consent_to_share);
        assert!(first.is_anonymized());
        assert_eq!(first.member_name, None);
        assert_eq!(first.rating, Some(5));
        assert_eq!(first.testimonial_consent_raw.as_deref(), Some("Yes"));

        let second = &rows[1];
        assert_eq!(second.share_anonymized, Some(false));
        assert_eq!(second.member_name.as_deref(), Some("Pat Doe"));
        assert_eq!(second.rating, None);
        assert_eq!(second.comments, None);
        assert!(first.created_at > second.created_at);
    }

    #[test]
    fn test_missing_column_is_a_decode_error() {
        let mut response = response();
        let meta = response.result_set_meta_data.as_mut().unwrap();
        meta.row_type.retain(|c| c.name != "COACH_EMAIL");

        match decode_rows(meta, &response.data) {
            Err(WarehouseError::Decode { column, .. }) => assert_eq!(column, "coach_email"),
            other => panic!("expected decode error, got {:?}", other),
        }
    }

    #[test]
    fn test_non_numeric_rating_is_a_decode_error() {
        let mut response = response();
        response.data[0][8] = Some("N/A".to_string());
        let meta = response.result_set_meta_data.as_ref().unwrap();

        assert!(matches!(
            decode_rows(meta, &response.data),
            Err(WarehouseError::Decode { .. })
        ));
    }

    #[test]
    fn test_bindings() {
        let bindings = feedback_bindings(-1, None);
        assert_eq!(bindings["1"].kind, "FIXED");
        assert_eq!(bindings["1"].value.as_deref(), Some("-1"));
        assert_eq!(bindings["2"].value, None);
        assert_eq!(bindings["3"].value, None);

        let bindings = feedback_bindings(0, Some("Jane Smith"));
        assert_eq!(bindings["1"].value.as_deref(), Some("0"));
        assert_eq!(bindings["2"].kind, "TEXT");
        assert_eq!(bindings["2"].value.as_deref(), Some("Jane Smith"));
        assert_eq!(bindings["3"], bindings["2"]);
    }

    #[test]
    fn test_request_serialization() {
        let request = StatementRequest {
            statement: FEEDBACK_QUERY,
            database: "ANALYTICS_DEV",
            warehouse: "COMPUTE_WH",
            role: None,
            bindings: feedback_bindings(-1, None),
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["database"], "ANALYTICS_DEV");
        assert!(json.get("role").is_none());
        assert_eq!(json["bindings"]["1"]["type"], "FIXED");
        assert!(json["bindings"]["2"]["value"].is_null());
    }

    #[test]
    fn test_query_has_one_placeholder_per_binding() {
        assert_eq!(FEEDBACK_QUERY.matches('?').count(), feedback_bindings(0, None).len());
    }

    #[test]
    fn test_async_response_shape() {
        let response: StatementResponse = serde_json::from_str(
            r#"{"code": "333334", "message": "Asynchronous execution in progress.",
                "statementHandle": "01b2-0001",
                "statementStatusUrl": "/api/v2/statements/01b2-0001"}"#,
        )
        .unwrap();

        assert!(response.result_set_meta_data.is_none());
        assert!(response.data.is_empty());
        assert_eq!(response.statement_handle.as_deref(), Some("01b2-0001"));
    }
}
