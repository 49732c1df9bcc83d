//! Snowflake SQL API session.
//!
//! Submits the feedback statement, waits for it if the warehouse answers
//! asynchronously, and pulls every result partition in order.

use super::auth::KeyPair;
use super::query::{
    decode_rows, feedback_bindings, ResultSetMetaData, StatementRequest, StatementResponse,
    FEEDBACK_QUERY,
};
use super::FeedbackSource;
use crate::analysis::group_by_coach;
use crate::config::WarehouseConfig;
use crate::error::WarehouseError;
use crate::models::CoachReports;
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Delay between status checks on a statement that is still running.
const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Error body returned with non-success statuses.
#[derive(Debug, Default, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// An authenticated session against one Snowflake account.
pub struct SnowflakeSession {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
    database: String,
    warehouse: String,
    role: Option<String>,
    /// Handle of a statement the server may still be executing.
    in_flight: Option<String>,
}

impl SnowflakeSession {
    /// Parse the key, mint a token, and prepare the HTTP client.
    pub fn connect(config: &WarehouseConfig) -> Result<Self, WarehouseError> {
        let base_url = format!(
            "https://{}.snowflakecomputing.com",
            config.account.to_lowercase()
        );
        Self::open(config, base_url)
    }

    /// Like [`connect`](Self::connect), against an explicit API root.
    pub(crate) fn open(config: &WarehouseConfig, base_url: String) -> Result<Self, WarehouseError> {
        let key = KeyPair::from_pem(&config.private_key_pem)?;
        let token = key.token(&config.account, &config.user, Utc::now())?;
        debug!("Authenticating with public key {}", key.fingerprint());

        let http = reqwest::Client::builder()
            .user_agent(concat!("coach-feedback/", env!("CARGO_PKG_VERSION")))
            .build()?;

        info!(
            "Connected to Snowflake account {} as {}",
            config.account, config.user
        );

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: Some(token),
            database: config.database.clone(),
            warehouse: config.warehouse.clone(),
            role: config.role.clone(),
            in_flight: None,
        })
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, WarehouseError> {
        let token = self.token.as_deref().ok_or(WarehouseError::SessionClosed)?;

        Ok(self
            .http
            .request(method, format!("{}{}", self.base_url, path))
            .bearer_auth(token)
            .header("X-Snowflake-Authorization-Token-Type", "KEYPAIR_JWT")
            .header(reqwest::header::ACCEPT, "application/json"))
    }

    /// Send a request and parse the statement response, mapping API errors.
    async fn send(&self, request: RequestBuilder) -> Result<(StatusCode, StatementResponse), WarehouseError> {
        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let body: ApiErrorBody = serde_json::from_str(&text).unwrap_or_default();
            return Err(WarehouseError::Api {
                status: status.as_u16(),
                code: body.code.unwrap_or_else(|| "unknown".to_string()),
                message: body.message.unwrap_or(text),
            });
        }

        Ok((status, response.json::<StatementResponse>().await?))
    }

    /// Run a statement to completion and return every row of every partition.
    async fn execute(
        &mut self,
        request: &StatementRequest<'_>,
    ) -> Result<(ResultSetMetaData, Vec<Vec<Option<String>>>), WarehouseError> {
        let builder = self.request(Method::POST, "/api/v2/statements")?.json(request);
        let (mut status, mut response) = self.send(builder).await?;
        if status == StatusCode::ACCEPTED {
            self.in_flight = response.statement_handle.clone();
        }

        while status == StatusCode::ACCEPTED {
            let url = response
                .statement_status_url
                .clone()
                .ok_or_else(|| WarehouseError::Api {
                    status: status.as_u16(),
                    code: response.code.clone().unwrap_or_default(),
                    message: "statement accepted without a status URL".to_string(),
                })?;

            debug!(
                "Statement still running ({}), polling {}",
                response.message.as_deref().unwrap_or("no status message"),
                url
            );
            tokio::time::sleep(POLL_INTERVAL).await;
            (status, response) = self.send(self.request(Method::GET, &url)?).await?;
        }
        self.in_flight = None;

        let meta = response
            .result_set_meta_data
            .take()
            .ok_or_else(|| WarehouseError::Api {
                status: status.as_u16(),
                code: response.code.clone().unwrap_or_default(),
                message: "response is missing result set metadata".to_string(),
            })?;
        let mut data = std::mem::take(&mut response.data);
        debug!(
            "Statement returned {} rows in {} partition(s)",
            meta.num_rows,
            meta.partition_info.len().max(1)
        );

        if meta.partition_info.len() > 1 {
            let handle = response
                .statement_handle
                .clone()
                .ok_or_else(|| WarehouseError::Api {
                    status: status.as_u16(),
                    code: response.code.clone().unwrap_or_default(),
                    message: "partitioned result without a statement handle".to_string(),
                })?;

            for (partition, info) in meta.partition_info.iter().enumerate().skip(1) {
                debug!(
                    "Fetching result partition {} of {} ({} rows)",
                    partition + 1,
                    meta.partition_info.len(),
                    info.row_count
                );
                let path = format!("/api/v2/statements/{}?partition={}", handle, partition);
                let (_, page) = self.send(self.request(Method::GET, &path)?).await?;
                data.extend(page.data);
            }
        }

        Ok((meta, data))
    }
}

#[async_trait]
impl FeedbackSource for SnowflakeSession {
    async fn fetch_feedback(
        &mut self,
        week_offset: i32,
        coach_filter: Option<&str>,
    ) -> Result<CoachReports, WarehouseError> {
        info!(
            "Executing feedback query (week_offset={}, coach={})…",
            week_offset,
            coach_filter.unwrap_or("all")
        );

        let database = self.database.clone();
        let warehouse = self.warehouse.clone();
        let role = self.role.clone();
        let request = StatementRequest {
            statement: FEEDBACK_QUERY,
            database: &database,
            warehouse: &warehouse,
            role: role.as_deref(),
            bindings: feedback_bindings(week_offset, coach_filter),
        };

        let (meta, data) = self.execute(&request).await?;
        let rows = decode_rows(&meta, &data)?;
        info!("Fetched {} consented feedback rows.", rows.len());

        Ok(group_by_coach(rows))
    }

    async fn close(&mut self) {
        if let Some(handle) = self.in_flight.take() {
            warn!("Cancelling unfinished statement {}", handle);
            let path = format!("/api/v2/statements/{}/cancel", handle);
            let result = match self.request(Method::POST, &path) {
                Ok(builder) => self.send(builder).await.map(|_| ()),
                Err(e) => Err(e),
            };
            if let Err(e) = result {
                warn!("Failed to cancel statement {}: {}", handle, e);
            }
        }

        if self.token.take().is_some() {
            debug!("Warehouse session closed");
        }
    }
}
