//! Data warehouse access.
//!
//! [`SnowflakeSession`] is the production [`FeedbackSource`]; the pipeline
//! only ever talks to the trait.

pub mod auth;
pub mod client;
pub mod query;

pub use client::SnowflakeSession;

use crate::error::WarehouseError;
use crate::models::CoachReports;
use async_trait::async_trait;

/// Somewhere consented feedback can be fetched from.
#[async_trait]
pub trait FeedbackSource {
    /// Feedback for the week `week_offset` weeks from the current one,
    /// optionally restricted to one coach (case-insensitive), grouped by coach.
    async fn fetch_feedback(
        &mut self,
        week_offset: i32,
        coach_filter: Option<&str>,
    ) -> Result<CoachReports, WarehouseError>;

    /// Release the session. Must be called whether or not fetching succeeded.
    async fn close(&mut self);
}
