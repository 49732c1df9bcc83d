//! Report delivery.
//!
//! [`SmtpMailer`] sends real mail; [`PreviewMailer`] writes the HTML to disk
//! for `--dry-run`.

mod preview;
mod smtp;

pub use preview::PreviewMailer;
pub use smtp::SmtpMailer;

use crate::error::MailError;
use async_trait::async_trait;

/// Plain-text alternative carried by every report email.
pub const PLAIN_TEXT_NOTICE: &str =
    "Please view this email in an HTML-capable client to see your feedback report.";

/// Delivers one rendered report.
#[async_trait]
pub trait Mailer {
    async fn send(
        &self,
        to_email: &str,
        to_name: &str,
        subject: &str,
        html_body: &str,
    ) -> Result<(), MailError>;
}
