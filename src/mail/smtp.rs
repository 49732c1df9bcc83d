//! SMTP delivery through lettre.

use super::{Mailer, PLAIN_TEXT_NOTICE};
use crate::config::SmtpConfig;
use crate::error::MailError;
use async_trait::async_trait;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{debug, info};

/// Sends each report over its own authenticated STARTTLS connection.
pub struct SmtpMailer {
    config: SmtpConfig,
}

impl SmtpMailer {
    pub fn new(config: SmtpConfig) -> Self {
        Self { config }
    }

    /// Compose the multipart message without sending it.
    pub fn build_message(
        &self,
        to_email: &str,
        to_name: &str,
        subject: &str,
        html_body: &str,
    ) -> Result<Message, MailError> {
        let from = Mailbox::new(
            Some(self.config.from_name.clone()),
            parse_address(self.config.sender_address())?,
        );
        let to = Mailbox::new(Some(to_name.to_string()), parse_address(to_email)?);

        let message = Message::builder()
            .from(from)
            .to(to)
            .subject(subject)
            .multipart(MultiPart::alternative_plain_html(
                PLAIN_TEXT_NOTICE.to_string(),
                html_body.to_string(),
            ))?;

        Ok(message)
    }
}

fn parse_address(address: &str) -> Result<Address, MailError> {
    address.trim().parse::<Address>().map_err(|e| MailError::Address {
        address: address.to_string(),
        reason: e.to_string(),
    })
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(
        &self,
        to_email: &str,
        to_name: &str,
        subject: &str,
        html_body: &str,
    ) -> Result<(), MailError> {
        let message = self.build_message(to_email, to_name, subject, html_body)?;

        debug!(
            "Connecting to {}:{} as {}",
            self.config.host, self.config.port, self.config.username
        );
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.host)?
            .port(self.config.port)
            .credentials(Credentials::new(
                self.config.username.clone(),
                self.config.password.clone(),
            ))
            .build();

        transport.send(message).await?;

        info!("Email sent to {}", to_email);
        Ok(())
    }
}
