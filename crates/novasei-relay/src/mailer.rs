//! Transactional email delivery.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

const SEND_TIMEOUT: Duration = Duration::from_secs(30);

/// One email as accepted by the send API.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutgoingEmail {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub html: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
}

/// Errors from email delivery.
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Email API returned {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Something that can deliver an [`OutgoingEmail`].
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), MailError>;
}

/// Mailer for the Resend HTTP API.
#[derive(Clone)]
pub struct ResendMailer {
    api_base: String,
    api_key: String,
    client: reqwest::Client,
}

impl ResendMailer {
    pub fn new(api_base: impl Into<String>, api_key: impl Into<String>) -> Result<Self, MailError> {
        let client = reqwest::Client::builder().timeout(SEND_TIMEOUT).build()?;

        Ok(Self {
            api_base: api_base.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        })
    }

    fn emails_url(&self) -> String {
        format!("{}/emails", self.api_base)
    }
}

#[async_trait]
impl Mailer for ResendMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), MailError> {
        let response = self
            .client
            .post(self.emails_url())
            .bearer_auth(&self.api_key)
            .json(email)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(
                "Email API rejected \"{}\" with {}: {}",
                email.subject,
                status,
                body
            );
            return Err(MailError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        tracing::debug!("Sent \"{}\" to {}", email.subject, email.to.join(", "));
        Ok(())
    }
}
