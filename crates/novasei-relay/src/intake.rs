//! Submission intake: field presence and format checks.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{RelayError, Result};

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("Invalid email regex"));

/// Which form the visitor filled in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FormType {
    General,
    Quote,
    Review,
}

impl FormType {
    /// Map the wire value; anything unrecognised is a general inquiry.
    pub fn parse(value: &str) -> Self {
        match value {
            "quote" => Self::Quote,
            "review" => Self::Review,
            _ => Self::General,
        }
    }

    /// Expected reply time quoted to the submitter.
    pub fn response_time(&self) -> &'static str {
        match self {
            Self::Quote => "2-5 business days",
            _ => "1-3 business days",
        }
    }
}

/// Raw submission body as posted by the contact form.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionRequest {
    pub form_type: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub message: Option<String>,
    pub service: Option<String>,
    pub file_key: Option<String>,
    pub file_name: Option<String>,
}

/// A previously uploaded file referenced by a submission.
#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    pub key: String,
    pub file_name: String,
}

/// A validated submission.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub form_type: FormType,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub message: String,
    pub service: Option<String>,
    pub attachment: Option<Attachment>,
}

impl Submission {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Blank strings count as absent.
fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl SubmissionRequest {
    /// Validate the raw body into a [`Submission`].
    pub fn validate(self) -> Result<Submission> {
        let (Some(form_type), Some(first_name), Some(last_name), Some(email), Some(message)) = (
            present(self.form_type),
            present(self.first_name),
            present(self.last_name),
            present(self.email),
            present(self.message),
        ) else {
            return Err(RelayError::validation("Missing required fields"));
        };

        let form_type = FormType::parse(&form_type);
        let service = present(self.service);

        if form_type == FormType::Quote && service.is_none() {
            return Err(RelayError::validation(
                "Service selection is required for quote requests",
            ));
        }

        if !EMAIL_RE.is_match(&email) {
            return Err(RelayError::validation("Invalid email format"));
        }

        let attachment = match (present(self.file_key), present(self.file_name)) {
            (Some(key), Some(file_name)) => Some(Attachment { key, file_name }),
            _ => None,
        };

        Ok(Submission {
            form_type,
            first_name,
            last_name,
            email,
            message,
            service,
            attachment,
        })
    }
}
