//! Upload slot issuance and transfer checks.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::RelayConfig;
use crate::error::{RelayError, Result};

/// Prefix every upload key carries.
pub const UPLOAD_PREFIX: &str = "uploads/";

static UNSAFE_FILENAME_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-zA-Z0-9.-]").expect("Invalid filename regex"));

/// Body of a slot request.
#[derive(Debug, Deserialize)]
pub struct SlotRequest {
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
}

/// Body of a slot response.
#[derive(Debug, Serialize, Deserialize)]
pub struct SlotResponse {
    pub key: String,
}

/// File type and size limits applied to uploads.
#[derive(Debug, Clone)]
pub struct UploadPolicy {
    max_file_size: u64,
    max_size_label: String,
    allowed_extensions: Vec<String>,
}

impl UploadPolicy {
    pub fn new(max_file_size: u64, max_size_label: String, allowed_extensions: Vec<String>) -> Self {
        Self {
            max_file_size,
            max_size_label,
            allowed_extensions: allowed_extensions
                .into_iter()
                .map(|e| e.to_lowercase())
                .collect(),
        }
    }

    pub fn from_config(config: &RelayConfig) -> Self {
        Self::new(
            config.max_file_size,
            config.max_file_size_label(),
            config.allowed_extensions.clone(),
        )
    }

    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    /// Check a slot request, before any bytes are sent.
    pub fn check_slot(&self, filename: &str, size: Option<u64>) -> Result<()> {
        let ext = extension(filename);
        if !self.allowed_extensions.iter().any(|allowed| *allowed == ext) {
            return Err(RelayError::validation(format!(
                "Invalid file type. Allowed: {}",
                self.allowed_extensions.join(", ")
            )));
        }

        if size.is_some_and(|s| s > self.max_file_size) {
            return Err(RelayError::validation(format!(
                "File too large. Maximum size: {}",
                self.max_size_label
            )));
        }

        Ok(())
    }

    /// Check the size of a transferred body. This is the authoritative check.
    pub fn check_body_size(&self, len: usize) -> Result<()> {
        if len as u64 > self.max_file_size {
            return Err(RelayError::validation("File too large"));
        }
        Ok(())
    }
}

/// Check a key given to the transfer endpoint.
pub fn check_key(key: Option<&str>) -> Result<&str> {
    match key {
        Some(key)
            if key.starts_with(UPLOAD_PREFIX)
                && key.len() > UPLOAD_PREFIX.len()
                && !key.split(['/', '\\']).any(|part| part == "..") =>
        {
            Ok(key)
        }
        _ => Err(RelayError::validation("Invalid key")),
    }
}

/// Extension of a filename: text after the last dot, lowercased.
///
/// A name without a dot is its own extension.
pub fn extension(filename: &str) -> String {
    filename
        .rsplit('.')
        .next()
        .unwrap_or_default()
        .to_lowercase()
}

/// Replace everything outside `[a-zA-Z0-9.-]` with `_`.
pub fn sanitize_filename(filename: &str) -> String {
    UNSAFE_FILENAME_CHARS.replace_all(filename, "_").into_owned()
}

/// Generate a fresh object key for `filename`.
pub fn generate_key(filename: &str, now_ms: i64) -> String {
    let random = uuid::Uuid::new_v4().simple().to_string();
    format!(
        "{}{}-{}-{}",
        UPLOAD_PREFIX,
        now_ms,
        &random[..6],
        sanitize_filename(filename)
    )
}
