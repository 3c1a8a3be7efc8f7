//! Download tokens for uploaded files.
//!
//! A token is the standard base64 encoding of the JSON object
//! `{"key": ..., "fileName": ..., "expiry": <unix millis>}`.
//!
//! Tokens carry no signature or MAC. Anyone who can read one can decode it,
//! and anyone who knows an object key can mint a token for it or push its
//! expiry forward. Treat a download link as "unlisted", not as access control.

use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::Duration;
use serde::{Deserialize, Serialize};

/// Decoded contents of a download token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadToken {
    /// Object key in the bucket
    pub key: String,

    /// Filename offered to the browser
    #[serde(rename = "fileName")]
    pub file_name: String,

    /// Expiry as unix milliseconds
    pub expiry: i64,
}

/// Errors from token verification.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum TokenError {
    #[error("Malformed token: {0}")]
    Malformed(String),

    #[error("Token expired")]
    Expired,
}

impl DownloadToken {
    /// Token for `key` valid for `ttl` from `now_ms`.
    pub fn issue(key: &str, file_name: &str, now_ms: i64, ttl: Duration) -> Self {
        Self {
            key: key.to_string(),
            file_name: file_name.to_string(),
            expiry: now_ms.saturating_add(ttl.num_milliseconds()),
        }
    }

    /// Encode to the wire form.
    pub fn encode(&self) -> String {
        let json = serde_json::json!({
            "key": self.key,
            "fileName": self.file_name,
            "expiry": self.expiry,
        });
        STANDARD.encode(json.to_string())
    }

    /// Decode the wire form without checking expiry.
    pub fn decode(token: &str) -> Result<Self, TokenError> {
        let raw = STANDARD
            .decode(token.trim())
            .map_err(|e| TokenError::Malformed(e.to_string()))?;

        serde_json::from_slice(&raw).map_err(|e| TokenError::Malformed(e.to_string()))
    }

    pub fn is_expired(&self, now_ms: i64) -> bool {
        now_ms > self.expiry
    }

    /// Decode and reject expired tokens.
    pub fn verify(token: &str, now_ms: i64) -> Result<Self, TokenError> {
        let decoded = Self::decode(token)?;

        if decoded.is_expired(now_ms) {
            return Err(TokenError::Expired);
        }

        Ok(decoded)
    }
}
