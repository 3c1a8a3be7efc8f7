//! HTTP handlers for the relay routes.

use axum::{
    body::{to_bytes, Body, Bytes},
    extract::{Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{Duration, Utc};
use http_body_util::LengthLimitError;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::json;

use crate::error::{RelayError, Result};
use crate::intake::SubmissionRequest;
use crate::server::AppState;
use crate::storage::StorageError;
use crate::token::{DownloadToken, TokenError};
use crate::upload::{self, SlotRequest, SlotResponse};

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    pub key: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    pub token: Option<String>,
}

/// Parse a JSON body regardless of its declared content type.
fn parse_json<T: DeserializeOwned>(body: &[u8]) -> Result<T> {
    serde_json::from_slice(body).map_err(|e| {
        tracing::debug!("Unparseable body: {}", e);
        RelayError::validation("Invalid request body")
    })
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// POST /api/get-upload-url
pub async fn get_upload_url(State(state): State<AppState>, body: Bytes) -> Result<Json<SlotResponse>> {
    let request: SlotRequest = parse_json(&body)?;
    let filename = request.filename.unwrap_or_default();

    state.policy.check_slot(&filename, request.size)?;

    let key = upload::generate_key(&filename, now_ms());
    tracing::info!("Issued upload slot {}", key);

    Ok(Json(SlotResponse { key }))
}

/// PUT /api/upload?key=...
pub async fn upload(
    State(state): State<AppState>,
    Query(query): Query<UploadQuery>,
    headers: HeaderMap,
    body: Body,
) -> Result<Json<serde_json::Value>> {
    let key = upload::check_key(query.key.as_deref())?;

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .unwrap_or(DEFAULT_CONTENT_TYPE)
        .to_string();

    let limit = usize::try_from(state.policy.max_file_size()).unwrap_or(usize::MAX);
    let bytes = to_bytes(body, limit).await.map_err(body_read_error)?;
    state.policy.check_body_size(bytes.len())?;

    let size = bytes.len();
    state.bucket.put(key, bytes, &content_type).await?;
    tracing::info!("Stored upload {} ({} bytes, {})", key, size, content_type);

    Ok(Json(json!({ "success": true })))
}

/// POST /api/submit
pub async fn submit(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<serde_json::Value>> {
    let request: SubmissionRequest = parse_json(&body)?;
    let submission = request.validate()?;

    let download_url = submission.attachment.as_ref().map(|attachment| {
        let token = DownloadToken::issue(
            &attachment.key,
            &attachment.file_name,
            now_ms(),
            Duration::days(i64::from(state.config.link_ttl_days)),
        );
        format!(
            "{}/api/download?token={}",
            public_origin(&state, &headers),
            urlencoding::encode(&token.encode())
        )
    });

    let notification = state
        .emails
        .notification(&submission, download_url.as_deref())
        .map_err(|e| RelayError::Internal(format!("Failed to render notification: {}", e)))?;
    let confirmation = state
        .emails
        .confirmation(&submission)
        .map_err(|e| RelayError::Internal(format!("Failed to render confirmation: {}", e)))?;

    state.mailer.send(&notification).await?;
    state.mailer.send(&confirmation).await?;

    tracing::info!(
        "Relayed {:?} submission from {}{}",
        submission.form_type,
        submission.email,
        if download_url.is_some() { " with attachment" } else { "" }
    );

    Ok(Json(json!({ "success": true })))
}

/// GET /api/download?token=...
pub async fn download(
    State(state): State<AppState>,
    Query(query): Query<DownloadQuery>,
) -> Result<Response> {
    let token = query
        .token
        .filter(|t| !t.is_empty())
        .ok_or(RelayError::MissingToken)?;

    let token = DownloadToken::verify(&token, now_ms()).map_err(|e| match e {
        TokenError::Expired => RelayError::LinkExpired,
        TokenError::Malformed(reason) => {
            tracing::debug!("Rejected download token: {}", reason);
            RelayError::InvalidToken
        }
    })?;

    let object = match state.bucket.get(&token.key).await {
        Ok(Some(object)) => object,
        Ok(None) | Err(StorageError::InvalidKey(_)) => return Err(RelayError::FileNotFound),
        Err(e) => return Err(e.into()),
    };

    let content_type = object
        .content_type
        .as_deref()
        .and_then(|ct| HeaderValue::from_str(ct).ok())
        .unwrap_or_else(|| HeaderValue::from_static(DEFAULT_CONTENT_TYPE));

    let disposition = format!(
        "attachment; filename=\"{}\"",
        disposition_filename(&token.file_name)
    );
    let disposition = HeaderValue::from_bytes(disposition.as_bytes())
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"));

    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, disposition),
            (header::CONTENT_LENGTH, HeaderValue::from(object.size())),
        ],
        object.body,
    )
        .into_response())
}

/// GET /healthz
pub async fn healthz() -> &'static str {
    "ok"
}

/// Anything unrouted, or a known path with the wrong method.
pub async fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "Not Found").into_response()
}

/// Classify a failed upload body read: over the size limit, or cut short.
fn body_read_error(err: axum::Error) -> RelayError {
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(&err);
    while let Some(e) = source {
        if e.is::<LengthLimitError>() {
            return RelayError::validation("File too large");
        }
        source = e.source();
    }

    tracing::warn!("Failed to read upload body: {}", err);
    RelayError::validation("Failed to read upload")
}

/// Replace characters that would break out of a quoted header parameter.
pub fn disposition_filename(name: &str) -> String {
    name.chars()
        .map(|c| if c == '"' || c.is_control() { '_' } else { c })
        .collect()
}

/// Origin download links point at: the configured public URL, else the
/// request's own scheme and host.
fn public_origin(state: &AppState, headers: &HeaderMap) -> String {
    if let Some(url) = &state.config.public_url {
        return url.trim_end_matches('/').to_string();
    }

    let header_str = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(',').next().unwrap_or(v).trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let proto = header_str("x-forwarded-proto").unwrap_or_else(|| "http".to_string());
    let host = header_str("host")
        .unwrap_or_else(|| format!("{}:{}", state.config.host, state.config.port));

    format!("{}://{}", proto, host)
}
