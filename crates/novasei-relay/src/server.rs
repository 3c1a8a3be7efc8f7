//! Relay router and server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::config::{RelayConfig, StorageBackend};
use crate::email::EmailComposer;
use crate::handlers;
use crate::mailer::{Mailer, ResendMailer};
use crate::storage::{Bucket, LocalBucket, MemoryBucket};
use crate::upload::UploadPolicy;

const PREFLIGHT_MAX_AGE: Duration = Duration::from_secs(86400);

/// Errors starting the relay.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Invalid address {0}")]
    InvalidAddress(String),

    #[error("Failed to bind to {0}: {1}")]
    BindError(SocketAddr, String),

    #[error("Setup failed: {0}")]
    Setup(String),
}

/// Shared, read-only state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<RelayConfig>,
    pub bucket: Arc<dyn Bucket>,
    pub mailer: Arc<dyn Mailer>,
    pub policy: Arc<UploadPolicy>,
    pub emails: Arc<EmailComposer>,
}

impl AppState {
    pub fn new(
        config: RelayConfig,
        bucket: Arc<dyn Bucket>,
        mailer: Arc<dyn Mailer>,
    ) -> Result<Self, ServerError> {
        let emails = EmailComposer::new(config.email.clone(), config.link_ttl_days)
            .map_err(|e| ServerError::Setup(format!("email templates: {}", e)))?;

        Ok(Self {
            policy: Arc::new(UploadPolicy::from_config(&config)),
            config: Arc::new(config),
            bucket,
            mailer,
            emails: Arc::new(emails),
        })
    }
}

/// CORS for the configured origins. Unparseable origins are skipped.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid allowed origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
        .max_age(PREFLIGHT_MAX_AGE)
}

/// Build the relay router.
pub fn router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.allowed_origins);

    Router::new()
        .route("/api/get-upload-url", post(handlers::get_upload_url))
        .route(
            "/api/upload",
            put(handlers::upload).layer(DefaultBodyLimit::disable()),
        )
        .route("/api/submit", post(handlers::submit))
        .route("/api/download", get(handlers::download))
        .route("/healthz", get(handlers::healthz))
        .fallback(handlers::not_found)
        .method_not_allowed_fallback(handlers::not_found)
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Relay server.
pub struct RelayServer {
    config: RelayConfig,
}

impl RelayServer {
    pub fn new(config: RelayConfig) -> Self {
        Self { config }
    }

    fn bucket(&self) -> Arc<dyn Bucket> {
        match &self.config.storage {
            StorageBackend::Local { path } => {
                tracing::info!("Storing uploads in {}", path.display());
                Arc::new(LocalBucket::new(path.clone()))
            }
            StorageBackend::Memory => {
                tracing::warn!("Storing uploads in memory; they are lost on restart");
                Arc::new(MemoryBucket::new())
            }
        }
    }

    /// Serve until the process exits.
    pub async fn start(self) -> Result<(), ServerError> {
        let host_port = format!("{}:{}", self.config.host, self.config.port);
        let addr: SocketAddr = host_port
            .parse()
            .map_err(|_| ServerError::InvalidAddress(host_port.clone()))?;

        let missing = self.config.missing_email_settings();
        if !missing.is_empty() {
            tracing::warn!(
                "Email settings missing ({}); submissions will fail",
                missing.join(", ")
            );
        }
        if self.config.allowed_origins.is_empty() {
            tracing::warn!("No allowed origins configured; browsers on other origins are refused");
        }
        tracing::warn!("Download tokens are unsigned; links are unlisted, not access controlled");

        let mailer = ResendMailer::new(&self.config.email.api_base, &self.config.email.api_key)
            .map_err(|e| ServerError::Setup(format!("email client: {}", e)))?;
        let bucket = self.bucket();
        let state = AppState::new(self.config, bucket, Arc::new(mailer))?;
        let app = router(state);

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::BindError(addr, e.to_string()))?;

        tracing::info!("Relay listening on http://{}", addr);

        axum::serve(listener, app)
            .await
            .map_err(|e| ServerError::BindError(addr, e.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mailer::{MailError, OutgoingEmail};
    use crate::token::DownloadToken;
    use async_trait::async_trait;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
        response::Response,
    };
    use base64::{engine::general_purpose::STANDARD, Engine};
    use bytes::Bytes;
    use pretty_assertions::assert_eq;
    use tokio::sync::Mutex;
    use tower::ServiceExt;

    const ORIGIN: &str = "https://novaseipress.com";

    #[derive(Default)]
    struct RecordingMailer {
        sent: Mutex<Vec<OutgoingEmail>>,
        fail: bool,
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, email: &OutgoingEmail) -> Result<(), MailError> {
            self.sent.lock().await.push(email.clone());
            if self.fail {
                return Err(MailError::Rejected {
                    status: 500,
                    body: "upstream down".to_string(),
                });
            }
            Ok(())
        }
    }

    struct Harness {
        app: Router,
        bucket: Arc<MemoryBucket>,
        mailer: Arc<RecordingMailer>,
    }

    fn harness_with(mailer: RecordingMailer) -> Harness {
        let mut config = RelayConfig {
            allowed_origins: vec![ORIGIN.to_string()],
            public_url: Some("https://relay.example".to_string()),
            storage: StorageBackend::Memory,
            ..Default::default()
        };
        config.email.sender = "forms@example.com".to_string();
        config.email.recipient = "owner@example.com".to_string();

        let bucket = Arc::new(MemoryBucket::new());
        let mailer = Arc::new(mailer);
        let state = AppState::new(config, bucket.clone(), mailer.clone()).unwrap();

        Harness {
            app: router(state),
            bucket,
            mailer,
        }
    }

    fn harness() -> Harness {
        harness_with(RecordingMailer::default())
    }

    async fn call(app: &Router, request: Request<Body>) -> Response {
        app.clone().oneshot(request).await.unwrap()
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    async fn json(response: Response) -> serde_json::Value {
        serde_json::from_str(&text(response).await).unwrap()
    }

    fn submission(form_type: &str) -> serde_json::Value {
        serde_json::json!({
            "formType": form_type,
            "firstName": "Ada",
            "lastName": "Lovelace",
            "email": "ada@example.com",
            "message": "Please review chapter one.",
        })
    }

    fn token_for(key: &str, file_name: &str, expiry: i64) -> String {
        let raw = serde_json::json!({ "key": key, "fileName": file_name, "expiry": expiry });
        STANDARD.encode(raw.to_string())
    }

    #[tokio::test]
    async fn submission_missing_field_sends_nothing() {
        let h = harness();
        let mut body = submission("general");
        body.as_object_mut().unwrap().remove("lastName");

        let response = call(&h.app, post_json("/api/submit", body)).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json(response).await["error"], "Missing required fields");
        assert!(h.mailer.sent.lock().await.is_empty());
    }

    #[tokio::test]
    async fn malformed_submission_body_is_rejected() {
        let h = harness();
        let request = Request::post("/api/submit")
            .body(Body::from("{not json"))
            .unwrap();

        let response = call(&h.app, request).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json(response).await["error"], "Invalid request body");
    }

    #[tokio::test]
    async fn quote_without_service_is_rejected() {
        let h = harness();

        let response = call(&h.app, post_json("/api/submit", submission("quote"))).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            json(response).await["error"],
            "Service selection is required for quote requests"
        );
        assert!(h.mailer.sent.lock().await.is_empty());
    }

    #[tokio::test]
    async fn invalid_email_is_rejected() {
        let h = harness();
        let mut body = submission("general");
        body["email"] = "not-an-address".into();

        let response = call(&h.app, post_json("/api/submit", body)).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json(response).await["error"], "Invalid email format");
    }

    #[tokio::test]
    async fn submission_without_file_sends_two_emails() {
        let h = harness();

        let response = call(&h.app, post_json("/api/submit", submission("general"))).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json(response).await, serde_json::json!({ "success": true }));

        let sent = h.mailer.sent.lock().await;
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].to, vec!["owner@example.com"]);
        assert_eq!(sent[0].subject, "New Inquiry from Ada Lovelace");
        assert_eq!(sent[0].reply_to.as_deref(), Some("ada@example.com"));
        assert_eq!(sent[1].to, vec!["ada@example.com"]);
        assert_eq!(sent[1].subject, "We received your message - Nova Sei Press");
        assert!(sent.iter().all(|e| !e.html.contains("download?token")));
        assert!(!sent[0].html.contains("Attached File"));
    }

    #[tokio::test]
    async fn quote_with_file_links_download() {
        let h = harness();
        let mut body = submission("quote");
        body["service"] = "editing".into();
        body["fileKey"] = "uploads/1-abcdef-book.pdf".into();
        body["fileName"] = "book.pdf".into();

        let response = call(&h.app, post_json("/api/submit", body)).await;

        assert_eq!(response.status(), StatusCode::OK);
        let sent = h.mailer.sent.lock().await;
        assert_eq!(sent[0].subject, "New Quote Request from Ada Lovelace");
        assert!(sent[0].html.contains("Download: book.pdf"));
        assert!(sent[0].html.contains("Editing"));
        assert!(!sent[1].html.contains("Download: book.pdf"));
    }

    #[tokio::test]
    async fn email_failure_is_generic_500() {
        let h = harness_with(RecordingMailer {
            fail: true,
            ..Default::default()
        });

        let response = call(&h.app, post_json("/api/submit", submission("review"))).await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json(response).await["error"], "Internal server error");
        assert_eq!(h.mailer.sent.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn issues_upload_slot() {
        let h = harness();

        let response = call(
            &h.app,
            post_json(
                "/api/get-upload-url",
                serde_json::json!({ "filename": "My Draft.docx", "size": 2048 }),
            ),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let key = json(response).await["key"].as_str().unwrap().to_string();
        assert!(key.starts_with("uploads/"));
        assert!(key.ends_with("-My_Draft.docx"));
    }

    #[tokio::test]
    async fn rejects_bad_slot_requests() {
        let h = harness();

        let response = call(
            &h.app,
            post_json(
                "/api/get-upload-url",
                serde_json::json!({ "filename": "cover.png", "size": 10 }),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            json(response).await["error"],
            "Invalid file type. Allowed: pdf, docx, pages"
        );

        let response = call(
            &h.app,
            post_json(
                "/api/get-upload-url",
                serde_json::json!({ "filename": "book.pdf", "size": 11 * 1024 * 1024 }),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            json(response).await["error"],
            "File too large. Maximum size: 10MB"
        );
    }

    #[tokio::test]
    async fn upload_then_download() {
        let h = harness();

        let request = Request::put("/api/upload?key=uploads/1-abcdef-book.pdf")
            .header("content-type", "application/pdf")
            .body(Body::from("%PDF-1.7"))
            .unwrap();
        let response = call(&h.app, request).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json(response).await, serde_json::json!({ "success": true }));
        assert_eq!(h.bucket.keys().await, vec!["uploads/1-abcdef-book.pdf"]);

        let token = DownloadToken::issue(
            "uploads/1-abcdef-book.pdf",
            "My \"Book\".pdf",
            chrono::Utc::now().timestamp_millis(),
            chrono::Duration::days(30),
        );
        let uri = format!(
            "/api/download?token={}",
            urlencoding::encode(&token.encode())
        );
        let response = call(&h.app, Request::get(uri).body(Body::empty()).unwrap()).await;

        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers[header::CONTENT_TYPE], "application/pdf");
        assert_eq!(
            headers[header::CONTENT_DISPOSITION],
            "attachment; filename=\"My _Book_.pdf\""
        );
        assert_eq!(headers[header::CONTENT_LENGTH], "8");
        assert_eq!(text(response).await, "%PDF-1.7");
    }

    #[tokio::test]
    async fn upload_defaults_content_type() {
        let h = harness();

        let request = Request::put("/api/upload?key=uploads/raw.pages")
            .body(Body::from("bytes"))
            .unwrap();
        let response = call(&h.app, request).await;
        assert_eq!(response.status(), StatusCode::OK);

        let stored = h.bucket.get("uploads/raw.pages").await.unwrap().unwrap();
        assert_eq!(stored.content_type.as_deref(), Some("application/octet-stream"));
    }

    #[tokio::test]
    async fn upload_rejects_bad_keys() {
        let h = harness();

        for uri in [
            "/api/upload",
            "/api/upload?key=other/a.pdf",
            "/api/upload?key=uploads/../secrets",
        ] {
            let request = Request::put(uri).body(Body::from("x")).unwrap();
            let response = call(&h.app, request).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", uri);
            assert_eq!(json(response).await["error"], "Invalid key");
        }
        assert!(h.bucket.keys().await.is_empty());
    }

    #[tokio::test]
    async fn upload_rejects_oversized_body() {
        let h = harness();
        let body = vec![0u8; 10 * 1024 * 1024 + 1];

        let request = Request::put("/api/upload?key=uploads/big.pdf")
            .body(Body::from(body))
            .unwrap();
        let response = call(&h.app, request).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json(response).await["error"], "File too large");
        assert!(h.bucket.keys().await.is_empty());
    }

    #[tokio::test]
    async fn upload_accepts_body_at_ceiling() {
        let h = harness();
        let body = vec![0u8; 10 * 1024 * 1024];

        let request = Request::put("/api/upload?key=uploads/exact.pdf")
            .body(Body::from(body))
            .unwrap();
        let response = call(&h.app, request).await;

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn download_errors() {
        let h = harness();
        let now = chrono::Utc::now().timestamp_millis();

        let response = call(&h.app, Request::get("/api/download").body(Body::empty()).unwrap()).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(text(response).await, "Missing token");

        let response = call(
            &h.app,
            Request::get("/api/download?token=not-a-token!")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(text(response).await, "Invalid token");

        let expired = token_for("uploads/a.pdf", "a.pdf", now - 1);
        let uri = format!("/api/download?token={}", urlencoding::encode(&expired));
        let response = call(&h.app, Request::get(uri).body(Body::empty()).unwrap()).await;
        assert_eq!(response.status(), StatusCode::GONE);
        assert_eq!(text(response).await, "Download link has expired");

        let missing = token_for("uploads/none.pdf", "none.pdf", now + 60_000);
        let uri = format!("/api/download?token={}", urlencoding::encode(&missing));
        let response = call(&h.app, Request::get(uri).body(Body::empty()).unwrap()).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(text(response).await, "File not found");
    }

    #[tokio::test]
    async fn unknown_routes_are_404() {
        let h = harness();

        let response = call(&h.app, Request::get("/nope").body(Body::empty()).unwrap()).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(text(response).await, "Not Found");

        let response = call(&h.app, Request::get("/api/submit").body(Body::empty()).unwrap()).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn preflight_from_allowed_origin() {
        let h = harness();

        let request = Request::options("/api/submit")
            .header("origin", ORIGIN)
            .header("access-control-request-method", "POST")
            .body(Body::empty())
            .unwrap();
        let response = call(&h.app, request).await;

        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers["access-control-allow-origin"], ORIGIN);
        assert_eq!(headers["access-control-max-age"], "86400");
        let methods = headers["access-control-allow-methods"].to_str().unwrap();
        for method in ["GET", "POST", "PUT", "OPTIONS"] {
            assert!(methods.contains(method), "{}", methods);
        }
    }

    #[tokio::test]
    async fn bare_options_is_answered_by_cors() {
        let h = harness();

        for uri in ["/nope", "/api/submit"] {
            let request = Request::options(uri).body(Body::empty()).unwrap();
            let response = call(&h.app, request).await;

            assert_eq!(response.status(), StatusCode::OK, "{}", uri);
            assert_eq!(text(response).await, "");
        }
    }

    #[tokio::test]
    async fn foreign_origin_gets_no_allow_origin() {
        let h = harness();

        let request = Request::options("/api/submit")
            .header("origin", "https://evil.example")
            .header("access-control-request-method", "POST")
            .body(Body::empty())
            .unwrap();
        let response = call(&h.app, request).await;

        assert!(response.headers().get("access-control-allow-origin").is_none());

        let request = Request::get("/healthz")
            .header("origin", "https://evil.example")
            .body(Body::empty())
            .unwrap();
        let response = call(&h.app, request).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get("access-control-allow-origin").is_none());
    }

    #[tokio::test]
    async fn allowed_origin_on_simple_request() {
        let h = harness();

        let request = Request::get("/healthz")
            .header("origin", ORIGIN)
            .body(Body::empty())
            .unwrap();
        let response = call(&h.app, request).await;

        assert_eq!(response.headers()["access-control-allow-origin"], ORIGIN);
        assert_eq!(text(response).await, "ok");
    }

    #[tokio::test]
    async fn download_url_falls_back_to_request_host() {
        let mut config = RelayConfig {
            storage: StorageBackend::Memory,
            ..Default::default()
        };
        config.email.recipient = "owner@example.com".to_string();
        let mailer = Arc::new(RecordingMailer::default());
        let state = AppState::new(config, Arc::new(MemoryBucket::new()), mailer.clone()).unwrap();
        let app = router(state);

        let mut body = submission("general");
        body["fileKey"] = "uploads/1-abcdef-a.pdf".into();
        body["fileName"] = "a.pdf".into();
        let request = Request::post("/api/submit")
            .header("host", "forms.example")
            .header("x-forwarded-proto", "https")
            .body(Body::from(body.to_string()))
            .unwrap();

        let response = call(&app, request).await;

        assert_eq!(response.status(), StatusCode::OK);
        let sent = mailer.sent.lock().await;
        // `/` is HTML-escaped in rendered values
        assert!(sent[0].html.contains("https:&#x2f;&#x2f;forms.example&#x2f;api&#x2f;download?token="));
    }

    #[tokio::test]
    async fn stored_bytes_survive_round_trip() {
        let h = harness();
        h.bucket
            .put("uploads/direct.docx", Bytes::from_static(b"docx"), "application/msword")
            .await
            .unwrap();

        let token = token_for(
            "uploads/direct.docx",
            "direct.docx",
            chrono::Utc::now().timestamp_millis() + 60_000,
        );
        let uri = format!("/api/download?token={}", urlencoding::encode(&token));
        let response = call(&h.app, Request::get(uri).body(Body::empty()).unwrap()).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/msword");
        assert_eq!(text(response).await, "docx");
    }
}
