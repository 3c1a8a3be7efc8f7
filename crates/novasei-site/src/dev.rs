//! Development server: build, serve, watch, rebuild, reload.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use tower_http::services::ServeDir;

use crate::builder::{BuildConfig, StaticBuilder};
use crate::reload::{ReloadHub, ReloadMessage};
use crate::watcher::{FileWatcher, WatchEvent};

/// Path of the live reload WebSocket.
pub const RELOAD_PATH: &str = "/__reload";

/// Configuration for the development server.
#[derive(Debug, Clone)]
pub struct DevServerConfig {
    /// Site build settings
    pub build: BuildConfig,

    /// Port to listen on
    pub port: u16,

    /// Host to bind to
    pub host: String,

    /// Open browser on start
    pub open: bool,
}

impl Default for DevServerConfig {
    fn default() -> Self {
        Self {
            build: BuildConfig::default(),
            port: 8080,
            host: "127.0.0.1".to_string(),
            open: true,
        }
    }
}

/// Errors that can occur with the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Invalid address {0}")]
    InvalidAddress(String),

    #[error("Failed to bind to {0}: {1}")]
    BindError(SocketAddr, String),

    #[error("File watch error: {0}")]
    WatchError(String),

    #[error("Build error: {0}")]
    BuildError(#[from] crate::builder::BuildError),
}

/// Development server.
pub struct DevServer {
    config: DevServerConfig,
}

impl DevServer {
    /// Create a new development server.
    pub fn new(config: DevServerConfig) -> Self {
        Self { config }
    }

    /// Build the site, then serve and rebuild it until the process exits.
    pub async fn start(self) -> Result<(), ServerError> {
        let host_port = format!("{}:{}", self.config.host, self.config.port);
        let addr: SocketAddr = host_port
            .parse()
            .map_err(|_| ServerError::InvalidAddress(host_port.clone()))?;

        let mut build = self.config.build.clone();
        build.live_reload = Some(RELOAD_PATH.to_string());
        let output_dir = build.output_dir.clone();
        let input_dir = build.input_dir.clone();

        let builder = Arc::new(StaticBuilder::new(build));
        let result = builder.build().await?;
        tracing::info!("Built {} pages in {}ms", result.pages, result.duration_ms);

        let hub = ReloadHub::new();

        let (watcher, mut rx) = FileWatcher::new(&[input_dir], Some(output_dir.clone()))
            .map_err(|e| ServerError::WatchError(e.to_string()))?;

        let rebuild_hub = hub.clone();
        let rebuild_builder = Arc::clone(&builder);
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                rebuild(&rebuild_builder, &rebuild_hub, event).await;
            }
            // Keep watcher alive
            drop(watcher);
        });

        let app = Router::new()
            .route(RELOAD_PATH, get(ws_handler))
            .with_state(hub)
            .fallback_service(ServeDir::new(&output_dir));

        tracing::info!("Starting dev server at http://{}", addr);

        if self.config.open {
            let url = format!("http://{}", addr);
            let _ = open::that(&url);
        }

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::BindError(addr, e.to_string()))?;

        axum::serve(listener, app)
            .await
            .map_err(|e| ServerError::BindError(addr, e.to_string()))?;

        Ok(())
    }
}

/// Rebuild the site after a change and notify pages.
async fn rebuild(builder: &StaticBuilder, hub: &ReloadHub, event: WatchEvent) {
    tracing::info!("Changed: {}", event.path().display());

    match builder.build().await {
        Ok(result) => {
            tracing::info!("Rebuilt {} pages in {}ms", result.pages, result.duration_ms);
            hub.send(ReloadMessage::Reload);
        }
        Err(e) => {
            tracing::warn!("Rebuild failed: {}", e);
            hub.send(ReloadMessage::BuildFailed {
                error: e.to_string(),
            });
        }
    }
}

/// Handler for the reload WebSocket endpoint.
async fn ws_handler(ws: WebSocketUpgrade, State(hub): State<ReloadHub>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws(socket, hub))
}

/// Forward reload messages to one connected page.
async fn handle_ws(mut socket: WebSocket, hub: ReloadHub) {
    let mut rx = hub.subscribe();

    if send_json(&mut socket, &ReloadMessage::Connected).await.is_err() {
        return;
    }

    while let Ok(msg) = rx.recv().await {
        if send_json(&mut socket, &msg).await.is_err() {
            break;
        }
    }
}

async fn send_json(socket: &mut WebSocket, msg: &ReloadMessage) -> Result<(), ()> {
    let json = serde_json::to_string(msg).map_err(|_| ())?;
    socket.send(Message::Text(json.into())).await.map_err(|_| ())
}
