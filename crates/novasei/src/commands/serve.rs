//! Preview server command.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use axum::Router;
use tower_http::services::ServeDir;

use crate::config::ConfigFile;

/// Run the serve command.
pub async fn run(file_config: ConfigFile, port: u16, dir: Option<PathBuf>) -> Result<()> {
    let dir = dir.unwrap_or(file_config.site.output);

    if !dir.exists() {
        anyhow::bail!(
            "Directory not found: {}. Run 'novasei build' first.",
            dir.display()
        );
    }

    let addr: SocketAddr = format!("127.0.0.1:{}", port)
        .parse()
        .context("Invalid address")?;

    tracing::info!("Serving {} at http://{}", dir.display(), addr);

    let app = Router::new().fallback_service(ServeDir::new(&dir));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    let url = format!("http://{}", addr);
    let _ = open::that(&url);

    axum::serve(listener, app).await?;

    Ok(())
}
