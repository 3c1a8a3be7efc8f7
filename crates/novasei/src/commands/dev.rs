//! Development server command.

use anyhow::Result;
use novasei_site::{DevServer, DevServerConfig};

use crate::config::ConfigFile;

/// Run the dev server.
pub async fn run(file_config: ConfigFile, port: u16, open: bool) -> Result<()> {
    tracing::info!("Starting development server on port {}", port);

    let config = DevServerConfig {
        build: file_config.site.build_config(),
        port,
        open,
        ..Default::default()
    };

    DevServer::new(config).start().await?;

    Ok(())
}
