//! Form relay command.

use anyhow::Result;
use novasei_relay::RelayServer;

use crate::config::ConfigFile;

/// Run the relay until the process exits.
pub async fn run(file_config: ConfigFile, port: Option<u16>) -> Result<()> {
    let mut config = file_config.relay;
    config.apply_env_overrides();
    if let Some(port) = port {
        config.port = port;
    }

    tracing::info!(
        "Starting relay for {} allowed origin(s)",
        config.allowed_origins.len()
    );

    RelayServer::new(config).start().await?;

    Ok(())
}
