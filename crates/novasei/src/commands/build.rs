//! Static site build command.

use std::path::PathBuf;

use anyhow::Result;
use novasei_site::StaticBuilder;

use crate::config::ConfigFile;

/// Run the build command.
pub async fn run(file_config: ConfigFile, output: Option<PathBuf>, minify: Option<bool>) -> Result<()> {
    tracing::info!("Building static site...");

    let mut config = file_config.site.build_config();
    if let Some(output) = output {
        config.output_dir = output;
    }
    if let Some(minify) = minify {
        config.minify = minify;
    }

    let result = StaticBuilder::new(config).build().await?;

    tracing::info!(
        "Built {} pages and copied {} files in {}ms",
        result.pages,
        result.copied,
        result.duration_ms
    );

    tracing::info!("Output: {}", result.output_dir.display());

    Ok(())
}
