//! Configuration file structure (novasei.toml).

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use novasei_relay::RelayConfig;
use novasei_site::BuildConfig;
use serde::Deserialize;

#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub relay: RelayConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    pub input: PathBuf,
    pub output: PathBuf,
    pub title: String,
    pub base_url: String,
    /// Absolute public URL; enables sitemap.xml and robots.txt
    pub url: Option<String>,
    pub minify: bool,
    pub passthrough: Vec<String>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        let build = BuildConfig::default();
        Self {
            input: build.input_dir,
            output: build.output_dir,
            title: build.title,
            base_url: build.base_url,
            url: build.site_url,
            minify: build.minify,
            passthrough: build.passthrough,
        }
    }
}

impl SiteConfig {
    pub fn build_config(&self) -> BuildConfig {
        BuildConfig {
            input_dir: self.input.clone(),
            output_dir: self.output.clone(),
            title: self.title.clone(),
            base_url: self.base_url.clone(),
            site_url: self.url.clone(),
            minify: self.minify,
            passthrough: self.passthrough.clone(),
            ..Default::default()
        }
    }
}

/// Load configuration from `path` if it exists.
/// Returns an error if the config file exists but is malformed.
pub fn load(path: &Path) -> Result<ConfigFile> {
    if !path.exists() {
        tracing::debug!("No {} found, using defaults", path.display());
        return Ok(ConfigFile::default());
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let config: ConfigFile = toml::from_str(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;

    tracing::info!("Loaded config from {}", path.display());
    Ok(config)
}
