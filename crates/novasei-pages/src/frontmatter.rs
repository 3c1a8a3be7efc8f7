//! Frontmatter extraction and parsing.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Where a page is written in the output tree.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(untagged)]
pub enum Permalink {
    /// Explicit URL path such as `/contact/` or `/404.html`
    Path(String),
    /// `false` renders the page without writing it
    Enabled(bool),
}

/// Parsed frontmatter of a page or layout.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct Frontmatter {
    /// Page title
    #[serde(default)]
    pub title: Option<String>,

    /// Page description for SEO
    #[serde(default)]
    pub description: Option<String>,

    /// Layout template wrapping this page
    #[serde(default)]
    pub layout: Option<String>,

    /// Output location override
    #[serde(default)]
    pub permalink: Option<Permalink>,

    /// Sort order in collections (lower = first)
    #[serde(default)]
    pub order: Option<i32>,

    /// Leave the page out of `collections.all`
    #[serde(default)]
    pub exclude: bool,

    /// Any other keys, exposed to templates as-is
    #[serde(flatten)]
    pub data: BTreeMap<String, serde_yaml::Value>,
}

impl Frontmatter {
    /// Whether the page should be written to disk.
    pub fn writes_output(&self) -> bool {
        !matches!(self.permalink, Some(Permalink::Enabled(false)))
    }

    /// The explicit permalink path, if one was given.
    pub fn permalink_path(&self) -> Option<&str> {
        match &self.permalink {
            Some(Permalink::Path(path)) => Some(path.as_str()),
            _ => None,
        }
    }
}

/// Extract frontmatter from a page source.
///
/// Returns the parsed frontmatter and the remaining content after the frontmatter block.
pub fn extract_frontmatter(source: &str) -> Result<(Option<Frontmatter>, &str), FrontmatterError> {
    let trimmed = source.trim_start();

    if !trimmed.starts_with("---") {
        return Ok((None, source));
    }

    let after_open = &trimmed[3..];
    let Some(close_pos) = after_open.find("\n---") else {
        return Err(FrontmatterError::Unclosed);
    };

    let yaml_content = after_open[..close_pos].trim();
    let remaining = &after_open[close_pos + 4..];

    let frontmatter = if yaml_content.is_empty() {
        Frontmatter::default()
    } else {
        serde_yaml::from_str(yaml_content)
            .map_err(|e| FrontmatterError::InvalidYaml(e.to_string()))?
    };

    Ok((Some(frontmatter), remaining.trim_start()))
}

/// Errors that can occur when parsing frontmatter.
#[derive(Debug, thiserror::Error)]
pub enum FrontmatterError {
    #[error("Unclosed frontmatter block - missing closing ---")]
    Unclosed,

    #[error("Invalid YAML in frontmatter: {0}")]
    InvalidYaml(String),
}
