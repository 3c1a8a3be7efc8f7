//! Template format detection.

use std::path::Path;

/// Source format of a page template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateFormat {
    /// Plain HTML, rendered through the template engine
    Html,
    /// Nunjucks-style template
    Nunjucks,
    /// Markdown, rendered through the template engine and then to HTML
    Markdown,
}

impl TemplateFormat {
    /// Detect the format from a file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "html" | "htm" => Some(Self::Html),
            "njk" => Some(Self::Nunjucks),
            "md" | "markdown" => Some(Self::Markdown),
            _ => None,
        }
    }

    /// Detect the format of a file path.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    /// Whether the rendered body still needs markdown conversion.
    pub fn is_markdown(&self) -> bool {
        matches!(self, Self::Markdown)
    }
}
