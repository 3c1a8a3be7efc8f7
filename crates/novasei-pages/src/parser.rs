//! Page source parser.

use pulldown_cmark::{html, Options, Parser};

use crate::format::TemplateFormat;
use crate::frontmatter::{extract_frontmatter, Frontmatter, FrontmatterError};

/// A parsed page source.
#[derive(Debug, Clone)]
pub struct PageSource {
    /// Template format of the body
    pub format: TemplateFormat,

    /// Frontmatter (empty when the source has none)
    pub frontmatter: Frontmatter,

    /// Template body without the frontmatter block
    pub body: String,
}

impl PageSource {
    /// Title from frontmatter, if any.
    pub fn title(&self) -> Option<&str> {
        self.frontmatter.title.as_deref()
    }

    /// Layout requested by the page, if any.
    pub fn layout(&self) -> Option<&str> {
        self.frontmatter.layout.as_deref()
    }
}

/// Errors that can occur when parsing a page.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Frontmatter error: {0}")]
    Frontmatter(#[from] FrontmatterError),
}

/// Parse a page source of the given format.
pub fn parse_page(source: &str, format: TemplateFormat) -> Result<PageSource, ParseError> {
    let (frontmatter, body) = extract_frontmatter(source)?;

    Ok(PageSource {
        format,
        frontmatter: frontmatter.unwrap_or_default(),
        body: body.to_string(),
    })
}

/// Render markdown to HTML.
///
/// Raw HTML inside the markdown is passed through untouched.
pub fn render_markdown(content: &str) -> String {
    let options = Options::ENABLE_TABLES
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
        | Options::ENABLE_HEADING_ATTRIBUTES;

    let parser = Parser::new_ext(content, options);

    let mut html_output = String::new();
    html::push_html(&mut html_output, parser);

    html_output
}
