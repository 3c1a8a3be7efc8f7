//! Page source parsing for the novasei site builder.
//!
//! This crate splits page sources into YAML frontmatter and a template body,
//! detects the template format from the file extension, and renders markdown.

pub mod format;
pub mod frontmatter;
pub mod parser;

pub use format::TemplateFormat;
pub use frontmatter::{extract_frontmatter, Frontmatter, FrontmatterError, Permalink};
pub use parser::{parse_page, render_markdown, PageSource, ParseError};
