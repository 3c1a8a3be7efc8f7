//! Template engine for rendering pages and layouts.

use std::fs;
use std::path::{Path, PathBuf};

use minijinja::{AutoEscape, Environment, Error, ErrorKind, Value};
use novasei_pages::{extract_frontmatter, Frontmatter};

/// An entry of `collections.all`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CollectionItem {
    /// Page URL
    pub url: String,
    /// Page title (empty when the page has none)
    pub title: String,
    /// Frontmatter description
    pub description: Option<String>,
}

/// Template engine using minijinja.
///
/// Named templates resolve against the layouts directory first and the
/// includes directory second. Frontmatter is stripped from loaded templates.
pub struct TemplateEngine {
    env: Environment<'static>,
    search_dirs: Vec<PathBuf>,
}

impl TemplateEngine {
    /// Create a template engine loading from the given directories.
    pub fn new(layouts_dir: PathBuf, includes_dir: PathBuf) -> Self {
        let search_dirs = vec![layouts_dir, includes_dir];

        let mut env = Environment::new();
        env.set_auto_escape_callback(|_| AutoEscape::Html);
        env.set_trim_blocks(true);

        let loader_dirs = search_dirs.clone();
        env.set_loader(move |name| load_template(&loader_dirs, name));

        Self { env, search_dirs }
    }

    /// Register a global variable visible to every template.
    pub fn add_global(&mut self, name: impl Into<String>, value: Value) {
        self.env.add_global(name.into(), value);
    }

    /// Render a page body.
    ///
    /// `name` is only used in error messages.
    pub fn render_body(&self, name: &str, source: &str, ctx: &Value) -> Result<String, Error> {
        self.env.render_named_str(name, source, ctx)
    }

    /// Render a named layout or include.
    pub fn render_template(&self, name: &str, ctx: &Value) -> Result<String, Error> {
        self.env.get_template(name)?.render(ctx)
    }

    /// Read the frontmatter of a named layout.
    pub fn layout_frontmatter(&self, name: &str) -> Result<Frontmatter, Error> {
        let Some(path) = resolve(&self.search_dirs, name) else {
            return Err(Error::new(
                ErrorKind::TemplateNotFound,
                format!("layout not found: {}", name),
            ));
        };

        let source = read_source(&path)?;
        let (frontmatter, _) = extract_frontmatter(&source)
            .map_err(|e| Error::new(ErrorKind::SyntaxError, e.to_string()))?;

        Ok(frontmatter.unwrap_or_default())
    }
}

/// Find a template file in the search directories.
fn resolve(dirs: &[PathBuf], name: &str) -> Option<PathBuf> {
    if name.split(['/', '\\']).any(|part| part == "..") {
        return None;
    }

    dirs.iter().map(|dir| dir.join(name)).find(|p| p.is_file())
}

fn read_source(path: &Path) -> Result<String, Error> {
    fs::read_to_string(path).map_err(|e| {
        Error::new(
            ErrorKind::InvalidOperation,
            format!("failed to read template {}", path.display()),
        )
        .with_source(e)
    })
}

fn load_template(dirs: &[PathBuf], name: &str) -> Result<Option<String>, Error> {
    let Some(path) = resolve(dirs, name) else {
        return Ok(None);
    };

    let source = read_source(&path)?;
    let (_, body) = extract_frontmatter(&source)
        .map_err(|e| Error::new(ErrorKind::SyntaxError, e.to_string()))?;

    Ok(Some(body.to_string()))
}
