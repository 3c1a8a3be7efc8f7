//! Static site builder.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::time::Instant;

use minijinja::Value;
use rayon::prelude::*;
use walkdir::WalkDir;

use novasei_pages::{parse_page, render_markdown, PageSource, TemplateFormat};

use crate::assets::{reload_client_script, AssetPipeline};
use crate::data::load_global_data;
use crate::templates::{CollectionItem, TemplateEngine};

/// Maximum depth of a layout chain.
const MAX_LAYOUT_DEPTH: usize = 10;

/// Configuration for building a static site.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Source directory
    pub input_dir: PathBuf,

    /// Output directory
    pub output_dir: PathBuf,

    /// Includes directory, relative to the input directory
    pub includes_dir: String,

    /// Layouts directory, relative to the input directory
    pub layouts_dir: String,

    /// Global data directory, relative to the input directory
    pub data_dir: String,

    /// Files and directories copied verbatim, relative to the input directory
    pub passthrough: Vec<String>,

    /// Minify copied stylesheets
    pub minify: bool,

    /// Base URL path the site is mounted at
    pub base_url: String,

    /// Site title
    pub title: String,

    /// Absolute site URL, used for the sitemap
    pub site_url: Option<String>,

    /// WebSocket path for the live reload client; `None` outside `dev`
    pub live_reload: Option<String>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("site/src"),
            output_dir: PathBuf::from("site/_site"),
            includes_dir: "_includes".to_string(),
            layouts_dir: "_layouts".to_string(),
            data_dir: "_data".to_string(),
            passthrough: vec!["css".to_string(), "images".to_string(), "js".to_string()],
            minify: true,
            base_url: "/".to_string(),
            title: "Nova Sei Press".to_string(),
            site_url: None,
            live_reload: None,
        }
    }
}

/// Result of a build operation.
#[derive(Debug)]
pub struct BuildResult {
    /// Number of pages written
    pub pages: usize,

    /// Number of passthrough files copied
    pub copied: usize,

    /// Total build time in milliseconds
    pub duration_ms: u64,

    /// Output directory
    pub output_dir: PathBuf,
}

/// Errors that can occur during build.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Failed to read source: {0}")]
    ReadError(String),

    #[error("Failed to parse page: {path}: {message}")]
    ParseError { path: String, message: String },

    #[error("Failed to load global data: {0}")]
    DataError(#[from] crate::data::DataError),

    #[error("Failed to render {path}: {message}")]
    TemplateError { path: String, message: String },

    #[error("Layout chain too deep or cyclic in {0}")]
    LayoutCycle(String),

    #[error("Invalid permalink in {path}: {permalink}")]
    InvalidPermalink { path: String, permalink: String },

    #[error("Failed to write output: {0}")]
    WriteError(String),
}

/// A page to be built.
#[derive(Debug)]
struct PageInfo {
    /// Path relative to the input directory
    relative_path: PathBuf,

    /// Output path, `None` when the page is not written
    output_path: Option<PathBuf>,

    /// Page URL
    url: String,

    /// Parsed source
    source: PageSource,
}

impl PageInfo {
    fn order(&self) -> i32 {
        self.source.frontmatter.order.unwrap_or(999)
    }
}

/// Static site builder.
pub struct StaticBuilder {
    config: BuildConfig,
}

impl StaticBuilder {
    /// Create a new static builder.
    pub fn new(config: BuildConfig) -> Self {
        Self { config }
    }

    /// The builder configuration.
    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// Build the static site.
    pub async fn build(&self) -> Result<BuildResult, BuildError> {
        let start = Instant::now();

        fs::create_dir_all(&self.config.output_dir)
            .map_err(|e| BuildError::WriteError(e.to_string()))?;

        let pages = self.discover_pages()?;
        let templates = self.template_engine(&pages)?;

        let results: Vec<Result<usize, BuildError>> = pages
            .par_iter()
            .map(|page| self.build_page(page, &templates))
            .collect();

        let mut total_pages = 0;
        for result in results {
            total_pages += result?;
        }

        let copied = self.copy_passthrough()?;

        if self.config.site_url.is_some() {
            self.generate_sitemap(&pages)?;
        }

        let duration = start.elapsed();

        Ok(BuildResult {
            pages: total_pages,
            copied,
            duration_ms: duration.as_millis() as u64,
            output_dir: self.config.output_dir.clone(),
        })
    }

    /// Discover all template pages in the input directory.
    fn discover_pages(&self) -> Result<Vec<PageInfo>, BuildError> {
        let mut pages = Vec::new();

        if !self.config.input_dir.exists() {
            return Err(BuildError::ReadError(format!(
                "Input directory not found: {}",
                self.config.input_dir.display()
            )));
        }

        for entry in WalkDir::new(&self.config.input_dir)
            .follow_links(true)
            .into_iter()
            .filter_entry(|e| !is_private(e.path(), &self.config.input_dir))
            .filter_map(|e| e.ok())
        {
            let path = entry.path();

            if !path.is_file() {
                continue;
            }

            let relative_path = path
                .strip_prefix(&self.config.input_dir)
                .unwrap_or(path)
                .to_path_buf();

            if self.is_passthrough(&relative_path) {
                continue;
            }

            let Some(format) = TemplateFormat::from_path(path) else {
                continue;
            };

            let content = fs::read_to_string(path)
                .map_err(|e| BuildError::ReadError(format!("{}: {}", path.display(), e)))?;

            let source = parse_page(&content, format).map_err(|e| BuildError::ParseError {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;

            let output_path = self.calculate_output_path(&relative_path, &source)?;
            let url = match &output_path {
                Some(out) => self.path_to_url(out),
                None => String::new(),
            };

            pages.push(PageInfo {
                relative_path,
                output_path,
                url,
                source,
            });
        }

        pages.sort_by(|a, b| a.order().cmp(&b.order()).then_with(|| a.url.cmp(&b.url)));

        Ok(pages)
    }

    fn is_passthrough(&self, relative: &Path) -> bool {
        self.config
            .passthrough
            .iter()
            .any(|p| relative.starts_with(p.trim_matches('/')))
    }

    /// Calculate output path for a page.
    fn calculate_output_path(
        &self,
        relative: &Path,
        source: &PageSource,
    ) -> Result<Option<PathBuf>, BuildError> {
        let frontmatter = &source.frontmatter;

        if !frontmatter.writes_output() {
            return Ok(None);
        }

        if let Some(permalink) = frontmatter.permalink_path() {
            let trimmed = permalink.trim_start_matches('/');
            let escapes = Path::new(trimmed)
                .components()
                .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
            if escapes {
                return Err(BuildError::InvalidPermalink {
                    path: relative.display().to_string(),
                    permalink: permalink.to_string(),
                });
            }

            let out = if trimmed.is_empty() || permalink.ends_with('/') {
                self.config.output_dir.join(trimmed).join("index.html")
            } else {
                self.config.output_dir.join(trimmed)
            };
            return Ok(Some(out));
        }

        let stem = relative
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("index");
        let parent = relative.parent().unwrap_or(Path::new(""));

        if stem == "index" {
            // src/index.njk -> _site/index.html
            Ok(Some(self.config.output_dir.join(parent).join("index.html")))
        } else {
            // src/contact.njk -> _site/contact/index.html
            Ok(Some(
                self.config
                    .output_dir
                    .join(parent)
                    .join(stem)
                    .join("index.html"),
            ))
        }
    }

    /// Convert output path to URL.
    fn path_to_url(&self, path: &Path) -> String {
        let relative = path.strip_prefix(&self.config.output_dir).unwrap_or(path);

        let is_index = relative.file_name().and_then(|f| f.to_str()) == Some("index.html");
        let target = if is_index {
            relative.parent().unwrap_or(Path::new(""))
        } else {
            relative
        };

        let url = target
            .components()
            .filter_map(|c| match c {
                Component::Normal(s) => s.to_str(),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("/");

        if url.is_empty() {
            self.config.base_url.clone()
        } else if is_index {
            format!("{}{}/", self.config.base_url, url)
        } else {
            format!("{}{}", self.config.base_url, url)
        }
    }

    /// Create the template engine with site-wide globals.
    fn template_engine(&self, pages: &[PageInfo]) -> Result<TemplateEngine, BuildError> {
        let input = &self.config.input_dir;
        let mut templates = TemplateEngine::new(
            input.join(&self.config.layouts_dir),
            input.join(&self.config.includes_dir),
        );

        for (name, value) in load_global_data(&input.join(&self.config.data_dir))? {
            templates.add_global(name, Value::from_serialize(&value));
        }

        let all: Vec<CollectionItem> = pages
            .iter()
            .filter(|p| p.output_path.is_some() && !p.source.frontmatter.exclude)
            .map(|p| CollectionItem {
                url: p.url.clone(),
                title: p.source.title().unwrap_or_default().to_string(),
                description: p.source.frontmatter.description.clone(),
            })
            .collect();

        let mut collections = BTreeMap::new();
        collections.insert("all".to_string(), Value::from_serialize(&all));
        templates.add_global("collections", Value::from_serialize(&collections));

        let mut site = BTreeMap::new();
        site.insert("title".to_string(), Value::from(self.config.title.clone()));
        site.insert("base_url".to_string(), Value::from(self.config.base_url.clone()));
        if let Some(url) = &self.config.site_url {
            site.insert("url".to_string(), Value::from(url.clone()));
        }
        templates.add_global("site", Value::from_serialize(&site));

        Ok(templates)
    }

    /// Template variables for a page, before `content` is known.
    fn page_context(&self, page: &PageInfo) -> BTreeMap<String, Value> {
        let frontmatter = &page.source.frontmatter;
        let mut ctx = BTreeMap::new();

        for (key, value) in &frontmatter.data {
            ctx.insert(key.clone(), Value::from_serialize(value));
        }

        let title = page.source.title().unwrap_or(&self.config.title).to_string();
        ctx.insert("title".to_string(), Value::from(title));
        if let Some(description) = &frontmatter.description {
            ctx.insert("description".to_string(), Value::from(description.clone()));
        }

        let mut meta = BTreeMap::new();
        meta.insert("url".to_string(), Value::from(page.url.clone()));
        meta.insert(
            "input_path".to_string(),
            Value::from(page.relative_path.display().to_string()),
        );
        if let Some(out) = &page.output_path {
            meta.insert(
                "output_path".to_string(),
                Value::from(out.display().to_string()),
            );
        }
        ctx.insert("page".to_string(), Value::from_serialize(&meta));

        ctx
    }

    /// Build a single page. Returns the number of files written.
    fn build_page(&self, page: &PageInfo, templates: &TemplateEngine) -> Result<usize, BuildError> {
        let name = page.relative_path.display().to_string();
        let template_error = |e: minijinja::Error| BuildError::TemplateError {
            path: name.clone(),
            message: format!("{:#}", e),
        };

        let mut ctx = self.page_context(page);

        let body = templates
            .render_body(&name, &page.source.body, &Value::from_serialize(&ctx))
            .map_err(template_error)?;
        let mut content = if page.source.format.is_markdown() {
            render_markdown(&body)
        } else {
            body
        };

        let mut layout = page.source.layout().map(str::to_string);
        let mut depth = 0;
        while let Some(layout_name) = layout.take() {
            depth += 1;
            if depth > MAX_LAYOUT_DEPTH {
                return Err(BuildError::LayoutCycle(name.clone()));
            }

            let layout_meta = templates
                .layout_frontmatter(&layout_name)
                .map_err(template_error)?;
            for (key, value) in &layout_meta.data {
                ctx.entry(key.clone())
                    .or_insert_with(|| Value::from_serialize(value));
            }

            ctx.insert("content".to_string(), Value::from_safe_string(content));
            content = templates
                .render_template(&layout_name, &Value::from_serialize(&ctx))
                .map_err(template_error)?;

            layout = layout_meta.layout;
        }

        let Some(output_path) = &page.output_path else {
            return Ok(0);
        };

        if let Some(ws_path) = &self.config.live_reload {
            content = inject_before_body_end(&content, &reload_client_script(ws_path));
        }

        if let Some(parent) = output_path.parent() {
            fs::create_dir_all(parent).map_err(|e| BuildError::WriteError(e.to_string()))?;
        }

        fs::write(output_path, content).map_err(|e| BuildError::WriteError(e.to_string()))?;
        tracing::debug!("Wrote {}", output_path.display());

        Ok(1)
    }

    /// Copy passthrough files and directories.
    fn copy_passthrough(&self) -> Result<usize, BuildError> {
        let mut copied = 0;

        for entry in &self.config.passthrough {
            let relative = entry.trim_matches('/');
            let source = self.config.input_dir.join(relative);

            if !source.exists() {
                tracing::warn!("Passthrough path not found: {}", source.display());
                continue;
            }

            let dest = self.config.output_dir.join(relative);
            copied += AssetPipeline::copy_passthrough(&source, &dest, self.config.minify)
                .map_err(|e| BuildError::WriteError(format!("{}: {}", source.display(), e)))?;
        }

        Ok(copied)
    }

    /// Generate sitemap and robots.txt.
    fn generate_sitemap(&self, pages: &[PageInfo]) -> Result<(), BuildError> {
        let site_url = self
            .config
            .site_url
            .as_deref()
            .unwrap_or_default()
            .trim_end_matches('/');

        let urls: Vec<String> = pages
            .iter()
            .filter(|p| p.output_path.is_some() && !p.source.frontmatter.exclude)
            .map(|page| format!("  <url>\n    <loc>{}{}</loc>\n  </url>", site_url, page.url))
            .collect();

        let sitemap = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
{}
</urlset>"#,
            urls.join("\n")
        );

        fs::write(self.config.output_dir.join("sitemap.xml"), sitemap)
            .map_err(|e| BuildError::WriteError(e.to_string()))?;

        let robots = format!(
            "User-agent: *\nAllow: /\nSitemap: {}{}sitemap.xml",
            site_url, self.config.base_url
        );
        fs::write(self.config.output_dir.join("robots.txt"), robots)
            .map_err(|e| BuildError::WriteError(e.to_string()))?;

        Ok(())
    }
}

/// Whether a path below `root` is private (any component starts with `_`).
fn is_private(path: &Path, root: &Path) -> bool {
    path.strip_prefix(root)
        .map(|rel| {
            rel.components().any(|c| match c {
                Component::Normal(s) => s.to_str().is_some_and(|s| s.starts_with('_')),
                _ => false,
            })
        })
        .unwrap_or(false)
}

fn inject_before_body_end(html: &str, snippet: &str) -> String {
    match html.rfind("</body>") {
        Some(pos) => format!("{}{}\n{}", &html[..pos], snippet, &html[pos..]),
        None => format!("{}\n{}", html, snippet),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn config(root: &Path) -> BuildConfig {
        BuildConfig {
            input_dir: root.join("src"),
            output_dir: root.join("_site"),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn builds_simple_site() {
        let temp = tempdir().unwrap();
        let src = temp.path().join("src");
        write(&src, "index.md", "---\ntitle: Home\n---\n# Welcome\n");

        let builder = StaticBuilder::new(config(temp.path()));
        let result = builder.build().await.unwrap();

        assert_eq!(result.pages, 1);
        let html = fs::read_to_string(temp.path().join("_site/index.html")).unwrap();
        assert_eq!(html, "<h1>Welcome</h1>\n");
    }

    #[tokio::test]
    async fn applies_layout_chain() {
        let temp = tempdir().unwrap();
        let src = temp.path().join("src");
        write(
            &src,
            "_layouts/shell.njk",
            "<html><title>{{ title }} | {{ site.title }}</title><body>{{ content }}</body></html>",
        );
        write(
            &src,
            "_layouts/page.njk",
            "---\nlayout: shell.njk\n---\n<main>{% include \"cta.njk\" %}{{ content }}</main>",
        );
        write(&src, "_includes/cta.njk", "<a href=\"/contact/\">Get a quote</a>");
        write(&src, "about.md", "---\ntitle: About\nlayout: page.njk\n---\nHello");

        StaticBuilder::new(config(temp.path())).build().await.unwrap();

        let html = fs::read_to_string(temp.path().join("_site/about/index.html")).unwrap();
        assert_eq!(
            html,
            "<html><title>About | Nova Sei Press</title><body><main><a href=\"/contact/\">Get a quote</a><p>Hello</p>\n</main></body></html>"
        );
    }

    #[tokio::test]
    async fn detects_layout_cycles() {
        let temp = tempdir().unwrap();
        let src = temp.path().join("src");
        write(&src, "_layouts/a.njk", "---\nlayout: b.njk\n---\n{{ content }}");
        write(&src, "_layouts/b.njk", "---\nlayout: a.njk\n---\n{{ content }}");
        write(&src, "index.njk", "---\nlayout: a.njk\n---\nx");

        let result = StaticBuilder::new(config(temp.path())).build().await;

        assert!(matches!(result, Err(BuildError::LayoutCycle(_))));
    }

    #[tokio::test]
    async fn honours_permalinks() {
        let temp = tempdir().unwrap();
        let src = temp.path().join("src");
        write(&src, "404.njk", "---\npermalink: /404.html\n---\nNot here");
        write(&src, "success.njk", "---\npermalink: /thanks/\n---\nThanks");
        write(&src, "draft.njk", "---\npermalink: false\n---\nDraft");

        let result = StaticBuilder::new(config(temp.path())).build().await.unwrap();

        assert_eq!(result.pages, 2);
        assert!(temp.path().join("_site/404.html").exists());
        assert!(temp.path().join("_site/thanks/index.html").exists());
        assert!(!temp.path().join("_site/draft").exists());
    }

    #[tokio::test]
    async fn rejects_escaping_permalinks() {
        let temp = tempdir().unwrap();
        let src = temp.path().join("src");
        write(&src, "evil.njk", "---\npermalink: /../../etc/x.html\n---\n");

        let result = StaticBuilder::new(config(temp.path())).build().await;

        assert!(matches!(result, Err(BuildError::InvalidPermalink { .. })));
    }

    #[tokio::test]
    async fn exposes_data_and_collections() {
        let temp = tempdir().unwrap();
        let src = temp.path().join("src");
        write(&src, "_data/contact.json", r#"{"email": "hello@example.com"}"#);
        write(&src, "index.njk", "---\ntitle: Home\norder: 1\n---\n{{ contact.email }}");
        write(
            &src,
            "nav.njk",
            "---\ntitle: Nav\norder: 2\nexclude: true\n---\n{% for p in collections.all %}[{{ p.title }}]{% endfor %}",
        );
        write(&src, "faq.md", "---\ntitle: FAQ\norder: 3\n---\nQ");

        StaticBuilder::new(config(temp.path())).build().await.unwrap();

        let index = fs::read_to_string(temp.path().join("_site/index.html")).unwrap();
        assert_eq!(index, "hello@example.com");

        let nav = fs::read_to_string(temp.path().join("_site/nav/index.html")).unwrap();
        assert_eq!(nav, "[Home][FAQ]");
    }

    #[tokio::test]
    async fn skips_private_and_copies_passthrough() {
        let temp = tempdir().unwrap();
        let src = temp.path().join("src");
        write(&src, "_drafts/wip.md", "# WIP");
        write(&src, "css/site.css", "body {\n  color: red;\n}\n");
        write(&src, "js/contact-form.js", "console.log('x');");
        write(&src, "index.html", "<p>home</p>");

        let result = StaticBuilder::new(config(temp.path())).build().await.unwrap();

        assert_eq!(result.pages, 1);
        assert_eq!(result.copied, 2);
        assert!(!temp.path().join("_site/_drafts").exists());
        assert!(temp.path().join("_site/js/contact-form.js").exists());
        let css = fs::read_to_string(temp.path().join("_site/css/site.css")).unwrap();
        assert!(!css.contains('\n'));
    }

    #[tokio::test]
    async fn generates_sitemap_with_site_url() {
        let temp = tempdir().unwrap();
        let src = temp.path().join("src");
        write(&src, "index.html", "home");
        write(&src, "contact.njk", "contact");

        StaticBuilder::new(BuildConfig {
            site_url: Some("https://novaseipress.com/".to_string()),
            ..config(temp.path())
        })
        .build()
        .await
        .unwrap();

        let sitemap = fs::read_to_string(temp.path().join("_site/sitemap.xml")).unwrap();
        assert!(sitemap.contains("<loc>https://novaseipress.com/</loc>"));
        assert!(sitemap.contains("<loc>https://novaseipress.com/contact/</loc>"));
        let robots = fs::read_to_string(temp.path().join("_site/robots.txt")).unwrap();
        assert!(robots.ends_with("Sitemap: https://novaseipress.com/sitemap.xml"));
    }

    #[tokio::test]
    async fn injects_live_reload_in_dev() {
        let temp = tempdir().unwrap();
        let src = temp.path().join("src");
        write(&src, "index.html", "<html><body>home</body></html>");

        StaticBuilder::new(BuildConfig {
            live_reload: Some("/__reload".to_string()),
            ..config(temp.path())
        })
        .build()
        .await
        .unwrap();

        let html = fs::read_to_string(temp.path().join("_site/index.html")).unwrap();
        assert!(html.contains("/__reload"));
        assert!(html.ends_with("</body></html>"));
    }

    #[test]
    fn detects_private_paths() {
        let root = Path::new("/site/src");

        assert!(is_private(Path::new("/site/src/_includes/x.njk"), root));
        assert!(!is_private(Path::new("/site/src/about.md"), root));
        assert!(!is_private(root, root));
    }
}
