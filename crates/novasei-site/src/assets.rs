//! Passthrough copy of static assets, with CSS minification.

use std::fs;
use std::path::Path;

use walkdir::WalkDir;

/// Asset pipeline utilities.
pub struct AssetPipeline;

impl AssetPipeline {
    /// Minify CSS using lightningcss.
    pub fn minify_css(css: &str) -> Result<String, String> {
        use lightningcss::stylesheet::{ParserOptions, PrinterOptions, StyleSheet};

        let stylesheet = StyleSheet::parse(css, ParserOptions::default())
            .map_err(|e| format!("CSS parse error: {}", e))?;

        let minified = stylesheet
            .to_css(PrinterOptions {
                minify: true,
                ..Default::default()
            })
            .map_err(|e| format!("CSS minify error: {}", e))?;

        Ok(minified.code)
    }

    /// Copy a file or directory tree from `source` to `dest`.
    ///
    /// Stylesheets are minified when `minify` is set; a stylesheet that fails
    /// to parse is copied unchanged. Returns the number of files written.
    pub fn copy_passthrough(source: &Path, dest: &Path, minify: bool) -> std::io::Result<usize> {
        let mut copied = 0;

        for entry in WalkDir::new(source)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }

            let relative = path.strip_prefix(source).unwrap_or(path);
            let target = if relative.as_os_str().is_empty() {
                dest.to_path_buf()
            } else {
                dest.join(relative)
            };

            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }

            let is_css = path.extension().and_then(|e| e.to_str()) == Some("css");
            if minify && is_css {
                let css = fs::read_to_string(path)?;
                let output = match Self::minify_css(&css) {
                    Ok(minified) => minified,
                    Err(e) => {
                        tracing::warn!("Leaving {} unminified: {}", path.display(), e);
                        css
                    }
                };
                fs::write(&target, output)?;
            } else {
                fs::copy(path, &target)?;
            }

            copied += 1;
        }

        Ok(copied)
    }
}

/// Live reload client injected into pages during `dev`.
pub fn reload_client_script(ws_path: &str) -> String {
    format!(
        r#"<script>
(function() {{
  'use strict';
  var proto = location.protocol === 'https:' ? 'wss://' : 'ws://';
  var ws = new WebSocket(proto + location.host + '{}');
  ws.onmessage = function(event) {{
    var msg = JSON.parse(event.data);
    if (msg.type === 'reload') {{
      location.reload();
    }}
  }};
  ws.onclose = function() {{
    setTimeout(function() {{ location.reload(); }}, 1000);
  }};
}})();
</script>"#,
        ws_path
    )
}
