//! Global template data loaded from the `_data` directory.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Errors that can occur while loading global data.
#[derive(Debug, thiserror::Error)]
pub enum DataError {
    #[error("Failed to read {path}: {message}")]
    Read { path: String, message: String },

    #[error("Failed to parse {path}: {message}")]
    Parse { path: String, message: String },
}

/// Load every `.json`, `.yaml` and `.yml` file in `dir`, keyed by file stem.
///
/// A missing directory yields no data.
pub fn load_global_data(dir: &Path) -> Result<BTreeMap<String, serde_json::Value>, DataError> {
    let mut data = BTreeMap::new();

    if !dir.is_dir() {
        return Ok(data);
    }

    let entries = fs::read_dir(dir).map_err(|e| DataError::Read {
        path: dir.display().to_string(),
        message: e.to_string(),
    })?;

    for entry in entries.filter_map(|e| e.ok()) {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        let parse: fn(&str) -> Result<serde_json::Value, String> = match ext {
            "json" => |s| serde_json::from_str(s).map_err(|e| e.to_string()),
            "yaml" | "yml" => |s| serde_yaml::from_str(s).map_err(|e| e.to_string()),
            _ => continue,
        };

        let content = fs::read_to_string(&path).map_err(|e| DataError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        let value = parse(&content).map_err(|message| DataError::Parse {
            path: path.display().to_string(),
            message,
        })?;

        tracing::debug!("Loaded global data '{}' from {}", stem, path.display());
        data.insert(stem.to_string(), value);
    }

    Ok(data)
}
