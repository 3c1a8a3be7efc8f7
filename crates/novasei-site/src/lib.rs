//! Static site builder for the novasei marketing site.
//!
//! Renders html, njk and markdown pages through layouts and includes, copies
//! static assets, and runs a watching dev server with live reload.

pub mod assets;
pub mod builder;
pub mod data;
pub mod dev;
pub mod reload;
pub mod templates;
pub mod watcher;

pub use builder::{BuildConfig, BuildError, BuildResult, StaticBuilder};
pub use dev::{DevServer, DevServerConfig, ServerError};
pub use reload::{ReloadHub, ReloadMessage};
pub use watcher::{FileWatcher, WatchEvent};
