//! File watching for the dev rebuild loop.

use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::{Duration, Instant};

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc as async_mpsc;

/// Events emitted by the file watcher.
#[derive(Debug, Clone, PartialEq)]
pub enum WatchEvent {
    /// A page, layout, include or data file changed
    TemplateChanged(PathBuf),

    /// A static asset changed
    AssetChanged(PathBuf),

    /// A file was removed
    Removed(PathBuf),
}

impl WatchEvent {
    /// Path the event refers to.
    pub fn path(&self) -> &Path {
        match self {
            Self::TemplateChanged(p) | Self::AssetChanged(p) | Self::Removed(p) => p,
        }
    }
}

/// File watcher for detecting source changes.
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
}

impl FileWatcher {
    /// Create a new file watcher for the given paths.
    ///
    /// Returns the watcher and a channel to receive events. Changes under
    /// `ignore` (the output directory) are dropped.
    pub fn new(
        paths: &[PathBuf],
        ignore: Option<PathBuf>,
    ) -> Result<(Self, async_mpsc::Receiver<WatchEvent>), std::io::Error> {
        let (sync_tx, sync_rx) = mpsc::channel();
        let (async_tx, async_rx) = async_mpsc::channel(100);

        let mut watcher = notify::recommended_watcher(move |res: Result<notify::Event, _>| {
            if let Ok(event) = res {
                let _ = sync_tx.send(event);
            }
        })
        .map_err(std::io::Error::other)?;

        for path in paths {
            if path.exists() {
                watcher
                    .watch(path, RecursiveMode::Recursive)
                    .map_err(std::io::Error::other)?;
            }
        }

        std::thread::spawn(move || {
            let mut last_event_time: Option<Instant> = None;
            let debounce_duration = Duration::from_millis(100);

            while let Ok(event) = sync_rx.recv() {
                // Debounce rapid events
                let now = Instant::now();
                if last_event_time.is_some_and(|t| now.duration_since(t) < debounce_duration) {
                    continue;
                }

                for path in event.paths {
                    if ignore.as_ref().is_some_and(|dir| path.starts_with(dir)) {
                        continue;
                    }
                    if let Some(e) = classify_event(&path, &event.kind) {
                        last_event_time = Some(now);
                        if async_tx.blocking_send(e).is_err() {
                            return;
                        }
                    }
                }
            }
        });

        Ok((Self { _watcher: watcher }, async_rx))
    }
}

/// Classify a notify event into a WatchEvent.
fn classify_event(path: &Path, kind: &notify::EventKind) -> Option<WatchEvent> {
    use notify::EventKind;

    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let is_template = matches!(
        ext,
        "html" | "htm" | "njk" | "md" | "markdown" | "json" | "yaml" | "yml"
    );

    match kind {
        EventKind::Remove(_) => Some(WatchEvent::Removed(path.to_path_buf())),
        EventKind::Create(_) | EventKind::Modify(_) => {
            if is_template {
                Some(WatchEvent::TemplateChanged(path.to_path_buf()))
            } else {
                Some(WatchEvent::AssetChanged(path.to_path_buf()))
            }
        }
        _ => None,
    }
}
