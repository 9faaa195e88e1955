//! Domain directory watcher for hot reload.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::{is_domain_file, load_domains};
use crate::model::DomainConfig;

/// A watcher that reloads every domain file when one of them changes.
pub struct DomainWatcher {
    dir: PathBuf,
    update_tx: mpsc::UnboundedSender<Vec<DomainConfig>>,
}

impl DomainWatcher {
    /// Create a new DomainWatcher.
    ///
    /// Returns the watcher and a receiver for reloaded domain sets.
    pub fn new(dir: &Path) -> (Self, mpsc::UnboundedReceiver<Vec<DomainConfig>>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();

        (
            Self {
                dir: dir.to_path_buf(),
                update_tx,
            },
            update_rx,
        )
    }

    /// Start watching the directory in a background thread.
    ///
    /// The returned watcher must be kept alive for events to keep flowing.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.update_tx.clone();
        let dir = self.dir.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    let relevant = (event.kind.is_modify()
                        || event.kind.is_create()
                        || event.kind.is_remove())
                        && event.paths.iter().any(|p| is_domain_file(p));
                    if !relevant {
                        return;
                    }
                    tracing::info!(paths = ?event.paths, "Domain file change detected, reloading");
                    match load_domains(&dir) {
                        Ok(domains) => {
                            let _ = tx.send(domains);
                        }
                        Err(e) => {
                            tracing::error!(
                                error = %e,
                                "Failed to reload domains. Keeping current configuration."
                            );
                        }
                    }
                }
                Err(e) => tracing::error!(error = ?e, "Watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&self.dir, RecursiveMode::NonRecursive)?;

        tracing::info!(dir = ?self.dir, "Domain watcher started");
        Ok(watcher)
    }
}
