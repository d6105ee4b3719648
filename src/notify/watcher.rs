//! Mount directory watching.

use crate::error::{FlagError, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher as NotifyWatcher};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::warn;

/// Watches a mount directory and signals when something in it changes.
///
/// Bursts of events collapse into a single pending wakeup, since the receiver
/// only needs to know that it should look again.
///
/// # Examples
///
/// ```rust,no_run
/// use dynflag::notify::DirWatcher;
///
/// # async fn example() -> dynflag::error::Result<()> {
/// let (watcher, mut wakeups) = DirWatcher::new("/etc/config")?;
/// while let Some(()) = wakeups.recv().await {
///     println!("{} changed", watcher.path().display());
/// }
/// # Ok(())
/// # }
/// ```
pub struct DirWatcher {
    _watcher: RecommendedWatcher,
    path: PathBuf,
}

impl DirWatcher {
    /// Start watching `path` (non-recursively).
    ///
    /// Returns the watcher and a receiver that yields `()` after changes. The
    /// watch ends when the `DirWatcher` is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`FlagError::Watch`] if the platform watcher cannot be created
    /// or the path cannot be watched.
    pub fn new(path: impl AsRef<Path>) -> Result<(Self, mpsc::Receiver<()>)> {
        let path = path.as_ref().to_path_buf();
        let (tx, rx) = mpsc::channel(1);

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) if !matches!(event.kind, EventKind::Access(_)) => {
                // A full channel already holds a wakeup.
                let _ = tx.try_send(());
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "directory watch error"),
        })
        .map_err(|e| FlagError::Watch(format!("failed to create watcher: {}", e)))?;

        watcher
            .watch(&path, RecursiveMode::NonRecursive)
            .map_err(|e| FlagError::Watch(format!("failed to watch {}: {}", path.display(), e)))?;

        Ok((
            Self {
                _watcher: watcher,
                path,
            },
            rx,
        ))
    }

    /// The watched directory.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl std::fmt::Debug for DirWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirWatcher").field("path", &self.path).finish()
    }
}
