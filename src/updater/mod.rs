//! Keeps a flag registry in sync with a symlink-swapped configuration directory.
//!
//! ## Lifecycle
//!
//! ```text
//! Created ──initialize──▶ Initialized ──start──▶ Running
//!    │                        │                     │
//!    │ (initialize fails)     │                     │
//!    ▼                        ▼                     ▼
//!  Failed ───────────────────stop─────────────▶ Stopped
//! ```
//!
//! `initialize` applies the directory once and fails on the first bad file.
//! `start` spawns a task that re-resolves the indirection every poll interval
//! and re-applies the directory when it points somewhere new; there, bad files
//! are logged and skipped so one broken key cannot block its siblings.

mod builder;
mod pass;

pub use builder::{DEFAULT_POLL_INTERVAL, UpdaterBuilder};

use crate::error::{FlagError, Result};
use crate::registry::FlagRegistry;
use pass::{Shared, Wakeups};
use parking_lot::Mutex;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Lifecycle state of an [`Updater`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdaterState {
    /// Constructed, nothing read yet
    Created,
    /// `initialize` is applying the directory
    Initializing,
    /// The directory was applied once
    Initialized,
    /// The polling task is running
    Running,
    /// Stopped; terminal
    Stopped,
    /// `initialize` failed; terminal until stopped
    Failed,
}

impl fmt::Display for UpdaterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Created => "created",
            Self::Initializing => "initializing",
            Self::Initialized => "initialized",
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

struct Lifecycle {
    state: UpdaterState,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

/// Applies a configuration directory to a flag registry and keeps it applied.
///
/// # Examples
///
/// ```rust,no_run
/// use dynflag::registry::FlagSet;
/// use dynflag::updater::Updater;
/// use std::sync::Arc;
///
/// # async fn example() -> dynflag::error::Result<()> {
/// let flags = Arc::new(FlagSet::new("app"));
/// let batch_size = flags.add_dynamic("batch_size", 100u32, "items per batch")?;
///
/// let updater = Updater::setup(flags.clone(), "/etc/config")?;
/// println!("batch size is {}", batch_size.get());
///
/// // ... later
/// updater.shutdown().await?;
/// # Ok(())
/// # }
/// ```
pub struct Updater {
    shared: Arc<Shared>,
    lifecycle: Mutex<Lifecycle>,
    poll_interval: Duration,
    event_wakeups: bool,
}

impl Updater {
    /// Create an updater with default settings.
    ///
    /// # Errors
    ///
    /// Returns [`FlagError::Layout`] if `mount_path` is not a directory.
    pub fn new(registry: Arc<dyn FlagRegistry>, mount_path: impl Into<PathBuf>) -> Result<Self> {
        Self::builder(registry, mount_path).build()
    }

    /// Create a builder to customize the updater.
    pub fn builder(
        registry: Arc<dyn FlagRegistry>,
        mount_path: impl Into<PathBuf>,
    ) -> UpdaterBuilder {
        UpdaterBuilder::new(registry, mount_path)
    }

    /// Create, initialize and start an updater.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns the first error from construction, `initialize` or `start`.
    pub fn setup(registry: Arc<dyn FlagRegistry>, mount_path: impl Into<PathBuf>) -> Result<Self> {
        let updater = Self::new(registry, mount_path)?;
        updater.initialize()?;
        updater.start()?;
        Ok(updater)
    }

    pub(crate) fn from_parts(shared: Shared, poll_interval: Duration, event_wakeups: bool) -> Self {
        Self {
            shared: Arc::new(shared),
            lifecycle: Mutex::new(Lifecycle {
                state: UpdaterState::Created,
                shutdown: None,
                task: None,
            }),
            poll_interval,
            event_wakeups,
        }
    }

    /// Apply the current configuration directory once.
    ///
    /// Files are applied in name order. The first failure aborts the pass;
    /// files applied before it keep their new values, and the updater moves to
    /// [`UpdaterState::Failed`].
    ///
    /// The updater reports [`UpdaterState::Initializing`] while the pass runs,
    /// so notifiers fired by it may query or stop the updater.
    ///
    /// # Errors
    ///
    /// - [`FlagError::Lifecycle`] unless the updater is in `Created`
    /// - [`FlagError::Layout`] if the indirection cannot be resolved
    /// - [`FlagError::UnknownFlag`] for a file with no matching flag
    /// - [`FlagError::Parse`] or [`FlagError::Validation`] for a bad value
    /// - [`FlagError::Io`] if a file cannot be read
    pub fn initialize(&self) -> Result<()> {
        {
            let mut lifecycle = self.lifecycle.lock();
            if lifecycle.state != UpdaterState::Created {
                return Err(FlagError::Lifecycle {
                    operation: "initialize",
                    state: lifecycle.state,
                });
            }
            lifecycle.state = UpdaterState::Initializing;
        }

        // Notifiers run inside the pass and may call back into the updater.
        let result = self.shared.apply_initial();

        let mut lifecycle = self.lifecycle.lock();
        // A concurrent `stop` wins over the outcome of the pass.
        let stopped = lifecycle.state == UpdaterState::Stopped;
        match result {
            Ok(applied) => {
                if !stopped {
                    lifecycle.state = UpdaterState::Initialized;
                }
                info!(
                    mount = %self.shared.mount_path().display(),
                    applied,
                    "flags initialized from config directory"
                );
                Ok(())
            }
            Err(e) => {
                if !stopped {
                    lifecycle.state = UpdaterState::Failed;
                }
                error!(
                    mount = %self.shared.mount_path().display(),
                    error = %e,
                    "failed to initialize flags from config directory"
                );
                Err(e)
            }
        }
    }

    /// Start polling for directory swaps on the current tokio runtime.
    ///
    /// # Errors
    ///
    /// - [`FlagError::Lifecycle`] unless the updater is in `Initialized`
    /// - [`FlagError::NoRuntime`] if called outside a tokio runtime
    pub fn start(&self) -> Result<()> {
        let mut lifecycle = self.lifecycle.lock();
        if lifecycle.state != UpdaterState::Initialized {
            return Err(FlagError::Lifecycle {
                operation: "start",
                state: lifecycle.state,
            });
        }
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| FlagError::NoRuntime)?;

        let wakeups = {
            // Watcher creation registers with the runtime's reactor.
            let _enter = runtime.enter();
            Wakeups::open(self.shared.mount_path(), self.event_wakeups)
        };
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = runtime.spawn(pass::poll_loop(
            Arc::clone(&self.shared),
            self.poll_interval,
            shutdown_rx,
            wakeups,
        ));

        lifecycle.shutdown = Some(shutdown_tx);
        lifecycle.task = Some(task);
        lifecycle.state = UpdaterState::Running;
        info!(
            mount = %self.shared.mount_path().display(),
            interval = ?self.poll_interval,
            "config directory updater started"
        );
        Ok(())
    }

    /// Stop polling.
    ///
    /// Safe to call in any state and any number of times. No new pass starts
    /// after this returns; a pass already in progress finishes. The polling
    /// task exits within one poll interval.
    pub fn stop(&self) -> Result<()> {
        let mut lifecycle = self.lifecycle.lock();
        self.shared.mark_stopped();
        if let Some(shutdown) = lifecycle.shutdown.take() {
            // The task may already be gone; either way it is not polling.
            let _ = shutdown.send(());
            info!(mount = %self.shared.mount_path().display(), "config directory updater stopped");
        }
        lifecycle.state = UpdaterState::Stopped;
        Ok(())
    }

    /// Stop polling and wait for the polling task to exit.
    pub async fn shutdown(&self) -> Result<()> {
        self.stop()?;
        let task = self.lifecycle.lock().task.take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                error!(error = %e, "config directory poll loop ended abnormally");
            }
        }
        Ok(())
    }

    /// The current lifecycle state.
    pub fn state(&self) -> UpdaterState {
        self.lifecycle.lock().state
    }

    /// The configured mount path.
    pub fn mount_path(&self) -> &Path {
        self.shared.mount_path()
    }

    /// The directory most recently applied, if any.
    pub fn resolved_dir(&self) -> Option<PathBuf> {
        self.shared.applied_dir()
    }

    /// The configured poll interval.
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }
}

impl Drop for Updater {
    fn drop(&mut self) {
        // Dropping the shutdown sender ends the loop; this also stops any
        // pass that has not begun yet.
        self.shared.mark_stopped();
    }
}

impl fmt::Debug for Updater {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Updater")
            .field("mount_path", &self.shared.mount_path())
            .field("state", &self.state())
            .field("poll_interval", &self.poll_interval)
            .finish()
    }
}
