//! Applying a configuration directory to a registry, once or on a loop.

use crate::error::{FlagError, Result};
use crate::registry::FlagRegistry;
use crate::sources::{DirectoryLayoutReader, Layout, LayoutFile};
use parking_lot::{Mutex, RwLock};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

#[cfg(feature = "metrics")]
use crate::metrics::UpdaterMetrics;

#[cfg(feature = "file-watch")]
use crate::notify::DirWatcher;

/// Optional metric hooks; no-ops without the `metrics` feature.
#[derive(Clone, Default)]
pub(crate) struct Telemetry {
    #[cfg(feature = "metrics")]
    pub(crate) metrics: Option<UpdaterMetrics>,
}

impl Telemetry {
    fn pass_started(&self) -> Instant {
        #[cfg(feature = "metrics")]
        if let Some(metrics) = &self.metrics {
            return metrics.start_pass();
        }
        Instant::now()
    }

    fn pass_finished(&self, start: Instant, ok: bool) {
        #[cfg(feature = "metrics")]
        if let Some(metrics) = &self.metrics {
            if ok {
                metrics.record_pass_success(start);
            } else {
                metrics.record_pass_failure(start);
            }
        }
        #[cfg(not(feature = "metrics"))]
        let _ = (start, ok);
    }

    fn swap(&self) {
        #[cfg(feature = "metrics")]
        if let Some(metrics) = &self.metrics {
            metrics.record_swap();
        }
    }

    fn flag_applied(&self, ok: bool) {
        #[cfg(feature = "metrics")]
        if let Some(metrics) = &self.metrics {
            metrics.record_flag_update(ok);
        }
        #[cfg(not(feature = "metrics"))]
        let _ = ok;
    }
}

/// State shared between the updater handle and its polling task.
pub(crate) struct Shared {
    registry: Arc<dyn FlagRegistry>,
    reader: DirectoryLayoutReader,
    dynamic_only_reloads: bool,
    telemetry: Telemetry,
    /// Held for the duration of every pass so passes never interleave.
    pass_lock: Mutex<()>,
    applied_dir: RwLock<Option<PathBuf>>,
    stopped: AtomicBool,
}

impl Shared {
    pub(crate) fn new(
        registry: Arc<dyn FlagRegistry>,
        reader: DirectoryLayoutReader,
        dynamic_only_reloads: bool,
        telemetry: Telemetry,
    ) -> Self {
        Self {
            registry,
            reader,
            dynamic_only_reloads,
            telemetry,
            pass_lock: Mutex::new(()),
            applied_dir: RwLock::new(None),
            stopped: AtomicBool::new(false),
        }
    }

    pub(crate) fn mount_path(&self) -> &Path {
        self.reader.mount_path()
    }

    pub(crate) fn applied_dir(&self) -> Option<PathBuf> {
        self.applied_dir.read().clone()
    }

    pub(crate) fn mark_stopped(&self) {
        self.stopped.store(true, Ordering::Release);
    }

    /// Apply every file, stopping at the first error.
    pub(crate) fn apply_initial(&self) -> Result<usize> {
        let _pass = self.pass_lock.lock();
        let start = self.telemetry.pass_started();

        let layout = match self.reader.read() {
            Ok(layout) => layout,
            Err(e) => {
                self.telemetry.pass_finished(start, false);
                return Err(e);
            }
        };
        for file in &layout.files {
            let result = self.apply_file(file, false);
            self.telemetry.flag_applied(result.is_ok());
            result?;
        }

        let applied = layout.files.len();
        *self.applied_dir.write() = Some(layout.resolved_dir);
        self.telemetry.pass_finished(start, true);
        Ok(applied)
    }

    /// One poll tick: re-resolve, and re-apply if the indirection moved.
    ///
    /// Errors are logged and never abort the pass or the loop.
    pub(crate) fn poll(&self) {
        let _pass = self.pass_lock.lock();
        if self.stopped.load(Ordering::Acquire) {
            return;
        }

        let resolved = match self.reader.resolve() {
            Ok(resolved) => resolved,
            Err(e) => {
                warn!(error = %e, "config directory unreadable, keeping previous values");
                return;
            }
        };
        if self.applied_dir.read().as_deref() == Some(resolved.as_path()) {
            return;
        }

        let start = self.telemetry.pass_started();
        let layout = match self.reader.read() {
            Ok(layout) => layout,
            Err(e) => {
                warn!(error = %e, "config directory unreadable, keeping previous values");
                self.telemetry.pass_finished(start, false);
                return;
            }
        };
        self.telemetry.swap();
        info!(dir = %layout.resolved_dir.display(), "config directory swapped, reloading flags");

        let failed = self.apply_lenient(&layout);
        if failed > 0 {
            warn!(
                dir = %layout.resolved_dir.display(),
                failed,
                total = layout.files.len(),
                "some flags were not updated"
            );
        }

        // Recorded even with per-flag failures so a bad key is reported once per swap.
        *self.applied_dir.write() = Some(layout.resolved_dir);
        self.telemetry.pass_finished(start, true);
    }

    fn apply_lenient(&self, layout: &Layout) -> usize {
        let mut failed = 0;
        for file in &layout.files {
            let result = self.apply_file(file, true);
            self.telemetry.flag_applied(result.is_ok());
            if let Err(e) = result {
                warn!(flag = %file.name, error = %e, "skipping flag update");
                failed += 1;
            }
        }
        failed
    }

    fn apply_file(&self, file: &LayoutFile, reload: bool) -> Result<()> {
        if reload && self.dynamic_only_reloads {
            let flag = self
                .registry
                .lookup(&file.name)
                .ok_or_else(|| FlagError::UnknownFlag(file.name.clone()))?;
            if !self.registry.is_dynamic(&flag) {
                return Err(FlagError::NotDynamic(file.name.clone()));
            }
        }

        let raw = file.read_value()?;
        self.registry.set(&file.name, &raw)?;
        debug!(flag = %file.name, value = raw.trim(), "flag set from config directory");
        Ok(())
    }
}

/// Early wakeups from directory events, when enabled and available.
pub(crate) struct Wakeups {
    #[cfg(feature = "file-watch")]
    inner: Option<(DirWatcher, tokio::sync::mpsc::Receiver<()>)>,
}

impl Wakeups {
    pub(crate) fn open(mount_path: &Path, enabled: bool) -> Self {
        #[cfg(feature = "file-watch")]
        {
            let inner = if enabled {
                match DirWatcher::new(mount_path) {
                    Ok(pair) => Some(pair),
                    Err(e) => {
                        warn!(error = %e, "directory events unavailable, relying on polling");
                        None
                    }
                }
            } else {
                None
            };
            Self { inner }
        }

        #[cfg(not(feature = "file-watch"))]
        {
            let _ = (mount_path, enabled);
            Self {}
        }
    }

    /// Resolves on the next directory event; never resolves without a watcher.
    async fn next(&mut self) {
        #[cfg(feature = "file-watch")]
        if let Some((_, rx)) = &mut self.inner {
            if rx.recv().await.is_some() {
                return;
            }
            self.inner = None;
        }
        std::future::pending::<()>().await
    }
}

/// Poll until `shutdown` fires or its sender is dropped.
pub(crate) async fn poll_loop(
    shared: Arc<Shared>,
    interval: Duration,
    mut shutdown: oneshot::Receiver<()>,
    mut wakeups: Wakeups,
) {
    // `interval` panics on zero.
    let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick is immediate and `initialize` has just run.
    ticker.tick().await;

    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => break,
            _ = ticker.tick() => {}
            _ = wakeups.next() => debug!("directory event, checking for swap"),
        }

        let shared = Arc::clone(&shared);
        if let Err(e) = tokio::task::spawn_blocking(move || shared.poll()).await {
            error!(error = %e, "config directory pass panicked");
        }
    }

    debug!(mount = %shared.mount_path().display(), "config directory poll loop exited");
}
