//! Builder for constructing Updater instances.

use super::Updater;
use super::pass::{Shared, Telemetry};
use crate::error::{FlagError, Result};
use crate::registry::FlagRegistry;
use crate::sources::{DEFAULT_DATA_LINK, DirectoryLayoutReader};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[cfg(feature = "metrics")]
use crate::metrics::UpdaterMetrics;

/// How often a running updater re-resolves the indirection by default.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Builder for constructing an [`Updater`].
///
/// # Examples
///
/// ```rust,no_run
/// use dynflag::registry::FlagSet;
/// use dynflag::updater::Updater;
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// # fn example() -> dynflag::error::Result<()> {
/// let flags = Arc::new(FlagSet::new("app"));
/// let updater = Updater::builder(flags, "/etc/config")
///     .with_poll_interval(Duration::from_millis(250))
///     .with_dynamic_only_reloads(true)
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct UpdaterBuilder {
    registry: Arc<dyn FlagRegistry>,
    mount_path: PathBuf,
    poll_interval: Duration,
    data_link: String,
    event_wakeups: bool,
    dynamic_only_reloads: bool,
    #[cfg(feature = "metrics")]
    metrics: Option<UpdaterMetrics>,
}

impl UpdaterBuilder {
    /// Create a builder with default settings.
    pub fn new(registry: Arc<dyn FlagRegistry>, mount_path: impl Into<PathBuf>) -> Self {
        Self {
            registry,
            mount_path: mount_path.into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            data_link: DEFAULT_DATA_LINK.to_string(),
            event_wakeups: cfg!(feature = "file-watch"),
            dynamic_only_reloads: false,
            #[cfg(feature = "metrics")]
            metrics: None,
        }
    }

    /// Set how often the running updater checks for a swapped directory.
    ///
    /// Default is 1 second.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Use a different indirection entry name than `..data`.
    pub fn with_data_link(mut self, name: impl Into<String>) -> Self {
        self.data_link = name.into();
        self
    }

    /// Check for a swap as soon as the mount directory reports a change,
    /// instead of waiting for the next poll.
    ///
    /// Enabled by default with the `file-watch` feature and ignored without it.
    pub fn with_event_wakeups(mut self, enabled: bool) -> Self {
        self.event_wakeups = enabled;
        self
    }

    /// Only update dynamic flags after `initialize`.
    ///
    /// With this set, a swapped directory that carries a static flag logs
    /// [`FlagError::NotDynamic`] for it and leaves it alone.
    pub fn with_dynamic_only_reloads(mut self, enabled: bool) -> Self {
        self.dynamic_only_reloads = enabled;
        self
    }

    /// Record pass metrics with OpenTelemetry.
    #[cfg(feature = "metrics")]
    pub fn with_metrics(mut self, metrics: UpdaterMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Build the updater in the `Created` state.
    ///
    /// Nothing is read from the configuration directory yet.
    ///
    /// # Errors
    ///
    /// Returns [`FlagError::Layout`] if the mount path is not a directory.
    pub fn build(self) -> Result<Updater> {
        if !self.mount_path.is_dir() {
            return Err(FlagError::layout(
                &self.mount_path,
                "mount path is not a directory",
            ));
        }

        let reader = DirectoryLayoutReader::new(self.mount_path).with_data_link(self.data_link);
        let telemetry = Telemetry {
            #[cfg(feature = "metrics")]
            metrics: self.metrics,
        };
        let shared = Shared::new(self.registry, reader, self.dynamic_only_reloads, telemetry);

        Ok(Updater::from_parts(
            shared,
            self.poll_interval,
            self.event_wakeups,
        ))
    }
}
