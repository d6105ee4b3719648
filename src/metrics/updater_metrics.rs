//! Updater metrics tracking using OpenTelemetry.

use opentelemetry::metrics::{Counter, Histogram, Meter};
use std::time::Instant;

/// Metrics collector for updater passes.
///
/// # Examples
///
/// ```rust,no_run
/// use dynflag::metrics::UpdaterMetrics;
/// use opentelemetry::global;
///
/// let metrics = UpdaterMetrics::new(global::meter("dynflag"));
///
/// let timer = metrics.start_pass();
/// // ... apply the directory ...
/// metrics.record_pass_success(timer);
/// ```
#[derive(Clone)]
pub struct UpdaterMetrics {
    passes: Counter<u64>,
    pass_failures: Counter<u64>,
    pass_duration: Histogram<f64>,
    swaps: Counter<u64>,
    flag_updates: Counter<u64>,
    flag_update_failures: Counter<u64>,
}

impl UpdaterMetrics {
    /// Create a new metrics collector with the provided meter.
    pub fn new(meter: Meter) -> Self {
        let passes = meter
            .u64_counter("dynflag.updater.passes")
            .with_description("Number of passes over the configuration directory")
            .build();

        let pass_failures = meter
            .u64_counter("dynflag.updater.pass_failures")
            .with_description("Passes aborted because the directory layout was unreadable")
            .build();

        let pass_duration = meter
            .f64_histogram("dynflag.updater.pass_duration")
            .with_description("Duration of directory passes in seconds")
            .with_unit("s")
            .build();

        let swaps = meter
            .u64_counter("dynflag.updater.swaps")
            .with_description("Number of detected directory swaps")
            .build();

        let flag_updates = meter
            .u64_counter("dynflag.updater.flag_updates")
            .with_description("Flags successfully set from the configuration directory")
            .build();

        let flag_update_failures = meter
            .u64_counter("dynflag.updater.flag_update_failures")
            .with_description("Flags that could not be set from the configuration directory")
            .build();

        Self {
            passes,
            pass_failures,
            pass_duration,
            swaps,
            flag_updates,
            flag_update_failures,
        }
    }

    /// Start a pass timer.
    ///
    /// Pass the returned `Instant` to `record_pass_success` or
    /// `record_pass_failure` when the pass completes.
    pub fn start_pass(&self) -> Instant {
        self.passes.add(1, &[]);
        Instant::now()
    }

    /// Record a pass that read the directory, whatever happened to individual flags.
    pub fn record_pass_success(&self, start: Instant) {
        self.pass_duration.record(start.elapsed().as_secs_f64(), &[]);
    }

    /// Record a pass that could not read the directory.
    pub fn record_pass_failure(&self, start: Instant) {
        self.pass_failures.add(1, &[]);
        self.pass_duration.record(start.elapsed().as_secs_f64(), &[]);
    }

    /// Record that the indirection now points somewhere new.
    pub fn record_swap(&self) {
        self.swaps.add(1, &[]);
    }

    /// Record the outcome of setting one flag.
    pub fn record_flag_update(&self, ok: bool) {
        if ok {
            self.flag_updates.add(1, &[]);
        } else {
            self.flag_update_failures.add(1, &[]);
        }
    }
}

impl std::fmt::Debug for UpdaterMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdaterMetrics").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentelemetry::global;

    #[test]
    fn test_metrics_operations() {
        let metrics = UpdaterMetrics::new(global::meter("test"));

        let timer = metrics.start_pass();
        metrics.record_swap();
        metrics.record_flag_update(true);
        metrics.record_flag_update(false);
        metrics.record_pass_success(timer);

        let timer = metrics.start_pass();
        metrics.record_pass_failure(timer);
    }

    #[test]
    fn test_metrics_clone() {
        let metrics = UpdaterMetrics::new(global::meter("test"));
        let metrics2 = metrics.clone();

        let timer1 = metrics.start_pass();
        let timer2 = metrics2.start_pass();
        metrics.record_pass_success(timer1);
        metrics2.record_pass_success(timer2);
    }
}
