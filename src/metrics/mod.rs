//! Built-in metrics for configuration directory updates.
//!
//! Provides OpenTelemetry metrics tracking:
//! - Passes over the configuration directory, and how many failed
//! - Detected directory swaps
//! - Flags applied and flags that failed to apply
//! - Pass duration
//!
//! Background passes have no caller to return errors to, so these counters
//! and the `tracing` warnings are the only place their failures show up.
//!
//! # Examples
//!
//! ```rust,no_run
//! use dynflag::metrics::UpdaterMetrics;
//! use dynflag::registry::FlagSet;
//! use dynflag::updater::Updater;
//! use opentelemetry::global;
//! use std::sync::Arc;
//!
//! # fn example() -> dynflag::error::Result<()> {
//! let flags = Arc::new(FlagSet::new("app"));
//! let updater = Updater::builder(flags, "/etc/config")
//!     .with_metrics(UpdaterMetrics::new(global::meter("my-app")))
//!     .build()?;
//! # Ok(())
//! # }
//! ```

mod updater_metrics;

pub use updater_metrics::UpdaterMetrics;
