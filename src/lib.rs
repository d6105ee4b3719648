//! # dynflag
//!
//! Runtime-mutable flags, reloaded from atomically swapped configuration directories.
//!
//! ## Overview
//!
//! `dynflag` combines:
//! - Dynamic flag values with lock-free reads via `arc-swap`
//! - A validate → mutate → store → notify pipeline for every write
//! - An [`Updater`](updater::Updater) that applies a Kubernetes-style
//!   ConfigMap mount (a `..data` symlink swapped between immutable
//!   directories) to a flag registry and follows later swaps
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use dynflag::prelude::*;
//! use dynflag::core::validators::in_range;
//! use std::sync::Arc;
//!
//! # async fn example() -> dynflag::error::Result<()> {
//! let flags = Arc::new(FlagSet::new("my-service"));
//!
//! let max_inflight = flags
//!     .add_dynamic("max_inflight", 64i64, "concurrent requests allowed")?
//!     .with_validator(in_range(1, 4096))
//!     .with_notifier(|old, new| println!("max_inflight {} -> {}", old, new));
//! let listen_port = flags.add_static("listen_port", 8080u16, "port to bind")?;
//!
//! // Apply /etc/my-service once, then follow updates.
//! let updater = Updater::setup(flags.clone(), "/etc/my-service")?;
//!
//! println!("port {} inflight {}", listen_port.get(), max_inflight.get());
//! # updater.shutdown().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Features
//!
//! - **Lock-free reads**: `get` never waits on writers or notifiers
//! - **Validated writes**: rejected values leave the old one in place
//! - **Swap detection**: compares the resolved `..data` target, not file times
//! - **Failure isolation**: one malformed key never blocks its siblings after startup
//!
//! ## Feature Flags
//!
//! - `file-watch` (default): wake the updater early on directory events
//! - `json` (default): [`Json`](core::Json) flag values and JSON flag listings
//! - `metrics`: OpenTelemetry instruments for updater passes

#![warn(missing_docs, rust_2024_compatibility)]
#![deny(unsafe_code)]

pub mod core;
pub mod error;
pub mod registry;
pub mod sources;
pub mod updater;

#[cfg(feature = "file-watch")]
pub mod notify;

#[cfg(feature = "metrics")]
pub mod metrics;

/// Convenient re-exports for common usage patterns.
pub mod prelude {
    pub use crate::core::{DynamicValue, FlagValue, StaticValue};
    pub use crate::error::{FlagError, Result, ValidationError};
    pub use crate::registry::{FlagRegistry, FlagSet};
    pub use crate::updater::{Updater, UpdaterState};
}
