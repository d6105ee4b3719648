//! Directory event wakeups.
//!
//! Events only prompt the updater to re-resolve the indirection early. Some
//! volume implementations do not emit events for a symlink repoint, so the
//! poll interval remains the source of truth.

pub mod watcher;

pub use watcher::DirWatcher;
