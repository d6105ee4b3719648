//! Configuration directory sources.

mod layout;

pub use layout::{DEFAULT_DATA_LINK, DirectoryLayoutReader, Layout, LayoutFile};
