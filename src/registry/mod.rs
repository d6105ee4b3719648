//! Flag registries.
//!
//! [`FlagRegistry`] is the seam between the updater and whatever owns the
//! flags. [`FlagSet`] is the in-crate implementation; tests and alternative
//! flag backends can provide their own.

mod flag;
mod flag_set;

pub use flag::{Flag, Value};
pub use flag_set::{FlagInfo, FlagSet};

use crate::error::{FlagError, Result};
use std::sync::Arc;

/// Operations the updater needs from a flag registry.
///
/// # Examples
///
/// ```rust
/// use dynflag::registry::{FlagRegistry, FlagSet};
///
/// # fn main() -> dynflag::error::Result<()> {
/// let flags = FlagSet::new("example");
/// flags.add_dynamic("rate", 10u32, "requests per second")?;
///
/// flags.set("rate", "25")?;
/// assert!(flags.set("missing", "1").is_err());
/// # Ok(())
/// # }
/// ```
pub trait FlagRegistry: Send + Sync {
    /// Find an entry by name.
    fn lookup(&self, name: &str) -> Option<Arc<Flag>>;

    /// Call `visitor` for every registered entry, in name order.
    fn visit_all(&self, visitor: &mut dyn FnMut(&Flag));

    /// Set a flag from its textual encoding.
    ///
    /// # Errors
    ///
    /// Returns [`FlagError::UnknownFlag`] if no entry has this name, or the
    /// entry's own parse/validation error.
    fn set(&self, name: &str, raw: &str) -> Result<()> {
        let flag = self
            .lookup(name)
            .ok_or_else(|| FlagError::UnknownFlag(name.to_string()))?;
        flag.value().set(raw)
    }

    /// Whether `flag` can change after startup.
    fn is_dynamic(&self, flag: &Flag) -> bool {
        flag.is_dynamic()
    }
}
