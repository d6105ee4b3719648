//! An isolated, in-memory flag registry.

use super::{Flag, FlagRegistry};
use crate::core::{DynamicValue, FlagValue, StaticValue};
use crate::error::{FlagError, Result};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::sync::Arc;

/// A named collection of flags.
///
/// Each `FlagSet` is independent; there is no process-wide flag table. Share
/// one between the application and an [`Updater`](crate::updater::Updater) by
/// wrapping it in an `Arc`.
///
/// # Examples
///
/// ```rust
/// use dynflag::registry::FlagSet;
///
/// # fn main() -> dynflag::error::Result<()> {
/// let flags = FlagSet::new("server");
/// let port = flags.add_static("port", 8080u16, "listen port")?;
/// let timeout = flags.add_dynamic("timeout", std::time::Duration::from_secs(5), "request timeout")?;
///
/// assert_eq!(port.get(), 8080);
/// assert_eq!(flags.dynamic_names(), vec!["timeout".to_string()]);
/// # let _ = timeout;
/// # Ok(())
/// # }
/// ```
pub struct FlagSet {
    name: String,
    flags: RwLock<BTreeMap<String, Arc<Flag>>>,
}

/// Point-in-time description of one flag, for listings and audit endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlagInfo {
    /// Flag name
    pub name: String,
    /// Help text
    pub usage: String,
    /// Value type name
    #[serde(rename = "type")]
    pub type_name: &'static str,
    /// Default value in textual form
    pub default: String,
    /// Current value in textual form
    pub current: String,
    /// Whether the flag can change at runtime
    pub dynamic: bool,
}

impl FlagSet {
    /// Create an empty flag set.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            flags: RwLock::new(BTreeMap::new()),
        }
    }

    /// The name this set was created with.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register a dynamic value and return a handle to it.
    ///
    /// # Errors
    ///
    /// Returns [`FlagError::DuplicateFlag`] if the name is taken.
    pub fn add_dynamic<T: FlagValue>(
        &self,
        name: &str,
        default: T,
        usage: &str,
    ) -> Result<DynamicValue<T>> {
        let value = DynamicValue::new(name, default, usage);
        self.register(Flag::new(name, usage, Arc::new(value.clone())))?;
        Ok(value)
    }

    /// Register a static value and return a handle to it.
    ///
    /// # Errors
    ///
    /// Returns [`FlagError::DuplicateFlag`] if the name is taken.
    pub fn add_static<T: FlagValue>(
        &self,
        name: &str,
        default: T,
        usage: &str,
    ) -> Result<StaticValue<T>> {
        let value = StaticValue::new(name, default);
        self.register(Flag::new(name, usage, Arc::new(value.clone())))?;
        Ok(value)
    }

    /// Register a prebuilt entry.
    ///
    /// # Errors
    ///
    /// Returns [`FlagError::DuplicateFlag`] if the name is taken.
    pub fn register(&self, flag: Flag) -> Result<Arc<Flag>> {
        let mut flags = self.flags.write();
        match flags.entry(flag.name().to_string()) {
            Entry::Occupied(entry) => Err(FlagError::DuplicateFlag(entry.key().clone())),
            Entry::Vacant(entry) => Ok(Arc::clone(entry.insert(Arc::new(flag)))),
        }
    }

    /// Number of registered flags.
    pub fn len(&self) -> usize {
        self.flags.read().len()
    }

    /// Whether no flags are registered.
    pub fn is_empty(&self) -> bool {
        self.flags.read().is_empty()
    }

    /// Names of all dynamic flags, sorted.
    pub fn dynamic_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        self.visit_all(&mut |flag| {
            if flag.is_dynamic() {
                names.push(flag.name().to_string());
            }
        });
        names
    }

    /// Describe every flag, sorted by name.
    pub fn snapshot(&self) -> Vec<FlagInfo> {
        let mut infos = Vec::with_capacity(self.len());
        self.visit_all(&mut |flag| {
            let value = flag.value();
            infos.push(FlagInfo {
                name: flag.name().to_string(),
                usage: flag.usage().to_string(),
                type_name: value.type_name(),
                default: value.default_text(),
                current: value.current_text(),
                dynamic: value.is_dynamic(),
            });
        });
        infos
    }

    /// Render [`snapshot`](Self::snapshot) as a JSON array.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    #[cfg(feature = "json")]
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.snapshot())
    }
}

impl FlagRegistry for FlagSet {
    fn lookup(&self, name: &str) -> Option<Arc<Flag>> {
        self.flags.read().get(name).cloned()
    }

    fn visit_all(&self, visitor: &mut dyn FnMut(&Flag)) {
        // Snapshot first so visitors may call back into the set.
        let flags: Vec<Arc<Flag>> = self.flags.read().values().cloned().collect();
        for flag in &flags {
            visitor(flag);
        }
    }
}

impl std::fmt::Debug for FlagSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlagSet")
            .field("name", &self.name)
            .field("flags", &self.flags.read().keys().collect::<Vec<_>>())
            .finish()
    }
}
