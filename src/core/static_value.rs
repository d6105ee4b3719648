//! Plain flag values that are set at startup.

use crate::core::FlagValue;
use crate::error::{FlagError, Result};
use crate::registry::Value;
use arc_swap::ArcSwap;
use std::fmt;
use std::sync::Arc;

struct Inner<T> {
    name: String,
    default: Arc<T>,
    current: ArcSwap<T>,
}

/// A flag value without validation, mutation or notification hooks.
///
/// Static values can still be set by an [`Updater`](crate::updater::Updater)
/// during `initialize`, but the program is expected to read them once at
/// startup. Use [`DynamicValue`](crate::core::DynamicValue) for anything that
/// should react to later changes.
pub struct StaticValue<T> {
    inner: Arc<Inner<T>>,
}

impl<T> StaticValue<T> {
    /// Create a standalone static value.
    pub fn new(name: impl Into<String>, default: T) -> Self {
        let default = Arc::new(default);
        Self {
            inner: Arc::new(Inner {
                name: name.into(),
                current: ArcSwap::new(Arc::clone(&default)),
                default,
            }),
        }
    }

    /// The flag name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Get a copy of the current value.
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        T::clone(&self.inner.current.load())
    }
}

impl<T: FlagValue> StaticValue<T> {
    /// Parse `raw` (trimmed) and store it.
    ///
    /// # Errors
    ///
    /// Returns [`FlagError::Parse`] if `raw` is not a valid encoding.
    pub fn set(&self, raw: &str) -> Result<()> {
        let input = raw.trim();
        let value = T::parse_flag(input).map_err(|reason| FlagError::Parse {
            flag: self.inner.name.clone(),
            input: input.to_string(),
            reason,
        })?;
        self.inner.current.store(Arc::new(value));
        Ok(())
    }
}

impl<T: FlagValue> Value for StaticValue<T> {
    fn set(&self, raw: &str) -> Result<()> {
        StaticValue::set(self, raw)
    }

    fn current_text(&self) -> String {
        self.inner.current.load().format_flag()
    }

    fn default_text(&self) -> String {
        self.inner.default.format_flag()
    }

    fn type_name(&self) -> &'static str {
        T::TYPE_NAME
    }
}

impl<T> Clone for StaticValue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for StaticValue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticValue")
            .field("name", &self.inner.name)
            .field("current", &self.inner.current.load_full())
            .finish()
    }
}
