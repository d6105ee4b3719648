//! Registry entries and the value contract they wrap.

use crate::error::Result;
use std::fmt;
use std::sync::Arc;

/// Type-erased flag value as seen by a registry.
///
/// Implemented by [`DynamicValue`](crate::core::DynamicValue) and
/// [`StaticValue`](crate::core::StaticValue). Implement it to plug other value
/// kinds into a [`FlagSet`](super::FlagSet).
pub trait Value: Send + Sync {
    /// Set the value from its textual encoding.
    ///
    /// # Errors
    ///
    /// Returns an error if the text does not parse or the value is rejected.
    fn set(&self, raw: &str) -> Result<()>;

    /// The current value in textual form.
    fn current_text(&self) -> String;

    /// The default value in textual form.
    fn default_text(&self) -> String;

    /// Short type name used in listings.
    fn type_name(&self) -> &'static str;

    /// Whether the value may change after startup.
    fn is_dynamic(&self) -> bool {
        false
    }
}

/// A named entry in a flag registry.
#[derive(Clone)]
pub struct Flag {
    name: String,
    usage: String,
    value: Arc<dyn Value>,
}

impl Flag {
    /// Create an entry for `value`.
    pub fn new(name: impl Into<String>, usage: impl Into<String>, value: Arc<dyn Value>) -> Self {
        Self {
            name: name.into(),
            usage: usage.into(),
            value,
        }
    }

    /// The flag name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The flag help text.
    pub fn usage(&self) -> &str {
        &self.usage
    }

    /// The value behind this entry.
    pub fn value(&self) -> &dyn Value {
        self.value.as_ref()
    }

    /// Whether the entry wraps a dynamic value.
    pub fn is_dynamic(&self) -> bool {
        self.value.is_dynamic()
    }
}

impl fmt::Debug for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Flag")
            .field("name", &self.name)
            .field("type", &self.value.type_name())
            .field("current", &self.value.current_text())
            .field("dynamic", &self.value.is_dynamic())
            .finish()
    }
}
