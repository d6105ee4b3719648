//! Runtime-mutable flag values with validation, mutation and change notification.

use crate::core::FlagValue;
use crate::error::{FlagError, Result, ValidationError};
use crate::registry::Value;
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

/// Type alias for validator functions.
type Validator<T> = Arc<dyn Fn(&T) -> std::result::Result<(), ValidationError> + Send + Sync>;

/// Type alias for value mutators, applied after validation and before storage.
type Mutator<T> = Arc<dyn Fn(T) -> T + Send + Sync>;

/// Type alias for change notifiers, called with `(old, new)`.
type Notifier<T> = Arc<dyn Fn(&T, &T) + Send + Sync>;

struct Hooks<T> {
    validator: Option<Validator<T>>,
    mutator: Option<Mutator<T>>,
    notifier: Option<Notifier<T>>,
}

struct Notification<T> {
    notifier: Notifier<T>,
    old: Arc<T>,
    new: Arc<T>,
}

struct NotifyQueue<T> {
    pending: VecDeque<Notification<T>>,
    delivering: bool,
}

struct Inner<T> {
    name: String,
    usage: String,
    default: Arc<T>,
    current: ArcSwap<T>,
    /// Held for the whole validate-mutate-store commit.
    hooks: Mutex<Hooks<T>>,
    notifications: Mutex<NotifyQueue<T>>,
}

/// A named flag value that can change while the process runs.
///
/// Reads go through `arc-swap` and never block, even while another thread is
/// committing a new value. Writes run the validate → mutate → store pipeline
/// under a per-value lock and then hand `(old, new)` to the notifier with the
/// lock released.
///
/// Handles are cheap to clone and all clones share the same value, so the copy
/// held by a [`FlagSet`](crate::registry::FlagSet) sees callbacks attached
/// through any other clone.
///
/// # Examples
///
/// ```rust
/// use dynflag::core::validators::in_range;
/// use dynflag::registry::FlagSet;
///
/// # fn main() -> dynflag::error::Result<()> {
/// let flags = FlagSet::new("example");
/// let workers = flags
///     .add_dynamic("workers", 4i64, "number of worker threads")?
///     .with_validator(in_range(1, 64));
///
/// workers.set("  16\n")?;
/// assert_eq!(workers.get(), 16);
/// assert!(workers.set("100").is_err());
/// assert_eq!(workers.get(), 16);
/// # Ok(())
/// # }
/// ```
pub struct DynamicValue<T> {
    inner: Arc<Inner<T>>,
}

impl<T> DynamicValue<T> {
    /// Create a standalone dynamic value.
    ///
    /// Most callers should register values through
    /// [`FlagSet::add_dynamic`](crate::registry::FlagSet::add_dynamic) instead.
    pub fn new(name: impl Into<String>, default: T, usage: impl Into<String>) -> Self {
        let default = Arc::new(default);
        Self {
            inner: Arc::new(Inner {
                name: name.into(),
                usage: usage.into(),
                current: ArcSwap::new(Arc::clone(&default)),
                default,
                hooks: Mutex::new(Hooks {
                    validator: None,
                    mutator: None,
                    notifier: None,
                }),
                notifications: Mutex::new(NotifyQueue {
                    pending: VecDeque::new(),
                    delivering: false,
                }),
            }),
        }
    }

    /// The flag name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// The flag help text.
    pub fn usage(&self) -> &str {
        &self.inner.usage
    }

    /// The value the flag was registered with.
    pub fn default_value(&self) -> Arc<T> {
        Arc::clone(&self.inner.default)
    }

    /// Get a copy of the current value.
    ///
    /// This is lock-free and never waits for a writer or a notifier.
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        T::clone(&self.inner.current.load())
    }

    /// Get a reference-counted handle to the current value.
    pub fn load(&self) -> Arc<T> {
        self.inner.current.load_full()
    }

    /// Attach a validator, replacing any previous one.
    ///
    /// A rejected value leaves the current value untouched and makes `set`
    /// fail with [`FlagError::Validation`].
    pub fn with_validator<F>(self, validator: F) -> Self
    where
        F: Fn(&T) -> std::result::Result<(), ValidationError> + Send + Sync + 'static,
    {
        self.inner.hooks.lock().validator = Some(Arc::new(validator));
        self
    }

    /// Attach a mutator that transforms accepted values before they are stored,
    /// replacing any previous one.
    pub fn with_value_mutator<F>(self, mutator: F) -> Self
    where
        F: Fn(T) -> T + Send + Sync + 'static,
    {
        self.inner.hooks.lock().mutator = Some(Arc::new(mutator));
        self
    }

    /// Attach a notifier called with `(old, new)` after every successful set,
    /// replacing any previous one.
    ///
    /// Notifications for one value are delivered in commit order. A notifier
    /// may call `set` on its own value; the nested notification is delivered
    /// once the current one returns.
    pub fn with_notifier<F>(self, notifier: F) -> Self
    where
        F: Fn(&T, &T) + Send + Sync + 'static,
    {
        self.inner.hooks.lock().notifier = Some(Arc::new(notifier));
        self
    }

    /// Set an already-typed value through the validate → mutate → store →
    /// notify pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`FlagError::Validation`] if the validator rejects the value.
    pub fn set_value(&self, value: T) -> Result<()> {
        {
            let hooks = self.inner.hooks.lock();
            if let Some(validator) = &hooks.validator {
                validator(&value).map_err(|source| FlagError::Validation {
                    flag: self.inner.name.clone(),
                    source,
                })?;
            }

            let value = match &hooks.mutator {
                Some(mutator) => mutator(value),
                None => value,
            };
            let new = Arc::new(value);
            let old = self.inner.current.swap(Arc::clone(&new));

            // Queued while still holding the commit lock so delivery order
            // matches commit order.
            if let Some(notifier) = &hooks.notifier {
                self.inner.notifications.lock().pending.push_back(Notification {
                    notifier: Arc::clone(notifier),
                    old,
                    new,
                });
            }
        }

        self.deliver_notifications();
        Ok(())
    }

    /// Drain queued notifications unless another call is already doing so.
    fn deliver_notifications(&self) {
        {
            let mut queue = self.inner.notifications.lock();
            if queue.delivering || queue.pending.is_empty() {
                return;
            }
            queue.delivering = true;
        }

        let _guard = DeliveryGuard {
            queue: &self.inner.notifications,
        };
        loop {
            let next = {
                let mut queue = self.inner.notifications.lock();
                match queue.pending.pop_front() {
                    Some(next) => next,
                    None => {
                        queue.delivering = false;
                        return;
                    }
                }
            };
            (next.notifier)(&next.old, &next.new);
        }
    }
}

/// Releases the delivery role if a notifier panics.
struct DeliveryGuard<'a, T> {
    queue: &'a Mutex<NotifyQueue<T>>,
}

impl<T> Drop for DeliveryGuard<'_, T> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.queue.lock().delivering = false;
        }
    }
}

impl<T: FlagValue> DynamicValue<T> {
    /// Parse `raw` and set the result.
    ///
    /// Surrounding whitespace, including the trailing newline usually found in
    /// mounted config files, is trimmed first.
    ///
    /// # Errors
    ///
    /// Returns [`FlagError::Parse`] if `raw` is not a valid encoding and
    /// [`FlagError::Validation`] if the validator rejects the parsed value. The
    /// current value is unchanged in both cases.
    pub fn set(&self, raw: &str) -> Result<()> {
        let input = raw.trim();
        let value = T::parse_flag(input).map_err(|reason| FlagError::Parse {
            flag: self.inner.name.clone(),
            input: input.to_string(),
            reason,
        })?;
        self.set_value(value)
    }
}

impl<T: FlagValue> Value for DynamicValue<T> {
    fn set(&self, raw: &str) -> Result<()> {
        DynamicValue::set(self, raw)
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

    fn is_dynamic(&self) -> bool {
        true
    }
}

impl<T> Clone for DynamicValue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for DynamicValue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicValue")
            .field("name", &self.inner.name)
            .field("current", &self.inner.current.load_full())
            .finish()
    }
}
