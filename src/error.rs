//! Error types for dynflag.

use std::fmt;
use std::path::PathBuf;

use crate::updater::UpdaterState;

/// Result type alias for dynflag operations.
pub type Result<T> = std::result::Result<T, FlagError>;

/// Errors that can occur when setting flags or running an updater.
#[derive(Debug, thiserror::Error)]
pub enum FlagError {
    /// Raw text could not be converted to the flag's type.
    #[error("invalid value {input:?} for flag '{flag}': {reason}")]
    Parse {
        /// Flag name
        flag: String,
        /// The trimmed input that failed to parse
        input: String,
        /// Why parsing failed
        reason: String,
    },

    /// A parsed value was rejected by the flag's validator.
    #[error("validation failed for flag '{flag}': {source}")]
    Validation {
        /// Flag name
        flag: String,
        /// The validator's rejection
        #[source]
        source: ValidationError,
    },

    /// The configuration directory does not have the expected layout.
    #[error("bad config directory layout at {}: {reason}", path.display())]
    Layout {
        /// Path that could not be resolved
        path: PathBuf,
        /// What was wrong with it
        reason: String,
    },

    /// A configuration file names a flag that is not registered.
    #[error("unknown flag '{0}'")]
    UnknownFlag(String),

    /// A flag with this name is already registered.
    #[error("flag '{0}' is already registered")]
    DuplicateFlag(String),

    /// A reload tried to change a static flag.
    #[error("flag '{0}' is not dynamic")]
    NotDynamic(String),

    /// An updater operation was called in the wrong state.
    #[error("cannot {operation} updater in state {state}")]
    Lifecycle {
        /// The operation that was attempted
        operation: &'static str,
        /// The state the updater was in
        state: UpdaterState,
    },

    /// The updater was started outside of a tokio runtime.
    #[error("updater must be started from within a tokio runtime")]
    NoRuntime,

    /// Reading a configuration file failed.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        /// File that could not be read
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// Directory event watching failed to initialize.
    #[error("directory watch error: {0}")]
    Watch(String),
}

impl FlagError {
    pub(crate) fn layout(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Layout {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Rejection returned by a flag validator.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Custom validation error with a message.
    Custom(String),

    /// The value is outside of the allowed range.
    OutOfRange {
        /// The rejected value
        value: String,
        /// Inclusive lower bound
        min: String,
        /// Inclusive upper bound
        max: String,
    },

    /// The value is not one of the allowed values.
    NotAllowed {
        /// The rejected value
        value: String,
        /// Values that would have been accepted
        allowed: Vec<String>,
    },

    /// The value has fewer elements than required.
    TooShort {
        /// Number of elements present
        len: usize,
        /// Minimum number of elements
        min: usize,
    },
}

impl ValidationError {
    /// Create a custom validation error.
    pub fn custom(msg: impl Into<String>) -> Self {
        Self::Custom(msg.into())
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Custom(msg) => write!(f, "{}", msg),
            Self::OutOfRange { value, min, max } => {
                write!(f, "value {} not in range [{}, {}]", value, min, max)
            }
            Self::NotAllowed { value, allowed } => {
                write!(f, "value {:?} not one of [{}]", value, allowed.join(", "))
            }
            Self::TooShort { len, min } => {
                write!(f, "has {} elements, need at least {}", len, min)
            }
        }
    }
}

impl std::error::Error for ValidationError {}
