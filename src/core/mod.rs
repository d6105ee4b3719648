//! Core flag value types.

mod dynamic_value;
mod static_value;
mod value;
pub mod validators;

pub use dynamic_value::DynamicValue;
pub use static_value::StaticValue;
pub use value::FlagValue;

#[cfg(feature = "json")]
pub use value::Json;
