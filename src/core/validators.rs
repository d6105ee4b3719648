//! Ready-made validators for dynamic values.
//!
//! Each helper returns a closure suitable for
//! [`DynamicValue::with_validator`](crate::core::DynamicValue::with_validator).

use crate::error::ValidationError;
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt::Display;

/// Accept values in the inclusive range `[min, max]`.
///
/// # Examples
///
/// ```rust
/// use dynflag::core::validators::in_range;
///
/// let check = in_range(0i64, 2000);
/// assert!(check(&300).is_ok());
/// assert!(check(&2001).is_err());
/// ```
pub fn in_range<T>(min: T, max: T) -> impl Fn(&T) -> Result<(), ValidationError> + Send + Sync + 'static
where
    T: PartialOrd + Display + Send + Sync + 'static,
{
    move |value: &T| {
        // NaN compares as None against both bounds and is rejected.
        let above_min = matches!(value.partial_cmp(&min), Some(Ordering::Greater | Ordering::Equal));
        let below_max = matches!(value.partial_cmp(&max), Some(Ordering::Less | Ordering::Equal));
        if !(above_min && below_max) {
            return Err(ValidationError::OutOfRange {
                value: value.to_string(),
                min: min.to_string(),
                max: max.to_string(),
            });
        }
        Ok(())
    }
}

/// Accept only strings from a fixed set.
pub fn one_of<I, S>(allowed: I) -> impl Fn(&String) -> Result<(), ValidationError> + Send + Sync + 'static
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let allowed: BTreeSet<String> = allowed.into_iter().map(Into::into).collect();
    move |value: &String| {
        if allowed.contains(value) {
            Ok(())
        } else {
            Err(ValidationError::NotAllowed {
                value: value.clone(),
                allowed: allowed.iter().cloned().collect(),
            })
        }
    }
}

/// Require a list to have at least `min` elements.
pub fn min_len<T>(min: usize) -> impl Fn(&Vec<T>) -> Result<(), ValidationError> + Send + Sync + 'static
where
    T: 'static,
{
    move |value: &Vec<T>| {
        if value.len() < min {
            return Err(ValidationError::TooShort {
                len: value.len(),
                min,
            });
        }
        Ok(())
    }
}

/// Reject empty strings.
pub fn non_empty() -> impl Fn(&String) -> Result<(), ValidationError> + Send + Sync + 'static {
    |value: &String| {
        if value.is_empty() {
            Err(ValidationError::TooShort { len: 0, min: 1 })
        } else {
            Ok(())
        }
    }
}
