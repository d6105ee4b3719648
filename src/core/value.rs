//! Textual encoding of flag values.

use std::time::Duration;

/// A type that can be stored in a flag and set from text.
///
/// Inputs reaching [`FlagValue::parse_flag`] have already been trimmed of
/// surrounding whitespace.
///
/// # Examples
///
/// ```rust
/// use dynflag::core::FlagValue;
///
/// assert_eq!(i64::parse_flag("42"), Ok(42));
/// assert!(bool::parse_flag("maybe").is_err());
/// ```
pub trait FlagValue: Sized + Send + Sync + 'static {
    /// Short type name used in flag listings.
    const TYPE_NAME: &'static str;

    /// Parse a value from its textual encoding.
    ///
    /// # Errors
    ///
    /// Returns a human-readable reason when the text is not a valid encoding.
    fn parse_flag(raw: &str) -> Result<Self, String>;

    /// Render the value in the same encoding `parse_flag` accepts.
    fn format_flag(&self) -> String;
}

macro_rules! from_str_flag_value {
    ($($ty:ty => $name:literal),* $(,)?) => {
        $(
            impl FlagValue for $ty {
                const TYPE_NAME: &'static str = $name;

                fn parse_flag(raw: &str) -> Result<Self, String> {
                    raw.parse::<$ty>().map_err(|e| e.to_string())
                }

                fn format_flag(&self) -> String {
                    self.to_string()
                }
            }
        )*
    };
}

from_str_flag_value! {
    i64 => "int64",
    i32 => "int32",
    u64 => "uint64",
    u32 => "uint32",
    u16 => "uint16",
    usize => "uint",
    f64 => "float64",
    f32 => "float32",
}

impl FlagValue for bool {
    const TYPE_NAME: &'static str = "bool";

    fn parse_flag(raw: &str) -> Result<Self, String> {
        match raw {
            "1" | "t" | "T" | "true" | "TRUE" | "True" => Ok(true),
            "0" | "f" | "F" | "false" | "FALSE" | "False" => Ok(false),
            _ => Err(format!("{:?} is not a boolean", raw)),
        }
    }

    fn format_flag(&self) -> String {
        self.to_string()
    }
}

impl FlagValue for String {
    const TYPE_NAME: &'static str = "string";

    fn parse_flag(raw: &str) -> Result<Self, String> {
        Ok(raw.to_string())
    }

    fn format_flag(&self) -> String {
        self.clone()
    }
}

/// Comma-separated list; items are trimmed and an empty input is an empty list.
impl FlagValue for Vec<String> {
    const TYPE_NAME: &'static str = "string_slice";

    fn parse_flag(raw: &str) -> Result<Self, String> {
        if raw.is_empty() {
            return Ok(Vec::new());
        }
        Ok(raw.split(',').map(|item| item.trim().to_string()).collect())
    }

    fn format_flag(&self) -> String {
        self.join(",")
    }
}

impl FlagValue for Duration {
    const TYPE_NAME: &'static str = "duration";

    fn parse_flag(raw: &str) -> Result<Self, String> {
        parse_duration(raw)
    }

    fn format_flag(&self) -> String {
        format_duration(*self)
    }
}

/// JSON-encoded flag value.
///
/// # Examples
///
/// ```rust
/// use dynflag::core::{FlagValue, Json};
/// use std::collections::HashMap;
///
/// let parsed = Json::<HashMap<String, u32>>::parse_flag(r#"{"a": 1}"#).unwrap();
/// assert_eq!(parsed["a"], 1);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Json<T>(pub T);

#[cfg(feature = "json")]
impl<T> std::ops::Deref for Json<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

#[cfg(feature = "json")]
impl<T> FlagValue for Json<T>
where
    T: serde::de::DeserializeOwned + serde::Serialize + Send + Sync + 'static,
{
    const TYPE_NAME: &'static str = "json";

    fn parse_flag(raw: &str) -> Result<Self, String> {
        serde_json::from_str(raw).map(Json).map_err(|e| e.to_string())
    }

    fn format_flag(&self) -> String {
        serde_json::to_string(&self.0).unwrap_or_else(|e| format!("<unencodable: {}>", e))
    }
}

const NANOS_PER_SEC: u128 = 1_000_000_000;

fn unit_nanos(unit: &str) -> Option<u128> {
    match unit {
        "ns" => Some(1),
        "us" | "µs" | "μs" => Some(1_000),
        "ms" => Some(1_000_000),
        "s" => Some(NANOS_PER_SEC),
        "m" => Some(60 * NANOS_PER_SEC),
        "h" => Some(3600 * NANOS_PER_SEC),
        _ => None,
    }
}

/// Parses durations such as `300ms`, `1.5s` or `1h30m`. A bare `0` is zero.
fn parse_duration(raw: &str) -> Result<Duration, String> {
    let s = raw.strip_prefix('+').unwrap_or(raw);
    if s == "0" {
        return Ok(Duration::ZERO);
    }
    if s.starts_with('-') {
        return Err("negative durations are not supported".to_string());
    }
    if s.is_empty() {
        return Err("empty duration".to_string());
    }

    let is_number = |c: char| c.is_ascii_digit() || c == '.';
    let overflow = || format!("duration {:?} is too large", raw);

    let mut total: u128 = 0;
    let mut rest = s;
    while !rest.is_empty() {
        let number_end = rest
            .find(|c: char| !is_number(c))
            .ok_or_else(|| format!("missing unit in duration {:?}", raw))?;
        let (number, tail) = rest.split_at(number_end);
        let unit_end = tail.find(is_number).unwrap_or(tail.len());
        let (unit, next) = tail.split_at(unit_end);

        let per_unit =
            unit_nanos(unit).ok_or_else(|| format!("unknown unit {:?} in duration {:?}", unit, raw))?;
        let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
        if whole.is_empty() && fraction.is_empty() {
            return Err(format!("invalid duration {:?}", raw));
        }

        let whole: u128 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| format!("invalid duration {:?}", raw))?
        };
        let mut nanos = whole.checked_mul(per_unit).ok_or_else(overflow)?;
        if !fraction.is_empty() {
            let digits = &fraction[..fraction.len().min(18)];
            let scaled: u128 = digits
                .parse()
                .map_err(|_| format!("invalid duration {:?}", raw))?;
            let fraction_nanos = scaled * per_unit / 10u128.pow(digits.len() as u32);
            nanos = nanos.checked_add(fraction_nanos).ok_or_else(overflow)?;
        }
        total = total.checked_add(nanos).ok_or_else(overflow)?;
        rest = next;
    }

    u64::try_from(total)
        .map(Duration::from_nanos)
        .map_err(|_| overflow())
}

fn format_duration(d: Duration) -> String {
    let nanos = d.as_nanos();
    if nanos == 0 {
        return "0s".to_string();
    }
    if nanos < 1_000 {
        return format!("{}ns", nanos);
    }
    if nanos < 1_000_000 {
        return format!("{}µs", nanos as f64 / 1e3);
    }
    if nanos < NANOS_PER_SEC {
        return format!("{}ms", nanos as f64 / 1e6);
    }

    let secs = d.as_secs();
    let (hours, minutes, seconds) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    let seconds = seconds as f64 + f64::from(d.subsec_nanos()) / 1e9;
    match (hours, minutes) {
        (0, 0) => format!("{}s", seconds),
        (0, m) => format!("{}m{}s", m, seconds),
        (h, m) => format!("{}h{}m{}s", h, m, seconds),
    }
}
