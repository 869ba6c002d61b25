//! Constant configuration values coerced from strings.

use std::any::type_name;
use std::fmt::{self, Display, Formatter};

use serde::de::{DeserializeOwned, IntoDeserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// A constant configuration value.
///
/// Values read from text are coerced numeric first, then boolean, and are
/// kept as a string when neither applies.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    /// Floating point number.
    Number(f64),
    /// Boolean flag.
    Bool(bool),
    /// Anything that did not parse as a number or a boolean.
    Text(String),
}

impl ConfigValue {
    /// Coerces raw text in trial order: number, boolean, string.
    #[must_use]
    pub fn coerce(raw: &str) -> Self {
        if let Some(number) = parse_number(raw) {
            Self::Number(number)
        } else if let Some(flag) = parse_bool(raw) {
            Self::Bool(flag)
        } else {
            Self::Text(raw.to_owned())
        }
    }

    /// Converts the value into JSON.
    ///
    /// Integral numbers become JSON integers so they decode into integer types.
    /// Non-finite numbers have no JSON number form and map to their display
    /// text (`NaN`, `inf`, `-inf`).
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Number(number) => number_to_json(*number),
            Self::Bool(flag) => Value::Bool(*flag),
            Self::Text(text) => Value::String(text.clone()),
        }
    }

    /// Returns the number if this is a numeric value.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(number) => Some(*number),
            _ => None,
        }
    }

    /// Returns the flag if this is a boolean value.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(flag) => Some(*flag),
            _ => None,
        }
    }

    /// Returns the text if this is a string value.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl Display for ConfigValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(number) => Display::fmt(number, f),
            Self::Bool(flag) => Display::fmt(flag, f),
            Self::Text(text) => f.write_str(text),
        }
    }
}

impl From<f64> for ConfigValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<bool> for ConfigValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<String> for ConfigValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

/// A coerced value together with the text it came from.
///
/// Keeping the raw text lets a constant decode into whatever type the
/// configuration function declares, even when the coerced reading does not
/// fit: `"0"` coerces to `0.0` yet still decodes as `false` into a `bool`,
/// and `"42"` still decodes into a `String`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RawValue {
    raw: String,
    value: ConfigValue,
}

impl RawValue {
    /// Coerces `raw` and keeps the original text alongside.
    #[must_use]
    pub fn parse(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let value = ConfigValue::coerce(&raw);
        Self { raw, value }
    }

    /// Wraps an already typed value, using its display form as raw text.
    #[must_use]
    pub fn typed(value: ConfigValue) -> Self {
        Self {
            raw: value.to_string(),
            value,
        }
    }

    /// Returns the original text.
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Returns the coerced value.
    #[must_use]
    pub fn value(&self) -> &ConfigValue {
        &self.value
    }

    /// Decodes the constant into `T`.
    ///
    /// Tries the coerced value (numbers go straight into float targets), then
    /// the boolean reading of the raw text, then the raw text as a string.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError`] when none of the readings deserialize into `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, DecodeError> {
        let mut candidates = Vec::with_capacity(3);
        if let ConfigValue::Number(number) = self.value {
            let direct: Result<T, serde::de::value::Error> =
                T::deserialize(number.into_deserializer());
            if let Ok(decoded) = direct {
                return Ok(decoded);
            }
            if number.is_finite() {
                candidates.push(self.value.to_json());
            }
        } else {
            candidates.push(self.value.to_json());
        }
        if let Some(flag) = parse_bool(&self.raw) {
            candidates.push(Value::Bool(flag));
        }
        candidates.push(Value::String(self.raw.clone()));

        let mut last_error = None;
        for candidate in candidates {
            match serde_json::from_value(candidate) {
                Ok(decoded) => return Ok(decoded),
                Err(err) => last_error = Some(err.to_string()),
            }
        }

        Err(DecodeError {
            raw: self.raw.clone(),
            target: type_name::<T>(),
            reason: last_error.unwrap_or_default(),
        })
    }
}

impl From<ConfigValue> for RawValue {
    fn from(value: ConfigValue) -> Self {
        Self::typed(value)
    }
}

/// A constant could not be decoded into the declared return type.
#[derive(Debug, Clone, Error)]
#[error("cannot decode `{raw}` as {target}: {reason}")]
pub struct DecodeError {
    /// Raw text of the constant.
    pub raw: String,
    /// Name of the requested type.
    pub target: &'static str,
    /// Deserializer message for the last reading tried.
    pub reason: String,
}

fn parse_number(raw: &str) -> Option<f64> {
    raw.trim().replace(',', ".").parse::<f64>().ok()
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_lowercase().as_str() {
        "true" | "t" | "1" => Some(true),
        "false" | "f" | "0" => Some(false),
        _ => None,
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn number_to_json(number: f64) -> Value {
    if number.is_finite() && number.fract() == 0.0 && number.abs() < i64::MAX as f64 {
        Value::from(number as i64)
    } else {
        serde_json::Number::from_f64(number)
            .map_or_else(|| Value::String(number.to_string()), Value::Number)
    }
}
