//! Core shared types for the knob configuration registry.

#![warn(missing_docs, clippy::pedantic)]

mod error;
mod name;
mod value;

/// Error type and result alias shared across the workspace.
pub use error::{Error, Result};
/// Dotted identifier naming one replaceable configuration function.
pub use name::{ConfigName, IntoConfigName};
/// Constant configuration values and their string coercion rules.
pub use value::{ConfigValue, DecodeError, RawValue};
