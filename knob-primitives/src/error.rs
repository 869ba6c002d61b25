//! Shared error definitions for knob primitives.

use thiserror::Error;

/// Result alias used throughout the knob crates.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while constructing primitive types.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration name failed validation.
    #[error("invalid configuration name `{name}`: {reason}")]
    InvalidConfigName {
        /// The offending name.
        name: String,
        /// Human-readable reason for rejection.
        reason: String,
    },
}
