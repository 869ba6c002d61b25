//! Error type shared by the loaders.

use std::path::PathBuf;

use knob_registry::RegistryError;
use thiserror::Error;

/// Result alias for loader operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised while loading configuration overrides.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Installing an override or declaring a setting failed.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// No local-setup module exists under this path.
    ///
    /// The local-setup loader treats this as "try a shorter path".
    #[error("module `{module}` not found")]
    ModuleNotFound {
        /// Dotted module path that was looked up.
        module: String,
    },

    /// A local-setup file exists but could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// File that failed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A local-setup file is not valid TOML.
    #[error("failed to parse {path}: {source}")]
    TomlParse {
        /// File that failed.
        path: PathBuf,
        /// Parser error.
        #[source]
        source: toml::de::Error,
    },

    /// A local-setup entry has no constant representation.
    #[error("invalid value for `{name}`: {reason}")]
    InvalidValue {
        /// Dotted name of the entry.
        name: String,
        /// Why the value was rejected.
        reason: String,
    },
}

impl ConfigError {
    /// Whether the error only means the requested module does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ModuleNotFound { .. })
    }
}
