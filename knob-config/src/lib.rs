//! Loaders that turn deployment settings into registry overrides.
//!
//! Two sources are supported: prefixed environment variables and
//! `local_setup` modules found next to the application module. [`bootstrap`]
//! runs both after the registration hooks.

#![warn(missing_docs, clippy::pedantic)]

mod bootstrap;
pub mod environment;
mod error;
pub mod local_setup;
pub mod settings;

pub use bootstrap::{BootstrapReport, bootstrap};
pub use environment::{EnvironmentLoader, LoadReport, load_from_environment};
pub use error::{ConfigError, ConfigResult};
pub use local_setup::{
    ChainedModules, FileModules, LinkedModules, LocalSetup, ModuleSource, load_from_local_setup,
};
pub use settings::Settings;

#[doc(hidden)]
pub use inventory;
