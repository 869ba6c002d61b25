//! Replaceable configuration functions.
//!
//! Depend on this crate via `cargo add knob`. It bundles the registry, the
//! attribute macros (`macros` feature) and the environment and local-setup
//! loaders (`config` feature).
//!
//! ```ignore
//! /// Number of worker threads.
//! #[knob::replaceable]
//! pub fn workers() -> u32 {
//!     4
//! }
//!
//! fn main() -> Result<(), knob::config::ConfigError> {
//!     knob::config::bootstrap(knob::Registry::global(), &knob::config::LinkedModules)?;
//!     // KNOB_MY_APP__WORKERS=8 now makes this return 8.
//!     println!("{}", workers());
//!     Ok(())
//! }
//! ```

#![warn(missing_docs, clippy::pedantic)]

/// Re-export shared primitives for convenience.
pub use knob_primitives as primitives;

pub use knob_registry::{
    ActiveConfig, ConfigName, ConfigOutput, ConfigSource, ConfigValue, Configurable,
    DeclarationHook, DuplicateOverride, EVALUATION_FAILED, EvaluationError, IntoConfigName,
    OverrideHook, RawValue, Registry, RegistryError, RegistryResult, Replacer, Resolved,
    declare_all, install_overrides, render_table,
};

/// Attribute macros (enabled by `macros` feature).
#[cfg(feature = "macros")]
pub use knob_macros::{replace, replaceable};

/// Environment and local-setup loaders (enabled by `config` feature).
#[cfg(feature = "config")]
pub use knob_config as config;

#[cfg(feature = "config")]
pub use knob_config::local_setup;

#[doc(hidden)]
pub mod __private {
    pub use inventory;
    pub use knob_registry::macro_support::{declare, declare_with_args};
}
