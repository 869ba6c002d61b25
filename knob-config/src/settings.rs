//! Settings every application gets.
//!
//! They are ordinary configuration functions, so the loaders read them
//! through the registry and they can be overridden like any other name.

use std::env;

use knob_registry::{Configurable, Registry, RegistryResult};

/// Name of the debug flag.
pub const DEBUG: &str = "debug";
/// Name of the application module path used to locate local setup.
pub const APP_MODULE: &str = "app_module";
/// Name of the environment variable prefix.
pub const ENVIRONMENT_PREFIX: &str = "environment_prefix";

/// Variable consulted by the default of [`APP_MODULE`].
pub const APP_MODULE_VAR: &str = "KNOB_APP";
/// Variable consulted by the default of [`ENVIRONMENT_PREFIX`].
///
/// The prefix cannot be set through the prefixed variables themselves since
/// the loader needs it before it scans them.
pub const ENVIRONMENT_PREFIX_VAR: &str = "KNOB_ENVIRONMENT_PREFIX";

/// Fallback application module path.
pub const DEFAULT_APP_MODULE: &str = "app.app";
/// Fallback environment variable prefix.
pub const DEFAULT_ENVIRONMENT_PREFIX: &str = "KNOB";

/// Handles to the standard settings of one registry.
#[derive(Clone, Debug)]
pub struct Settings {
    debug: Configurable<(), bool>,
    app_module: Configurable<(), String>,
    environment_prefix: Configurable<(), String>,
}

impl Settings {
    /// Declares the standard settings in `registry`.
    ///
    /// Declaring again only refreshes the defaults; installed overrides stay.
    ///
    /// # Errors
    ///
    /// Returns the registry error if a name is rejected, which only happens
    /// when the constants above are edited into invalid names.
    pub fn declare(registry: &Registry) -> RegistryResult<Self> {
        let debug = registry
            .declare(DEBUG, || false)?
            .with_description("Whether the application runs in debug mode");
        let app_module = registry
            .declare(APP_MODULE, || {
                env::var(APP_MODULE_VAR).unwrap_or_else(|_| DEFAULT_APP_MODULE.to_owned())
            })?
            .with_description(
                "Module path where the application is composed, used to find local setup (default: $KNOB_APP or 'app.app')",
            );
        let environment_prefix = registry
            .declare(ENVIRONMENT_PREFIX, || {
                env::var(ENVIRONMENT_PREFIX_VAR)
                    .unwrap_or_else(|_| DEFAULT_ENVIRONMENT_PREFIX.to_owned())
            })?
            .with_description("Prefix of environment variables read as configuration overrides");

        Ok(Self {
            debug,
            app_module,
            environment_prefix,
        })
    }

    /// Whether debug mode is on.
    #[must_use]
    pub fn debug(&self) -> bool {
        self.debug.get()
    }

    /// Dotted path of the application module.
    #[must_use]
    pub fn app_module(&self) -> String {
        self.app_module.get()
    }

    /// Environment variable prefix, without the trailing underscore.
    #[must_use]
    pub fn environment_prefix(&self) -> String {
        self.environment_prefix.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_can_be_overridden() {
        let registry = Registry::new();
        let settings = Settings::declare(&registry).unwrap();
        assert!(!settings.debug());

        registry.replace(DEBUG, |()| true).unwrap();
        registry
            .replace(ENVIRONMENT_PREFIX, |()| "MYAPP".to_owned())
            .unwrap();

        assert!(settings.debug());
        assert_eq!(settings.environment_prefix(), "MYAPP");
    }

    #[test]
    fn redeclaring_keeps_overrides() {
        let registry = Registry::new();
        Settings::declare(&registry).unwrap();
        registry
            .replace(APP_MODULE, |()| "shop.app".to_owned())
            .unwrap();

        let settings = Settings::declare(&registry).unwrap();

        assert_eq!(settings.app_module(), "shop.app");
    }

    #[test]
    fn mistyped_override_is_rejected_once_declared() {
        let registry = Registry::new();
        Settings::declare(&registry).unwrap();

        let err = registry.replace(DEBUG, |()| "yes".to_owned()).unwrap_err();
        assert!(err.to_string().contains("debug"));
    }
}
