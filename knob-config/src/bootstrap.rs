//! One-call startup sequence.

use knob_registry::{Registry, declare_all, install_overrides};
use tracing::info;

use crate::environment::{LoadReport, load_from_environment};
use crate::error::ConfigResult;
use crate::local_setup::{ModuleSource, load_from_local_setup};
use crate::settings::Settings;

/// What [`bootstrap`] did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BootstrapReport {
    /// Declaration hooks that ran.
    pub declared: usize,
    /// Overrides installed from `#[replace]` hooks.
    pub linked_overrides: usize,
    /// Local-setup module that was loaded, if any.
    pub local_setup: Option<String>,
    /// Environment scan results.
    pub environment: LoadReport,
}

/// Brings `registry` into its configured state.
///
/// Runs, in order: the standard settings declaration, every declaration hook
/// (which always targets [`Registry::global`]), every `#[replace]` hook, the
/// local-setup loader, and the environment loader. Later steps win, so the
/// environment overrides local setup, which overrides linked replacements.
///
/// # Errors
///
/// Returns the first replacement, naming, or module loading failure.
pub fn bootstrap(registry: &Registry, source: &dyn ModuleSource) -> ConfigResult<BootstrapReport> {
    Settings::declare(registry)?;
    let declared = declare_all();
    let linked_overrides = install_overrides(registry)?;
    let local_setup = load_from_local_setup(registry, source)?;
    let environment = load_from_environment(registry)?;

    info!(
        declared,
        linked_overrides,
        local_setup = local_setup.as_deref().unwrap_or("none"),
        environment = environment.installed.len(),
        "configuration bootstrapped"
    );
    Ok(BootstrapReport {
        declared,
        linked_overrides,
        local_setup,
        environment,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::env;

    use serial_test::serial;

    use crate::error::{ConfigError, ConfigResult};
    use crate::settings::{APP_MODULE_VAR, DEBUG};

    struct Single(&'static str);

    impl ModuleSource for Single {
        fn load(&self, module: &str, registry: &Registry) -> ConfigResult<()> {
            if module != self.0 {
                return Err(ConfigError::ModuleNotFound {
                    module: module.to_owned(),
                });
            }
            registry.replace_value(DEBUG, knob_primitives::RawValue::parse("t"), "local")?;
            registry.replace_value("site.name", knob_primitives::RawValue::parse("local"), "local")?;
            Ok(())
        }
    }

    #[test]
    #[serial]
    fn environment_wins_over_local_setup() {
        // SAFETY: serialized with every other test touching the environment.
        unsafe {
            env::set_var(APP_MODULE_VAR, "site.app");
            env::set_var("KNOB_SITE__NAME", "from-env");
        }
        let registry = Registry::new();
        let name = registry.declare("site.name", || "default".to_owned()).unwrap();
        let report = bootstrap(&registry, &Single("site.local_setup"));
        // SAFETY: as above.
        unsafe {
            env::remove_var(APP_MODULE_VAR);
            env::remove_var("KNOB_SITE__NAME");
        }

        let report = report.unwrap();
        assert_eq!(report.local_setup.as_deref(), Some("site.local_setup"));
        assert!(
            report
                .environment
                .installed
                .iter()
                .any(|name| name.as_str() == "site.name")
        );
        assert_eq!(name.get(), "from-env");
        assert!(Settings::declare(&registry).unwrap().debug());
    }
}
