//! Constant overrides from prefixed environment variables.
//!
//! `KNOB_PKG__SUB__ITEM=y` overrides `pkg.sub.item` with the constant `"y"`.
//! Matching is case-insensitive, the remainder after the prefix is
//! lower-cased, and every `__` becomes a `.`. Values are coerced numeric
//! first, then boolean, and stay text otherwise.

use std::env;

use knob_primitives::{ConfigName, RawValue};
use knob_registry::Registry;
use tracing::{debug, info, warn};

use crate::error::ConfigResult;
use crate::settings::Settings;

/// Outcome of one environment scan.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Names that received a constant override, in scan order.
    pub installed: Vec<ConfigName>,
    /// Matching variables that were ignored.
    pub skipped: Vec<String>,
}

impl LoadReport {
    /// Whether any override was installed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.installed.is_empty()
    }
}

/// Installs environment variables as constant overrides.
#[derive(Debug)]
pub struct EnvironmentLoader<'r> {
    registry: &'r Registry,
    prefix: String,
}

impl<'r> EnvironmentLoader<'r> {
    /// Creates a loader using the registry's `environment_prefix` setting.
    ///
    /// # Errors
    ///
    /// Propagates failures declaring the standard settings.
    pub fn new(registry: &'r Registry) -> ConfigResult<Self> {
        let prefix = Settings::declare(registry)?.environment_prefix();
        Ok(Self::with_prefix(registry, prefix))
    }

    /// Creates a loader with an explicit prefix, given without the trailing `_`.
    #[must_use]
    pub fn with_prefix(registry: &'r Registry, prefix: impl Into<String>) -> Self {
        Self {
            registry,
            prefix: prefix.into(),
        }
    }

    /// Returns the prefix in use.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Maps a variable name to its configuration name.
    ///
    /// Returns `None` for variables without the prefix.
    #[must_use]
    pub fn config_name_for(&self, variable: &str) -> Option<String> {
        let marker = format!("{}_", self.prefix.to_lowercase());
        let variable = variable.to_lowercase();
        variable
            .strip_prefix(&marker)
            .map(|rest| rest.replace("__", "."))
    }

    /// Installs one constant override per matching variable.
    ///
    /// Later variables win when two map to the same name. Variables whose
    /// derived name is invalid are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Propagates registry failures while installing.
    pub fn load<I, K, V>(&self, vars: I) -> ConfigResult<LoadReport>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut report = LoadReport::default();
        for (variable, value) in vars {
            let variable = variable.as_ref();
            let Some(derived) = self.config_name_for(variable) else {
                continue;
            };
            let name = match ConfigName::new(derived) {
                Ok(name) => name,
                Err(err) => {
                    warn!(variable, error = %err, "skipping environment variable");
                    report.skipped.push(variable.to_owned());
                    continue;
                }
            };

            self.registry.replace_value(
                name.clone(),
                RawValue::parse(value),
                format!("env:{variable}"),
            )?;
            report.installed.push(name);
        }

        if report.is_empty() {
            debug!(prefix = %self.prefix, "no config found in environment");
        } else {
            info!(
                prefix = %self.prefix,
                installed = report.installed.len(),
                "loaded config from environment"
            );
        }
        Ok(report)
    }

    /// Scans the process environment.
    ///
    /// Variables whose name or value is not valid Unicode are skipped.
    ///
    /// # Errors
    ///
    /// See [`EnvironmentLoader::load`].
    pub fn load_process_environment(&self) -> ConfigResult<LoadReport> {
        let mut skipped = Vec::new();
        let vars: Vec<(String, String)> = env::vars_os()
            .filter_map(|(key, value)| match (key.into_string(), value.into_string()) {
                (Ok(key), Ok(value)) => Some((key, value)),
                (Ok(key), Err(_)) => {
                    if self.config_name_for(&key).is_some() {
                        warn!(variable = %key, "skipping environment variable with non-Unicode value");
                        skipped.push(key);
                    }
                    None
                }
                (Err(key), _) => {
                    let key = key.to_string_lossy().into_owned();
                    if self.config_name_for(&key).is_some() {
                        warn!(variable = %key, "skipping environment variable with non-Unicode name");
                        skipped.push(key);
                    }
                    None
                }
            })
            .collect();

        let mut report = self.load(vars)?;
        report.skipped.extend(skipped);
        Ok(report)
    }
}

/// Installs the process environment into `registry` using its configured
/// prefix.
///
/// # Errors
///
/// See [`EnvironmentLoader::load`].
pub fn load_from_environment(registry: &Registry) -> ConfigResult<LoadReport> {
    EnvironmentLoader::new(registry)?.load_process_environment()
}

#[cfg(test)]
mod tests {
    use super::*;

    use serial_test::serial;
    use tracing_test::traced_test;

    use crate::settings::ENVIRONMENT_PREFIX;

    #[test]
    fn derives_names_case_insensitively() {
        let registry = Registry::new();
        let loader = EnvironmentLoader::with_prefix(&registry, "Prefix");

        assert_eq!(
            loader.config_name_for("PREFIX_PKG__SUB__ITEM").as_deref(),
            Some("pkg.sub.item")
        );
        assert_eq!(
            loader.config_name_for("prefix_Debug").as_deref(),
            Some("debug")
        );
        assert_eq!(loader.config_name_for("PREFIXED_ITEM"), None);
        assert_eq!(loader.config_name_for("OTHER_ITEM"), None);
    }

    #[test]
    fn text_value_overrides_declared_default() {
        let registry = Registry::new();
        let item = registry
            .declare("pkg.sub.item", || "x".to_owned())
            .unwrap();

        let report = EnvironmentLoader::with_prefix(&registry, "PREFIX")
            .load([("PREFIX_PKG__SUB__ITEM", "y")])
            .unwrap();

        assert_eq!(report.installed.len(), 1);
        assert_eq!(report.installed[0].as_str(), "pkg.sub.item");
        assert_eq!(item.get(), "y");
    }

    #[test]
    fn numeric_values_are_coerced() {
        let registry = Registry::new();
        let answer = registry.declare("answer", || 0.0_f64).unwrap();
        let ratio = registry.declare("ratio", || 0.0_f64).unwrap();
        let count = registry.declare("count", || 0_u32).unwrap();

        EnvironmentLoader::with_prefix(&registry, "APP")
            .load([("APP_ANSWER", "42"), ("APP_RATIO", "1,5"), ("APP_COUNT", "7")])
            .unwrap();

        assert!((answer.get() - 42.0).abs() < f64::EPSILON);
        assert!((ratio.get() - 1.5).abs() < f64::EPSILON);
        assert_eq!(count.get(), 7);
    }

    #[test]
    fn boolean_values_are_coerced() {
        let registry = Registry::new();
        let enabled = registry.declare("enabled", || false).unwrap();
        let verbose = registry.declare("verbose", || true).unwrap();

        EnvironmentLoader::with_prefix(&registry, "APP")
            .load([("APP_ENABLED", "TRUE"), ("APP_VERBOSE", "0")])
            .unwrap();

        assert!(enabled.get());
        assert!(!verbose.get());
    }

    #[test]
    fn numeric_text_still_satisfies_string_functions() {
        let registry = Registry::new();
        let port = registry.declare("port", || "80".to_owned()).unwrap();

        EnvironmentLoader::with_prefix(&registry, "APP")
            .load([("APP_PORT", "8080")])
            .unwrap();

        assert_eq!(port.get(), "8080");
    }

    #[test]
    fn prefix_comes_from_registry_setting() {
        let registry = Registry::new();
        Settings::declare(&registry).unwrap();
        registry
            .replace(ENVIRONMENT_PREFIX, |()| "SHOP".to_owned())
            .unwrap();
        let theme = registry.declare("theme", || "light".to_owned()).unwrap();

        let loader = EnvironmentLoader::new(&registry).unwrap();
        loader
            .load([("KNOB_THEME", "ignored"), ("SHOP_THEME", "dark")])
            .unwrap();

        assert_eq!(loader.prefix(), "SHOP");
        assert_eq!(theme.get(), "dark");
    }

    #[test]
    #[traced_test]
    fn invalid_derived_names_are_skipped() {
        let registry = Registry::new();

        let report = EnvironmentLoader::with_prefix(&registry, "APP")
            .load([("APP_", "1"), ("APP_A____B", "2"), ("APP_OK", "3")])
            .unwrap();

        assert_eq!(report.skipped, ["APP_", "APP_A____B"]);
        assert_eq!(report.installed.len(), 1);
        assert!(registry.is_overridden("ok"));
        assert!(logs_contain("skipping environment variable"));
    }

    #[test]
    fn long_variable_names_are_installed() {
        let registry = Registry::new();
        let variable = format!("APP_PKG__{}", "X".repeat(300));

        let report = EnvironmentLoader::with_prefix(&registry, "APP")
            .load([(variable.as_str(), "y")])
            .unwrap();

        assert!(report.skipped.is_empty());
        assert_eq!(report.installed.len(), 1);
        assert!(registry.is_overridden(&format!("pkg.{}", "x".repeat(300))));
    }

    #[test]
    fn origin_names_the_variable() {
        let registry = Registry::new();
        EnvironmentLoader::with_prefix(&registry, "APP")
            .load([("APP_LEVEL", "3")])
            .unwrap();

        let active = registry.list_active();
        assert_eq!(
            active[0].source().to_string(),
            "constant from env:APP_LEVEL"
        );
    }

    #[test]
    #[serial]
    fn reads_process_environment() {
        // SAFETY: serialized with every other test touching the environment.
        unsafe {
            env::set_var("KNOBTEST_SERVICE__TIMEOUT", "2,5");
        }
        let registry = Registry::new();
        let timeout = registry.declare("service.timeout", || 1.0_f64).unwrap();

        let report = EnvironmentLoader::with_prefix(&registry, "KNOBTEST")
            .load_process_environment()
            .unwrap();

        // SAFETY: as above.
        unsafe {
            env::remove_var("KNOBTEST_SERVICE__TIMEOUT");
        }
        assert_eq!(report.installed.len(), 1);
        assert!((timeout.get() - 2.5).abs() < f64::EPSILON);
    }
}
