//! Call handles for declared configuration functions.

use std::fmt;

use knob_primitives::ConfigName;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::registry::{DynFn, Override, Registry, Replacement};

/// Types a configuration function may return.
///
/// Results must serialize for introspection and deserialize so that constant
/// overrides from the environment or local setup files can stand in for them.
pub trait ConfigOutput: Serialize + DeserializeOwned + 'static {}

impl<T> ConfigOutput for T where T: Serialize + DeserializeOwned + 'static {}

/// Handle to a declared configuration function.
///
/// Every call consults the registry: an installed override wins, otherwise the
/// default declared with the handle runs. Nothing is cached between calls.
pub struct Configurable<A, R> {
    name: ConfigName,
    registry: Registry,
    original: DynFn<A, R>,
}

impl<A, R> Clone for Configurable<A, R> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            registry: self.registry.clone(),
            original: self.original.clone(),
        }
    }
}

impl<A, R> fmt::Debug for Configurable<A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Configurable")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl<A, R> Configurable<A, R>
where
    A: 'static,
    R: ConfigOutput,
{
    pub(crate) fn new(name: ConfigName, registry: Registry, original: DynFn<A, R>) -> Self {
        Self {
            name,
            registry,
            original,
        }
    }

    /// Returns the configuration name.
    #[must_use]
    pub fn name(&self) -> &ConfigName {
        &self.name
    }

    /// Records a human-readable description shown by introspection.
    #[must_use]
    pub fn with_description(self, description: impl Into<String>) -> Self {
        self.registry.set_description(&self.name, description.into());
        self
    }

    /// Calls the active implementation.
    pub fn call(&self, args: A) -> R {
        let active = self.registry.active_override(&self.name);
        invoke(&self.name, &self.original, active.as_ref(), args)
    }

    /// Calls the declared default, bypassing any override.
    pub fn call_original(&self, args: A) -> R {
        (self.original)(args)
    }
}

impl<R: ConfigOutput> Configurable<(), R> {
    /// Calls a zero-argument configuration function.
    pub fn get(&self) -> R {
        self.call(())
    }
}

pub(crate) fn invoke<A, R>(
    name: &ConfigName,
    original: &DynFn<A, R>,
    active: Option<&Override>,
    args: A,
) -> R
where
    A: 'static,
    R: ConfigOutput,
{
    match active {
        None => original(args),
        Some(Override::Constant { value, origin }) => match value.decode::<R>() {
            Ok(decoded) => decoded,
            Err(err) => {
                warn!(config = %name, %origin, error = %err, "ignoring constant override");
                original(args)
            }
        },
        Some(Override::Function { callable, .. }) => {
            match callable.downcast_ref::<Replacement<A, R>>() {
                Some(Replacement::Plain(replacement)) => replacement(args),
                Some(Replacement::WithOriginal(replacement)) => {
                    replacement(args, original.as_ref())
                }
                None => {
                    warn!(config = %name, "ignoring replacement with a different signature");
                    original(args)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use knob_primitives::RawValue;

    #[test]
    fn call_original_bypasses_override() {
        let registry = Registry::new();
        let handle = registry.declare("app.mode", || "safe".to_owned()).unwrap();
        registry.replace("app.mode", |()| "fast".to_owned()).unwrap();

        assert_eq!(handle.get(), "fast");
        assert_eq!(handle.call_original(()), "safe");
    }

    #[test]
    fn tuple_arguments_reach_replacement() {
        let registry = Registry::new();
        let join = registry
            .declare_with_args("text.join", |(left, right): (String, String)| {
                format!("{left}{right}")
            })
            .unwrap();

        registry
            .replace("text.join", |(left, right): (String, String)| {
                format!("{left}-{right}")
            })
            .unwrap();

        assert_eq!(join.call(("a".into(), "b".into())), "a-b");
    }

    #[test]
    fn constant_ignores_arguments() {
        let registry = Registry::new();
        let scale = registry
            .declare_with_args("math.scale", |factor: f64| factor * 2.0)
            .unwrap();

        registry
            .replace_value("math.scale", RawValue::parse("1,5"), "test")
            .unwrap();

        assert!((scale.call(10.0) - 1.5).abs() < f64::EPSILON);
    }

    #[test]
    fn replacement_installed_before_mismatched_declaration_is_ignored() {
        let registry = Registry::new();
        registry.replace("app.level", |()| "loud".to_owned()).unwrap();

        let level = registry.declare("app.level", || 3_u8).unwrap();
        assert_eq!(level.get(), 3);
    }

    #[test]
    fn description_is_recorded() {
        let registry = Registry::new();
        let handle = registry
            .declare("app.debug", || false)
            .unwrap()
            .with_description("Enables debug output");

        assert_eq!(handle.name().as_str(), "app.debug");
        let active = registry.list_active();
        assert_eq!(active[0].description(), Some("Enables debug output"));
    }
}
