//! Deferred replacement, the decorator form of [`Registry::replace`].

use knob_primitives::ConfigName;

use crate::configurable::ConfigOutput;
use crate::registry::{Registry, RegistryResult};

/// Registers a function as the override for a name and hands it back.
///
/// ```
/// use knob_registry::Registry;
///
/// let registry = Registry::new();
/// let greeting = registry.declare("app.greeting", || "hello".to_owned()).unwrap();
///
/// let shout = registry
///     .replacing("app.greeting")
///     .submit(|()| "HELLO".to_owned())
///     .unwrap();
///
/// assert_eq!(greeting.get(), "HELLO");
/// assert_eq!(shout(()), "HELLO");
/// ```
#[derive(Debug)]
#[must_use = "a replacer does nothing until a function is submitted"]
pub struct Replacer<'r> {
    registry: &'r Registry,
    name: knob_primitives::Result<ConfigName>,
}

impl<'r> Replacer<'r> {
    pub(crate) fn new(registry: &'r Registry, name: knob_primitives::Result<ConfigName>) -> Self {
        Self { registry, name }
    }

    /// Installs `replacement` and returns it unchanged.
    ///
    /// # Errors
    ///
    /// See [`Registry::replace`].
    pub fn submit<A, R, F>(self, replacement: F) -> RegistryResult<F>
    where
        A: 'static,
        R: ConfigOutput,
        F: Fn(A) -> R + Clone + Send + Sync + 'static,
    {
        self.registry.replace(self.name?, replacement.clone())?;
        Ok(replacement)
    }

    /// Installs `replacement` so that it receives the original function, and
    /// returns it unchanged.
    ///
    /// # Errors
    ///
    /// See [`Registry::replace_with_original`].
    pub fn submit_with_original<A, R, F>(self, replacement: F) -> RegistryResult<F>
    where
        A: 'static,
        R: ConfigOutput,
        F: Fn(A, &dyn Fn(A) -> R) -> R + Clone + Send + Sync + 'static,
    {
        self.registry
            .replace_with_original(self.name?, replacement.clone())?;
        Ok(replacement)
    }
}

#[cfg(test)]
mod tests {
    use crate::{Registry, RegistryError};

    fn shout(text: String) -> String {
        text.to_uppercase()
    }

    #[test]
    fn submitted_function_stays_callable() {
        let registry = Registry::new();
        let echo = registry
            .declare_with_args("text.echo", |text: String| text)
            .unwrap();

        let returned = registry.replacing("text.echo").submit(shout).unwrap();

        assert_eq!(returned("direct".into()), "DIRECT");
        assert_eq!(echo.call("via registry".into()), "VIA REGISTRY");
    }

    #[test]
    fn submit_with_original_composes() {
        let registry = Registry::new();
        let base = registry.declare("app.base", || "x".to_owned()).unwrap();

        registry
            .replacing("app.base")
            .submit_with_original(|(), original: &dyn Fn(()) -> String| original(()) + "y")
            .unwrap();

        assert_eq!(base.get(), "xy");
    }

    #[test]
    fn invalid_name_surfaces_on_submit() {
        let registry = Registry::new();
        let err = registry
            .replacing("not valid")
            .submit(|()| 1_u8)
            .map(drop)
            .expect_err("whitespace in name");
        assert!(matches!(err, RegistryError::InvalidName(_)));
    }
}
