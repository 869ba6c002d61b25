//! Runtime half of the `#[replaceable]` attribute. Not public API.

use knob_primitives::ConfigName;

use crate::configurable::{ConfigOutput, Configurable};
use crate::registry::Registry;

fn config_name(module_path: &str, function: &str, explicit: Option<&str>) -> ConfigName {
    let name = match explicit {
        Some(explicit) => ConfigName::new(explicit),
        None => ConfigName::from_module_path(module_path, function),
    };
    // Explicit names are checked at expansion; derived names come from identifiers.
    name.unwrap_or_else(|err| panic!("#[replaceable] produced an invalid name: {err}"))
}

fn describe<A, R>(handle: Configurable<A, R>, description: Option<&str>) -> Configurable<A, R>
where
    A: 'static,
    R: ConfigOutput,
{
    match description {
        Some(description) => handle.with_description(description),
        None => handle,
    }
}

/// Declares a zero-argument function in the global registry.
///
/// # Panics
///
/// Panics if the name is invalid, which the attribute rules out at expansion.
pub fn declare<R, F>(
    module_path: &str,
    function: &str,
    explicit: Option<&str>,
    description: Option<&str>,
    default: F,
) -> Configurable<(), R>
where
    R: ConfigOutput,
    F: Fn() -> R + Send + Sync + 'static,
{
    let name = config_name(module_path, function, explicit);
    let handle = Registry::global()
        .declare(name, default)
        .unwrap_or_else(|err| panic!("{err}"));
    describe(handle, description)
}

/// Declares a function taking arguments in the global registry.
///
/// # Panics
///
/// Panics if the name is invalid, which the attribute rules out at expansion.
pub fn declare_with_args<A, R, F>(
    module_path: &str,
    function: &str,
    explicit: Option<&str>,
    description: Option<&str>,
    default: F,
) -> Configurable<A, R>
where
    A: 'static,
    R: ConfigOutput,
    F: Fn(A) -> R + Send + Sync + 'static,
{
    let name = config_name(module_path, function, explicit);
    let handle = Registry::global()
        .declare_with_args(name, default)
        .unwrap_or_else(|err| panic!("{err}"));
    describe(handle, description)
}
