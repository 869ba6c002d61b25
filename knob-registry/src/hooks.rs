//! Link-time registration hooks.
//!
//! Crates declare configuration functions and overrides with the
//! `#[replaceable]` and `#[replace]` attributes, which submit hooks through
//! [`inventory`]. Running the hooks at startup stands in for the declarations
//! a module would otherwise perform as a side effect of being loaded.

use tracing::{debug, info};

use crate::registry::{Registry, RegistryResult};

/// Declares one configuration function in the global registry.
#[derive(Debug)]
pub struct DeclarationHook {
    name: &'static str,
    declare: fn(),
}

impl DeclarationHook {
    /// Creates a hook; `declare` must register `name` when run.
    #[must_use]
    pub const fn new(name: &'static str, declare: fn()) -> Self {
        Self { name, declare }
    }

    /// Function name the hook declares, for diagnostics.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }
}

inventory::collect!(DeclarationHook);

/// Installs one override into a registry.
#[derive(Debug)]
pub struct OverrideHook {
    target: &'static str,
    install: fn(&Registry) -> RegistryResult<()>,
}

impl OverrideHook {
    /// Creates a hook; `install` must replace `target` in the given registry.
    #[must_use]
    pub const fn new(target: &'static str, install: fn(&Registry) -> RegistryResult<()>) -> Self {
        Self { target, install }
    }

    /// Configuration name the hook replaces.
    #[must_use]
    pub const fn target(&self) -> &'static str {
        self.target
    }
}

inventory::collect!(OverrideHook);

/// Runs every submitted [`DeclarationHook`], returning how many ran.
///
/// Declarations made through `#[replaceable]` otherwise happen lazily on first
/// call; running the hooks makes them visible to introspection and to the
/// signature checks of later replacements. Each hook stores its default again,
/// so running them after [`Registry::reset`] restores every declaration.
pub fn declare_all() -> usize {
    let mut declared = 0;
    for hook in inventory::iter::<DeclarationHook> {
        (hook.declare)();
        debug!(function = hook.name, "ran declaration hook");
        declared += 1;
    }
    info!(declared, "declared configurable functions");
    declared
}

/// Runs every submitted [`OverrideHook`] against `registry`.
///
/// # Errors
///
/// Stops at and returns the first failed installation.
pub fn install_overrides(registry: &Registry) -> RegistryResult<usize> {
    let mut installed = 0;
    for hook in inventory::iter::<OverrideHook> {
        (hook.install)(registry)?;
        debug!(config = hook.target, "ran override hook");
        installed += 1;
    }
    info!(installed, "installed linked overrides");
    Ok(installed)
}
