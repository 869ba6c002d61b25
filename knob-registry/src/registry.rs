//! Process-wide store of default and override entries.

use std::any::{Any, TypeId, type_name};
use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};
use std::sync::{Arc, OnceLock, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use knob_primitives::{ConfigName, IntoConfigName, RawValue};
use thiserror::Error;
use tracing::{debug, warn};

use crate::configurable::{ConfigOutput, Configurable};
use crate::introspect::{ActiveConfig, ConfigSource, Evaluator, Sampler};
use crate::replacer::Replacer;

/// Result alias for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

pub(crate) type DynFn<A, R> = Arc<dyn Fn(A) -> R + Send + Sync>;
pub(crate) type DynComposed<A, R> = Arc<dyn Fn(A, &dyn Fn(A) -> R) -> R + Send + Sync>;

/// Typed replacement stored behind an erased override entry.
pub(crate) enum Replacement<A, R> {
    Plain(DynFn<A, R>),
    WithOriginal(DynComposed<A, R>),
}

/// Identity of a `fn(A) -> R` signature.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Signature {
    id: TypeId,
    name: &'static str,
}

impl Signature {
    pub(crate) fn of<A: 'static, R: 'static>() -> Self {
        Self {
            id: TypeId::of::<fn(A) -> R>(),
            name: type_name::<fn(A) -> R>(),
        }
    }
}

#[derive(Clone)]
pub(crate) struct DefaultEntry {
    callable: Arc<dyn Any + Send + Sync>,
    signature: Signature,
    description: Option<String>,
    sampler: Option<Sampler>,
}

#[derive(Clone)]
pub(crate) enum Override {
    Function {
        callable: Arc<dyn Any + Send + Sync>,
        signature: Signature,
        includes_original: bool,
    },
    Constant {
        value: RawValue,
        origin: String,
    },
}

impl Override {
    fn source(&self) -> ConfigSource {
        match self {
            Self::Function {
                includes_original, ..
            } => ConfigSource::Override {
                includes_original: *includes_original,
            },
            Self::Constant { origin, .. } => ConfigSource::Constant {
                origin: origin.clone(),
            },
        }
    }
}

#[derive(Clone, Default)]
struct Slot {
    default: Option<DefaultEntry>,
    replacement: Option<Override>,
}

/// What a configuration name resolves to right now.
pub enum Resolved<A, R> {
    /// No override is installed; the declared default runs.
    Default(Arc<dyn Fn(A) -> R + Send + Sync>),
    /// A replacement called with the caller's arguments only.
    Replacement(Arc<dyn Fn(A) -> R + Send + Sync>),
    /// A replacement that additionally receives the original function.
    Composed(Arc<dyn Fn(A, &dyn Fn(A) -> R) -> R + Send + Sync>),
    /// A constant (environment or file) override.
    Constant(RawValue),
}

impl<A, R> Resolved<A, R> {
    /// Returns whether the active replacement receives the original function.
    #[must_use]
    pub fn includes_original(&self) -> bool {
        matches!(self, Self::Composed(_))
    }
}

impl<A, R> fmt::Debug for Resolved<A, R> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default(_) => f.write_str("Default"),
            Self::Replacement(_) => f.write_str("Replacement"),
            Self::Composed(_) => f.write_str("Composed"),
            Self::Constant(value) => f.debug_tuple("Constant").field(value).finish(),
        }
    }
}

/// Diagnostic raised when an override replaces an earlier override.
///
/// The new override still wins; this is reported, never returned as an error.
#[derive(Debug, Clone, PartialEq)]
pub struct DuplicateOverride {
    /// Name whose override was replaced.
    pub name: ConfigName,
    /// Kind of the override that was displaced.
    pub previous: ConfigSource,
}

impl Display for DuplicateOverride {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "replacing already replaced function for `{}` (previous: {})",
            self.name, self.previous
        )
    }
}

/// Errors produced by declaration and replacement.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Configuration name failed validation.
    #[error(transparent)]
    InvalidName(#[from] knob_primitives::Error),

    /// Replacement does not fit the declared function.
    #[error("invalid replacement for `{name}`: {reason}")]
    InvalidReplacement {
        /// Name the replacement targeted.
        name: ConfigName,
        /// Human-readable reason for rejection.
        reason: String,
    },

    /// A typed lookup used a signature other than the declared one.
    #[error("`{name}` is declared as {declared}, not {requested}")]
    SignatureMismatch {
        /// Name that was looked up.
        name: ConfigName,
        /// Declared signature.
        declared: &'static str,
        /// Signature used by the caller.
        requested: &'static str,
    },
}

/// Store mapping configuration names to defaults and overrides.
///
/// Cloning a registry yields another handle to the same store. Tests build
/// independent instances with [`Registry::new`]; application code shares
/// [`Registry::global`].
#[derive(Clone, Default)]
pub struct Registry {
    inner: Arc<RwLock<BTreeMap<ConfigName, Slot>>>,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let inner = self.read();
        let declared: Vec<_> = inner
            .iter()
            .filter(|(_, slot)| slot.default.is_some())
            .map(|(name, _)| name.as_str())
            .collect();
        let overridden: Vec<_> = inner
            .iter()
            .filter(|(_, slot)| slot.replacement.is_some())
            .map(|(name, _)| name.as_str())
            .collect();
        f.debug_struct("Registry")
            .field("declared", &declared)
            .field("overridden", &overridden)
            .finish()
    }
}

impl Registry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the process-wide registry.
    pub fn global() -> &'static Registry {
        static GLOBAL: OnceLock<Registry> = OnceLock::new();
        GLOBAL.get_or_init(Registry::new)
    }

    /// Declares a zero-argument configuration function.
    ///
    /// Stores `default` under `name`, overwriting any earlier default, and
    /// returns the handle through which the function must be called.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InvalidName`] if `name` fails validation.
    pub fn declare<R, F>(&self, name: impl IntoConfigName, default: F) -> RegistryResult<Configurable<(), R>>
    where
        R: ConfigOutput,
        F: Fn() -> R + Send + Sync + 'static,
    {
        let name = name.into_config_name()?;
        let original: DynFn<(), R> = Arc::new(move |()| default());
        let sampler = crate::introspect::evaluator_for(name.clone(), Arc::clone(&original));
        self.store_default(&name, Arc::clone(&original), Some(sampler));
        Ok(Configurable::new(name, self.clone(), original))
    }

    /// Declares a configuration function taking an argument value.
    ///
    /// Several parameters are passed as a tuple. Functions declared this way
    /// cannot be evaluated by introspection, which has no arguments to supply.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InvalidName`] if `name` fails validation.
    pub fn declare_with_args<A, R, F>(
        &self,
        name: impl IntoConfigName,
        default: F,
    ) -> RegistryResult<Configurable<A, R>>
    where
        A: 'static,
        R: ConfigOutput,
        F: Fn(A) -> R + Send + Sync + 'static,
    {
        let name = name.into_config_name()?;
        let original: DynFn<A, R> = Arc::new(default);
        self.store_default(&name, Arc::clone(&original), None);
        Ok(Configurable::new(name, self.clone(), original))
    }

    fn store_default<A: 'static, R: 'static>(
        &self,
        name: &ConfigName,
        original: DynFn<A, R>,
        sampler: Option<Sampler>,
    ) {
        let signature = Signature::of::<A, R>();
        let mut inner = self.write();
        let slot = inner.entry(name.clone()).or_default();

        if let Some(Override::Function {
            signature: installed,
            ..
        }) = &slot.replacement
        {
            if *installed != signature {
                warn!(
                    config = %name,
                    declared = signature.name,
                    replacement = installed.name,
                    "installed replacement does not match the declared signature; it will be ignored"
                );
            }
        }

        let description = slot
            .default
            .take()
            .and_then(|previous| previous.description);
        slot.default = Some(DefaultEntry {
            callable: Arc::new(original),
            signature,
            description,
            sampler,
        });
        debug!(config = %name, "registered configurable function");
    }

    pub(crate) fn set_description(&self, name: &ConfigName, description: String) {
        let mut inner = self.write();
        if let Some(default) = inner.get_mut(name).and_then(|slot| slot.default.as_mut()) {
            default.description = Some(description);
        }
    }

    /// Installs a replacement called with the caller's arguments only.
    ///
    /// Returns the diagnostic if an earlier override was displaced.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InvalidName`] for a malformed name and
    /// [`RegistryError::InvalidReplacement`] when the replacement's signature
    /// differs from the declared default's. The store is unchanged on error.
    pub fn replace<A, R, F>(
        &self,
        name: impl IntoConfigName,
        replacement: F,
    ) -> RegistryResult<Option<DuplicateOverride>>
    where
        A: 'static,
        R: ConfigOutput,
        F: Fn(A) -> R + Send + Sync + 'static,
    {
        let name = name.into_config_name()?;
        let replacement: Replacement<A, R> = Replacement::Plain(Arc::new(replacement));
        self.install_function(name, replacement, false)
    }

    /// Installs a replacement that also receives the original function.
    ///
    /// # Errors
    ///
    /// Same as [`Registry::replace`].
    pub fn replace_with_original<A, R, F>(
        &self,
        name: impl IntoConfigName,
        replacement: F,
    ) -> RegistryResult<Option<DuplicateOverride>>
    where
        A: 'static,
        R: ConfigOutput,
        F: Fn(A, &dyn Fn(A) -> R) -> R + Send + Sync + 'static,
    {
        let name = name.into_config_name()?;
        let replacement: Replacement<A, R> = Replacement::WithOriginal(Arc::new(replacement));
        self.install_function(name, replacement, true)
    }

    /// Starts a deferred replacement for `name`.
    ///
    /// The returned [`Replacer`] registers a function and hands it back
    /// unchanged, so the function stays directly callable.
    pub fn replacing(&self, name: impl IntoConfigName) -> Replacer<'_> {
        Replacer::new(self, name.into_config_name())
    }

    /// Installs a constant override, as the environment and file loaders do.
    ///
    /// Constants are checked against the declared return type on each call;
    /// one that does not decode is skipped in favour of the default.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InvalidName`] for a malformed name.
    pub fn replace_value(
        &self,
        name: impl IntoConfigName,
        value: impl Into<RawValue>,
        origin: impl Into<String>,
    ) -> RegistryResult<Option<DuplicateOverride>> {
        let name = name.into_config_name()?;
        let origin = origin.into();
        debug!(config = %name, %origin, "replacing function with constant");
        self.install(
            name,
            Override::Constant {
                value: value.into(),
                origin,
            },
        )
    }

    fn install_function<A: 'static, R: 'static>(
        &self,
        name: ConfigName,
        replacement: Replacement<A, R>,
        includes_original: bool,
    ) -> RegistryResult<Option<DuplicateOverride>> {
        debug!(config = %name, includes_original, "replacing configurable function");
        self.install(
            name,
            Override::Function {
                callable: Arc::new(replacement),
                signature: Signature::of::<A, R>(),
                includes_original,
            },
        )
    }

    /// Stores `replacement`, checking a function's signature against the
    /// declared default under the same write lock.
    fn install(
        &self,
        name: ConfigName,
        replacement: Override,
    ) -> RegistryResult<Option<DuplicateOverride>> {
        let mut inner = self.write();
        if let Override::Function { signature, .. } = &replacement {
            let declared = inner
                .get(&name)
                .and_then(|slot| slot.default.as_ref())
                .map(|default| default.signature);
            if let Some(declared) = declared.filter(|declared| declared != signature) {
                return Err(RegistryError::InvalidReplacement {
                    name,
                    reason: format!("expected {}, found {}", declared.name, signature.name),
                });
            }
        }

        let slot = inner.entry(name.clone()).or_default();
        let duplicate = slot
            .replacement
            .replace(replacement)
            .map(|previous| DuplicateOverride {
                name,
                previous: previous.source(),
            });
        drop(inner);

        if let Some(duplicate) = &duplicate {
            warn!(config = %duplicate.name, previous = %duplicate.previous, "replacing already replaced function");
        }
        Ok(duplicate)
    }

    /// Removes the override for `name`, returning whether one existed.
    pub fn clear_override(&self, name: &str) -> bool {
        let mut inner = self.write();
        let Some(slot) = inner.get_mut(name) else {
            return false;
        };
        let removed = slot.replacement.take().is_some();
        if slot.default.is_none() {
            inner.remove(name);
        }
        removed
    }

    /// Resolves what a call of `name` would run right now.
    ///
    /// Returns `Ok(None)` when nothing is declared or installed for the name.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::SignatureMismatch`] when `A` and `R` differ
    /// from the declared or installed signature.
    pub fn resolve<A: 'static, R: 'static>(&self, name: &str) -> RegistryResult<Option<Resolved<A, R>>> {
        let Some((config, default, replacement)) = self.lookup(name) else {
            return Ok(None);
        };

        let requested = Signature::of::<A, R>();
        let mismatch = |declared: Signature| RegistryError::SignatureMismatch {
            name: config.clone(),
            declared: declared.name,
            requested: requested.name,
        };

        match (replacement, default) {
            (Some(Override::Constant { value, .. }), _) => Ok(Some(Resolved::Constant(value))),
            (Some(Override::Function { callable, signature, .. }), _) => {
                let replacement = callable
                    .downcast_ref::<Replacement<A, R>>()
                    .ok_or_else(|| mismatch(signature))?;
                Ok(Some(match replacement {
                    Replacement::Plain(function) => Resolved::Replacement(Arc::clone(function)),
                    Replacement::WithOriginal(function) => Resolved::Composed(Arc::clone(function)),
                }))
            }
            (None, Some(default)) => {
                let function = default
                    .callable
                    .downcast_ref::<DynFn<A, R>>()
                    .ok_or_else(|| mismatch(default.signature))?;
                Ok(Some(Resolved::Default(Arc::clone(function))))
            }
            (None, None) => Ok(None),
        }
    }

    pub(crate) fn active_override(&self, name: &ConfigName) -> Option<Override> {
        self.read()
            .get(name)
            .and_then(|slot| slot.replacement.clone())
    }

    fn lookup(&self, name: &str) -> Option<(ConfigName, Option<DefaultEntry>, Option<Override>)> {
        let inner = self.read();
        let (config, slot) = inner.get_key_value(name)?;
        Some((config.clone(), slot.default.clone(), slot.replacement.clone()))
    }

    /// Returns whether a default is declared for `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.read()
            .get(name)
            .is_some_and(|slot| slot.default.is_some())
    }

    /// Returns whether an override is installed for `name`.
    #[must_use]
    pub fn is_overridden(&self, name: &str) -> bool {
        self.read()
            .get(name)
            .is_some_and(|slot| slot.replacement.is_some())
    }

    /// Number of names with a default or an override.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Returns whether the registry holds no entries at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Clears every default and override.
    pub fn reset(&self) {
        self.write().clear();
        debug!("configuration registry reset");
    }

    /// Snapshots every name with the implementation currently active for it.
    ///
    /// Entries are sorted by name. Overrides are reported where present, the
    /// default otherwise. The snapshot is taken under the read lock; evaluating
    /// an entry afterwards does not touch the store.
    #[must_use]
    pub fn list_active(&self) -> Vec<ActiveConfig> {
        let inner = self.read();
        inner
            .iter()
            .map(|(name, slot)| {
                let source = slot
                    .replacement
                    .as_ref()
                    .map_or(ConfigSource::Default, Override::source);
                let evaluator = match (&slot.default, &slot.replacement) {
                    (Some(DefaultEntry { sampler: Some(sampler), .. }), replacement) => {
                        Evaluator::Sampler {
                            sampler: Arc::clone(sampler),
                            replacement: replacement.clone(),
                        }
                    }
                    (_, Some(Override::Constant { value, .. })) => {
                        Evaluator::Constant(value.value().clone())
                    }
                    (Some(_), _) => Evaluator::RequiresArguments,
                    (None, _) => Evaluator::Undeclared,
                };
                ActiveConfig::new(
                    name.clone(),
                    slot.default
                        .as_ref()
                        .and_then(|default| default.description.clone()),
                    source,
                    evaluator,
                )
            })
            .collect()
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<ConfigName, Slot>> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<ConfigName, Slot>> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}
