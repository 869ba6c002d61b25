//! Per-deployment overrides found next to the application module.
//!
//! The loader takes the `app_module` setting, say `shop.app.web`, and looks
//! for `shop.app.web.local_setup`, then `shop.app.local_setup`, then
//! `shop.local_setup`, stopping at the first module that exists. Modules come
//! from a [`ModuleSource`]: setup functions linked into the binary, TOML files
//! under a directory, or a chain of both.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use knob_primitives::{ConfigName, ConfigValue, RawValue};
use knob_registry::{Registry, RegistryError};
use toml::{Table, Value};
use tracing::{debug, info};

use crate::error::{ConfigError, ConfigResult};
use crate::settings::Settings;

/// Suffix appended to each candidate path.
pub const LOCAL_SETUP: &str = "local_setup";

/// Something that can load a named local-setup module into a registry.
pub trait ModuleSource: Send + Sync {
    /// Loads `module` into `registry`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ModuleNotFound`] when the module does not exist
    /// and any other error when it exists but fails to load.
    fn load(&self, module: &str, registry: &Registry) -> ConfigResult<()>;
}

/// A local-setup module compiled into the binary.
///
/// Submit one with [`local_setup!`](crate::local_setup); the apply function
/// typically calls `replace` or `replace_value` on the registry.
pub struct LocalSetup {
    module: &'static str,
    apply: fn(&Registry) -> ConfigResult<()>,
}

impl LocalSetup {
    /// Creates a module entry named `module`, e.g. `"shop.local_setup"`.
    #[must_use]
    pub const fn new(module: &'static str, apply: fn(&Registry) -> ConfigResult<()>) -> Self {
        Self { module, apply }
    }

    /// Dotted module name.
    #[must_use]
    pub const fn module(&self) -> &'static str {
        self.module
    }
}

impl fmt::Debug for LocalSetup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalSetup")
            .field("module", &self.module)
            .finish_non_exhaustive()
    }
}

inventory::collect!(LocalSetup);

/// Registers a linked local-setup module.
///
/// ```ignore
/// fn apply(registry: &knob::Registry) -> knob::config::ConfigResult<()> {
///     registry.replace("debug", |()| true)?;
///     Ok(())
/// }
///
/// knob::local_setup!("shop.local_setup", apply);
/// ```
#[macro_export]
macro_rules! local_setup {
    ($module:expr, $apply:path $(,)?) => {
        $crate::inventory::submit! {
            $crate::LocalSetup::new($module, $apply)
        }
    };
}

/// Modules submitted with [`local_setup!`](crate::local_setup).
#[derive(Clone, Copy, Debug, Default)]
pub struct LinkedModules;

impl ModuleSource for LinkedModules {
    fn load(&self, module: &str, registry: &Registry) -> ConfigResult<()> {
        let mut found = false;
        for setup in inventory::iter::<LocalSetup> {
            if setup.module == module {
                (setup.apply)(registry)?;
                found = true;
            }
        }
        if found {
            Ok(())
        } else {
            Err(ConfigError::ModuleNotFound {
                module: module.to_owned(),
            })
        }
    }
}

/// TOML files laid out like module paths under a root directory.
///
/// `a.b.local_setup` maps to `<root>/a/b/local_setup.toml`. Every leaf of the
/// document becomes a constant override; nested tables extend the name, so
/// `[pkg] item = 1` overrides `pkg.item`.
#[derive(Clone, Debug)]
pub struct FileModules {
    root: PathBuf,
}

impl FileModules {
    /// Creates a source rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// File that backs `module`.
    #[must_use]
    pub fn path_for(&self, module: &str) -> PathBuf {
        let mut path = self.root.clone();
        path.extend(module.split('.'));
        path.set_extension("toml");
        path
    }

    fn read(path: &Path) -> ConfigResult<Table> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_owned(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::TomlParse {
            path: path.to_owned(),
            source,
        })
    }
}

impl ModuleSource for FileModules {
    fn load(&self, module: &str, registry: &Registry) -> ConfigResult<()> {
        let path = self.path_for(module);
        let table = match Self::read(&path) {
            Err(ConfigError::Io { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
                return Err(ConfigError::ModuleNotFound {
                    module: module.to_owned(),
                });
            }
            other => other?,
        };

        let mut entries = Vec::new();
        flatten(None, &table, &mut entries)?;

        let origin = format!("file:{}", path.display());
        for (name, value) in entries {
            registry.replace_value(name, value, origin.clone())?;
        }
        Ok(())
    }
}

fn flatten(
    prefix: Option<&str>,
    table: &Table,
    entries: &mut Vec<(ConfigName, RawValue)>,
) -> ConfigResult<()> {
    for (key, value) in table {
        let name = match prefix {
            Some(prefix) => format!("{prefix}.{key}"),
            None => key.clone(),
        };
        let constant = match value {
            Value::Table(nested) => {
                flatten(Some(&name), nested, entries)?;
                continue;
            }
            Value::String(text) => ConfigValue::Text(text.clone()),
            #[allow(clippy::cast_precision_loss)]
            Value::Integer(number) => ConfigValue::Number(*number as f64),
            Value::Float(number) => ConfigValue::Number(*number),
            Value::Boolean(flag) => ConfigValue::Bool(*flag),
            Value::Datetime(datetime) => ConfigValue::Text(datetime.to_string()),
            Value::Array(_) => {
                return Err(ConfigError::InvalidValue {
                    name,
                    reason: "arrays cannot be used as constant overrides".to_owned(),
                });
            }
        };
        let name = ConfigName::new(name).map_err(RegistryError::from)?;
        entries.push((name, RawValue::typed(constant)));
    }
    Ok(())
}

/// Tries several sources in order, moving on only when a module is missing.
#[derive(Default)]
pub struct ChainedModules {
    sources: Vec<Box<dyn ModuleSource>>,
}

impl ChainedModules {
    /// Creates an empty chain, which finds no modules.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a source.
    #[must_use]
    pub fn with(mut self, source: impl ModuleSource + 'static) -> Self {
        self.sources.push(Box::new(source));
        self
    }
}

impl fmt::Debug for ChainedModules {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainedModules")
            .field("sources", &self.sources.len())
            .finish()
    }
}

impl ModuleSource for ChainedModules {
    fn load(&self, module: &str, registry: &Registry) -> ConfigResult<()> {
        for source in &self.sources {
            match source.load(module, registry) {
                Err(err) if err.is_not_found() => {}
                other => return other,
            }
        }
        Err(ConfigError::ModuleNotFound {
            module: module.to_owned(),
        })
    }
}

/// Candidate module names for an application path, longest first.
#[must_use]
pub fn candidates(app_module: &str) -> Vec<String> {
    let mut parts: Vec<&str> = app_module
        .split('.')
        .filter(|part| !part.is_empty())
        .collect();
    let mut modules = Vec::with_capacity(parts.len());
    while !parts.is_empty() {
        modules.push(format!("{}.{LOCAL_SETUP}", parts.join(".")));
        parts.pop();
    }
    modules
}

/// Loads the first local-setup module found for the `app_module` setting.
///
/// Returns the module that was loaded, or `None` when no candidate exists.
///
/// # Errors
///
/// Returns any failure other than a missing module, such as an unreadable
/// file or an apply function error.
pub fn load_from_local_setup(
    registry: &Registry,
    source: &dyn ModuleSource,
) -> ConfigResult<Option<String>> {
    let app_module = Settings::declare(registry)?.app_module();
    for module in candidates(&app_module) {
        match source.load(&module, registry) {
            Ok(()) => {
                info!(%module, "loaded config from local setup");
                return Ok(Some(module));
            }
            Err(err) if err.is_not_found() => debug!(%module, "local setup module not found"),
            Err(err) => return Err(err),
        }
    }
    debug!(%app_module, "no local setup found");
    Ok(None)
}
