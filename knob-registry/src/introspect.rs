//! Read-only view of the active configuration.
//!
//! [`Registry::list_active`](crate::Registry::list_active) snapshots every
//! name together with the implementation that would run for it. Presentation
//! layers call [`ActiveConfig::evaluate`] per entry; failures come back as
//! [`EvaluationError`] so a single broken function never aborts a listing.

use std::any::Any;
use std::fmt::{self, Display, Formatter};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use knob_primitives::{ConfigName, ConfigValue};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use thiserror::Error;

use crate::configurable::{ConfigOutput, invoke};
use crate::registry::{DynFn, Override};

/// Placeholder shown for entries whose evaluation failed.
pub const EVALUATION_FAILED: &str = "error calling function";

pub(crate) type Sampler =
    Arc<dyn Fn(Option<&Override>) -> Result<Value, EvaluationError> + Send + Sync>;

/// Builds the evaluator for a zero-argument default.
pub(crate) fn evaluator_for<R: ConfigOutput>(name: ConfigName, original: DynFn<(), R>) -> Sampler {
    Arc::new(move |active: Option<&Override>| {
        let value = panic::catch_unwind(AssertUnwindSafe(|| invoke(&name, &original, active, ())))
            .map_err(|payload| EvaluationError::Panicked {
                message: panic_message(payload.as_ref()),
            })?;
        serde_json::to_value(value).map_err(|err| EvaluationError::Serialization {
            reason: err.to_string(),
        })
    })
}

pub(crate) enum Evaluator {
    Sampler {
        sampler: Sampler,
        replacement: Option<Override>,
    },
    Constant(ConfigValue),
    RequiresArguments,
    Undeclared,
}

/// Where the active implementation of a name comes from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConfigSource {
    /// The declared default.
    Default,
    /// A replacement function.
    Override {
        /// Whether the replacement receives the original function.
        includes_original: bool,
    },
    /// A constant installed by a loader.
    Constant {
        /// Where the constant was read from, e.g. `env:KNOB_DEBUG`.
        origin: String,
    },
}

impl Display for ConfigSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => f.write_str("default"),
            Self::Override {
                includes_original: false,
            } => f.write_str("override"),
            Self::Override {
                includes_original: true,
            } => f.write_str("override (with original)"),
            Self::Constant { origin } => write!(f, "constant from {origin}"),
        }
    }
}

/// Reasons an entry could not be evaluated for display.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EvaluationError {
    /// The function panicked.
    #[error("function panicked: {message}")]
    Panicked {
        /// Panic payload, when it was a string.
        message: String,
    },
    /// The function takes arguments and cannot be called without them.
    #[error("function requires arguments")]
    RequiresArguments,
    /// A replacement exists but no default was declared to type it.
    #[error("replacement installed for an undeclared function")]
    Undeclared,
    /// The result could not be serialized.
    #[error("result is not serializable: {reason}")]
    Serialization {
        /// Serializer message.
        reason: String,
    },
}

/// One name in a [`Registry::list_active`](crate::Registry::list_active) snapshot.
pub struct ActiveConfig {
    name: ConfigName,
    description: Option<String>,
    source: ConfigSource,
    evaluator: Evaluator,
}

impl fmt::Debug for ActiveConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActiveConfig")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

impl ActiveConfig {
    pub(crate) fn new(
        name: ConfigName,
        description: Option<String>,
        source: ConfigSource,
        evaluator: Evaluator,
    ) -> Self {
        Self {
            name,
            description,
            source,
            evaluator,
        }
    }

    /// Returns the configuration name.
    #[must_use]
    pub fn name(&self) -> &ConfigName {
        &self.name
    }

    /// Returns the description recorded at declaration.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Returns where the active implementation comes from.
    #[must_use]
    pub fn source(&self) -> &ConfigSource {
        &self.source
    }

    /// Calls the active implementation and returns its result as JSON.
    ///
    /// # Errors
    ///
    /// Returns an [`EvaluationError`] instead of propagating panics.
    pub fn evaluate(&self) -> Result<Value, EvaluationError> {
        match &self.evaluator {
            Evaluator::Sampler { sampler, replacement } => sampler(replacement.as_ref()),
            Evaluator::Constant(value) => Ok(value.to_json()),
            Evaluator::RequiresArguments => Err(EvaluationError::RequiresArguments),
            Evaluator::Undeclared => Err(EvaluationError::Undeclared),
        }
    }
}

impl Serialize for ActiveConfig {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("ActiveConfig", 4)?;
        state.serialize_field("name", &self.name)?;
        state.serialize_field("description", &self.description)?;
        state.serialize_field("source", &self.source)?;
        match self.evaluate() {
            Ok(value) => state.serialize_field("value", &value)?,
            Err(err) => state.serialize_field("error", &err.to_string())?,
        }
        state.end()
    }
}

/// Renders `name -> value` lines aligned on the longest name.
///
/// Entries that fail to evaluate show [`EVALUATION_FAILED`].
#[must_use]
pub fn render_table(entries: &[ActiveConfig]) -> String {
    let width = entries
        .iter()
        .map(|entry| entry.name.as_str().len())
        .max()
        .unwrap_or(0);

    let mut out = String::new();
    for entry in entries {
        let value = match entry.evaluate() {
            Ok(Value::String(text)) => text,
            Ok(value) => value.to_string(),
            Err(_) => EVALUATION_FAILED.to_owned(),
        };
        out.push_str(&format!("{:<width$} -> {value}\n", entry.name.as_str()));
    }
    out
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    use knob_primitives::RawValue;

    use crate::Registry;

    #[test]
    fn lists_union_of_defaults_and_overrides() {
        let registry = Registry::new();
        registry.declare("b.declared", || 1_i32).unwrap();
        registry
            .replace_value("a.from_env", RawValue::parse("y"), "env:KNOB_A__FROM_ENV")
            .unwrap();
        registry
            .declare("c.replaced", || "x".to_owned())
            .unwrap();
        registry.replace("c.replaced", |()| "z".to_owned()).unwrap();

        let active = registry.list_active();
        let names: Vec<_> = active.iter().map(|entry| entry.name().as_str()).collect();
        assert_eq!(names, ["a.from_env", "b.declared", "c.replaced"]);

        assert_eq!(
            active[0].source(),
            &ConfigSource::Constant {
                origin: "env:KNOB_A__FROM_ENV".into()
            }
        );
        assert_eq!(active[0].evaluate().unwrap(), Value::String("y".into()));
        assert_eq!(active[1].source(), &ConfigSource::Default);
        assert_eq!(active[1].evaluate().unwrap(), serde_json::json!(1));
        assert_eq!(active[2].evaluate().unwrap(), Value::String("z".into()));
    }

    #[test]
    fn evaluation_failures_are_reported() {
        let registry = Registry::new();
        registry
            .declare("broken.item", || -> String { panic!("boom") })
            .unwrap();
        registry
            .declare_with_args("needs.args", |count: u8| count)
            .unwrap();
        registry.replace("orphan.item", |()| 1_u8).unwrap();

        let active = registry.list_active();
        assert_eq!(
            active[0].evaluate(),
            Err(EvaluationError::Panicked {
                message: "boom".into()
            })
        );
        assert_eq!(active[1].evaluate(), Err(EvaluationError::RequiresArguments));
        assert_eq!(active[2].evaluate(), Err(EvaluationError::Undeclared));
    }

    #[test]
    fn table_aligns_names_and_masks_errors() {
        let registry = Registry::new();
        registry.declare("debug", || false).unwrap();
        registry.declare("app.module", || "app.app".to_owned()).unwrap();
        registry
            .declare("broken", || -> u8 { panic!("boom") })
            .unwrap();

        let table = render_table(&registry.list_active());
        assert_eq!(
            table,
            "app.module -> app.app\n\
             broken     -> error calling function\n\
             debug      -> false\n"
        );
    }

    #[test]
    fn serializes_value_or_error() {
        let registry = Registry::new();
        registry
            .declare("app.debug", || true)
            .unwrap()
            .with_description("Debug mode");

        let json = serde_json::to_value(registry.list_active()).unwrap();
        assert_eq!(
            json,
            serde_json::json!([{
                "name": "app.debug",
                "description": "Debug mode",
                "source": { "kind": "default" },
                "value": true,
            }])
        );
    }
}
