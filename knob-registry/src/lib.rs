//! Registry of replaceable configuration functions.
//!
//! A configuration function is declared once with its default implementation
//! and called through a [`Configurable`] handle. Downstream code, environment
//! variables, or local setup modules may install an override for the same
//! name at any time; every call re-resolves which implementation runs.

#![warn(missing_docs, clippy::pedantic)]

mod configurable;
pub mod hooks;
pub mod introspect;
#[doc(hidden)]
pub mod macro_support;
mod registry;
mod replacer;

pub use configurable::{ConfigOutput, Configurable};
pub use hooks::{DeclarationHook, OverrideHook, declare_all, install_overrides};
pub use introspect::{ActiveConfig, ConfigSource, EVALUATION_FAILED, EvaluationError, render_table};
pub use registry::{DuplicateOverride, Registry, RegistryError, RegistryResult, Resolved};
pub use replacer::Replacer;

pub use knob_primitives::{ConfigName, ConfigValue, IntoConfigName, RawValue};
