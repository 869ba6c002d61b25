//! Configuration names.

use std::borrow::Borrow;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Dotted identifier of a replaceable configuration function.
///
/// Names are conventionally `<module-path>.<function-name>`. Lookups are
/// case-sensitive; only the environment loader folds case.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ConfigName(String);

impl ConfigName {
    /// Creates a configuration name after validating its format.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfigName`] if the name is empty, contains whitespace or control characters, or has an empty segment.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        validate_name(&name)?;
        Ok(Self(name))
    }

    /// Derives the conventional name for a function from its Rust module path.
    ///
    /// `my_app::settings` and `debug` become `my_app.settings.debug`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfigName`] if the joined name fails validation.
    pub fn from_module_path(module_path: &str, function: &str) -> Result<Self> {
        let mut name = module_path.replace("::", ".");
        if !name.is_empty() {
            name.push('.');
        }
        name.push_str(function);
        Self::new(name)
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Iterates over the dot-separated segments.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('.')
    }
}

impl Display for ConfigName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ConfigName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for ConfigName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl FromStr for ConfigName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for ConfigName {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl TryFrom<&str> for ConfigName {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        Self::new(value)
    }
}

impl From<ConfigName> for String {
    fn from(value: ConfigName) -> Self {
        value.0
    }
}

/// Conversion into a validated [`ConfigName`].
///
/// Lets registry APIs accept string literals as well as prebuilt names.
pub trait IntoConfigName {
    /// Performs the conversion.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfigName`] when validation fails.
    fn into_config_name(self) -> Result<ConfigName>;
}

impl IntoConfigName for ConfigName {
    fn into_config_name(self) -> Result<ConfigName> {
        Ok(self)
    }
}

impl IntoConfigName for &ConfigName {
    fn into_config_name(self) -> Result<ConfigName> {
        Ok(self.clone())
    }
}

impl IntoConfigName for &str {
    fn into_config_name(self) -> Result<ConfigName> {
        ConfigName::new(self)
    }
}

impl IntoConfigName for String {
    fn into_config_name(self) -> Result<ConfigName> {
        ConfigName::new(self)
    }
}

fn validate_name(name: &str) -> Result<()> {
    let reject = |reason: &str| Error::InvalidConfigName {
        name: name.into(),
        reason: reason.into(),
    };

    if name.is_empty() {
        return Err(reject("name cannot be empty"));
    }

    if name.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(reject("name cannot contain whitespace or control characters"));
    }

    if name.split('.').any(str::is_empty) {
        return Err(reject("name cannot contain an empty segment"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_dotted_names() {
        let name = ConfigName::new("pkg.sub.item").expect("name");
        assert_eq!(name.as_str(), "pkg.sub.item");
        assert_eq!(name.segments().collect::<Vec<_>>(), ["pkg", "sub", "item"]);

        let flat = ConfigName::new("debug").expect("single segment");
        assert_eq!(flat.to_string(), "debug");
    }

    #[test]
    fn rejects_malformed_names() {
        for bad in ["", "pkg..item", ".pkg", "pkg.", "pkg item", "pkg\titem"] {
            let err = ConfigName::new(bad).expect_err(bad);
            assert!(matches!(err, Error::InvalidConfigName { .. }), "{bad}");
        }
    }

    #[test]
    fn long_names_are_accepted() {
        let long = format!("pkg.{}", "x".repeat(300));
        let name = ConfigName::new(long.clone()).expect("no length limit");
        assert_eq!(name.as_str(), long);
    }

    #[test]
    fn derives_from_module_path() {
        let name = ConfigName::from_module_path("my_app::settings", "debug").expect("name");
        assert_eq!(name.as_str(), "my_app.settings.debug");

        let bare = ConfigName::from_module_path("", "debug").expect("name");
        assert_eq!(bare.as_str(), "debug");
    }

    #[test]
    fn deserialization_validates() {
        let name: ConfigName = serde_json::from_str("\"app.debug\"").expect("valid");
        assert_eq!(name.as_str(), "app.debug");

        assert!(serde_json::from_str::<ConfigName>("\"app..debug\"").is_err());
    }
}
