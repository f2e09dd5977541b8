//! Identifier types for the fleet agent.
//!
//! Modules are keyed by their name. The name travels on the wire as a plain
//! string, so the identifier is a validated newtype over `String`.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;

/// Maximum accepted length of a module name, in bytes.
pub const MAX_MODULE_NAME_LEN: usize = 128;

/// The unique name of a managed module.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ModuleId(String);

impl ModuleId {
    /// Create a `ModuleId` from a module name.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is empty, too long, or contains control
    /// characters or path separators.
    pub fn new(name: impl Into<String>) -> Result<Self, IdError> {
        let name = name.into();
        if name.is_empty() {
            return Err(IdError::Empty);
        }
        if name.len() > MAX_MODULE_NAME_LEN {
            return Err(IdError::TooLong {
                max: MAX_MODULE_NAME_LEN,
                got: name.len(),
            });
        }
        if let Some(c) = name
            .chars()
            .find(|c| c.is_control() || matches!(c, '/' | '\\'))
        {
            return Err(IdError::InvalidChar(c));
        }
        Ok(Self(name))
    }

    /// Return the module name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ModuleId({})", self.0)
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ModuleId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for ModuleId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ModuleId> for String {
    fn from(id: ModuleId) -> Self {
        id.0
    }
}

impl AsRef<str> for ModuleId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for ModuleId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Errors that can occur when parsing identifiers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    /// The module name is empty.
    #[error("module name is empty")]
    Empty,

    /// The module name exceeds the maximum length.
    #[error("module name too long: max {max} bytes, got {got}")]
    TooLong {
        /// The maximum number of bytes.
        max: usize,
        /// The actual number of bytes.
        got: usize,
    },

    /// The module name contains a character that is not allowed.
    #[error("module name contains invalid character {0:?}")]
    InvalidChar(char),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn module_id_accepts_plain_names() {
        let id = ModuleId::new("sys_watcher-2.0").unwrap();
        assert_eq!(id.as_str(), "sys_watcher-2.0");
        assert_eq!(id.to_string(), "sys_watcher-2.0");
    }

    #[test]
    fn module_id_rejects_empty() {
        assert_eq!(ModuleId::new(""), Err(IdError::Empty));
    }

    #[test]
    fn module_id_rejects_path_separators() {
        assert_eq!(ModuleId::new("../etc"), Err(IdError::InvalidChar('/')));
        assert_eq!(ModuleId::new("a\\b"), Err(IdError::InvalidChar('\\')));
        assert_eq!(ModuleId::new("a\nb"), Err(IdError::InvalidChar('\n')));
    }

    #[test]
    fn module_id_rejects_long_names() {
        let name = "x".repeat(MAX_MODULE_NAME_LEN + 1);
        assert!(matches!(
            ModuleId::new(name),
            Err(IdError::TooLong { got, .. }) if got == MAX_MODULE_NAME_LEN + 1
        ));
    }

    #[test]
    fn module_id_borrows_as_str_key() {
        let mut map = HashMap::new();
        map.insert(ModuleId::new("a").unwrap(), 1);
        assert_eq!(map.get("a"), Some(&1));
    }

    #[test]
    fn module_id_serde_json() {
        let id = ModuleId::new("scanner").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"scanner\"");
        let parsed: ModuleId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, parsed);

        assert!(serde_json::from_str::<ModuleId>("\"\"").is_err());
    }
}
