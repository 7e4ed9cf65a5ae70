//! Canonical naming: human display names → guard names.
//!
//! A guard name is the key every name-based lookup and every find-or-create
//! goes through, so two display strings that differ only in case, punctuation
//! or accents land on the same row.

use serde::{Deserialize, Serialize};

use crate::value_object::ValueObject;

/// Canonicalize a display name.
///
/// Lowercases, transliterates to ASCII, collapses every run of
/// non-alphanumeric characters into a single `-` and trims separators from
/// both ends: `"Create $#% Contact!"` → `"create-contact"`.
pub fn canonicalize(name: &str) -> String {
    slug::slugify(name)
}

/// Canonical, collision-resistant identifier derived from a display name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GuardName(String);

impl GuardName {
    /// Derive the guard name of a display name.
    pub fn from_display(name: &str) -> Self {
        Self(canonicalize(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl ValueObject for GuardName {}

impl core::fmt::Display for GuardName {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for GuardName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
