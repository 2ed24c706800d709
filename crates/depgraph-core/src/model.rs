//! Core identifiers for the dependency graph

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Returned when a package name is empty after trimming.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid package name {0:?}: must be non-empty")]
pub struct InvalidPackageName(pub String);

/// A registry package name. Case-sensitive; used as the dedup and cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct PackageName(String);

impl PackageName {
    /// Trim `raw` and reject it if nothing is left.
    pub fn new(raw: impl AsRef<str>) -> Result<Self, InvalidPackageName> {
        let raw = raw.as_ref();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(InvalidPackageName(raw.to_string()));
        }
        Ok(PackageName(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for PackageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PackageName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for PackageName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for PackageName {
    type Error = InvalidPackageName;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        PackageName::new(value)
    }
}

impl TryFrom<String> for PackageName {
    type Error = InvalidPackageName;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        PackageName::new(value)
    }
}

impl<'de> Deserialize<'de> for PackageName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        PackageName::new(raw).map_err(serde::de::Error::custom)
    }
}

/// A directed edge: `from` depends on `to`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub from: PackageName,
    pub to: PackageName,
}

impl DependencyEdge {
    pub fn new(from: PackageName, to: PackageName) -> Self {
        DependencyEdge { from, to }
    }
}
