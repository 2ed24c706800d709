//! Uploaded `package.json` input

use crate::model::PackageName;
use serde_json::Value;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("error reading file: {0}")]
    Read(#[from] std::io::Error),
    #[error("error parsing file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("package.json must be a JSON object")]
    NotAnObject,
    #[error("package.json has no name")]
    MissingName,
    #[error("package.json file has no dependencies block")]
    MissingDependencies,
    #[error("dependency {name:?} has a non-string version")]
    InvalidVersion { name: String },
    #[error("dependency name {0:?} is empty")]
    InvalidDependencyName(String),
}

/// The subset of a manifest the discovery engine consumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageManifest {
    pub name: PackageName,
    /// `(dependency name, version range)` pairs.
    pub dependencies: Vec<(PackageName, String)>,
}

impl PackageManifest {
    pub fn parse(content: &str) -> Result<Self, ManifestError> {
        let value: Value = serde_json::from_str(content)?;
        Self::from_value(&value)
    }

    pub fn from_path(path: &Path) -> Result<Self, ManifestError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn from_value(value: &Value) -> Result<Self, ManifestError> {
        let object = value.as_object().ok_or(ManifestError::NotAnObject)?;

        let name = object
            .get("name")
            .and_then(Value::as_str)
            .and_then(|raw| PackageName::new(raw).ok())
            .ok_or(ManifestError::MissingName)?;

        let block = object
            .get("dependencies")
            .and_then(Value::as_object)
            .ok_or(ManifestError::MissingDependencies)?;

        let mut dependencies = Vec::with_capacity(block.len());
        for (dep, range) in block {
            let range = range
                .as_str()
                .ok_or_else(|| ManifestError::InvalidVersion { name: dep.clone() })?;
            let dep = PackageName::new(dep)
                .map_err(|_| ManifestError::InvalidDependencyName(dep.clone()))?;
            dependencies.push((dep, range.to_string()));
        }

        Ok(PackageManifest { name, dependencies })
    }

    /// Seed list for a traversal: the dependency names only.
    pub fn dependency_names(&self) -> Vec<PackageName> {
        self.dependencies.iter().map(|(name, _)| name.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_manifest() {
        let manifest = PackageManifest::parse(
            r#"{
                "name": "my-app",
                "version": "1.0.0",
                "dependencies": { "left-pad": "^1.3.0", "internal-lib": "file:../lib" }
            }"#,
        )
        .unwrap();

        assert_eq!(manifest.name.as_str(), "my-app");
        let names: Vec<String> = manifest
            .dependency_names()
            .into_iter()
            .map(PackageName::into_string)
            .collect();
        assert_eq!(names.len(), 2);
        assert!(names.contains(&"left-pad".to_string()));
        assert!(names.contains(&"internal-lib".to_string()));
    }

    #[test]
    fn test_missing_dependencies_block() {
        let err = PackageManifest::parse(r#"{ "name": "my-app" }"#).unwrap_err();
        assert!(matches!(err, ManifestError::MissingDependencies));
    }

    #[test]
    fn test_missing_name() {
        let err = PackageManifest::parse(r#"{ "dependencies": {} }"#).unwrap_err();
        assert!(matches!(err, ManifestError::MissingName));

        let err = PackageManifest::parse(r#"{ "name": "  ", "dependencies": {} }"#).unwrap_err();
        assert!(matches!(err, ManifestError::MissingName));
    }

    #[test]
    fn test_non_string_version_rejected() {
        let err = PackageManifest::parse(r#"{ "name": "a", "dependencies": { "b": 1 } }"#)
            .unwrap_err();
        match err {
            ManifestError::InvalidVersion { name } => assert_eq!(name, "b"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            PackageManifest::parse("{ not json"),
            Err(ManifestError::Parse(_))
        ));
        assert!(matches!(
            PackageManifest::parse("[]"),
            Err(ManifestError::NotAnObject)
        ));
    }

    #[test]
    fn test_empty_dependencies_is_valid() {
        let manifest = PackageManifest::parse(r#"{ "name": "a", "dependencies": {} }"#).unwrap();
        assert!(manifest.dependency_names().is_empty());
    }
}
