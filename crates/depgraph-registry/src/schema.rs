//! Typed view of the registry's per-package document (the "packument")

use crate::client::FetchAnomaly;
use depgraph_core::PackageName;
use serde::de::IgnoredAny;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};

/// Only the fields dependency discovery reads. Everything is optional because
/// unpublished and internal packages omit them.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Packument {
    #[serde(rename = "dist-tags", default)]
    pub dist_tags: Option<HashMap<String, String>>,
    #[serde(default)]
    pub versions: Option<HashMap<String, VersionManifest>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VersionManifest {
    /// Dependency name → semver range. Ranges are not needed, only the keys.
    #[serde(default)]
    pub dependencies: Option<BTreeMap<String, IgnoredAny>>,
}

impl Packument {
    pub fn from_slice(body: &[u8]) -> Result<Self, FetchAnomaly> {
        serde_json::from_slice(body).map_err(|e| FetchAnomaly::Malformed(e.to_string()))
    }

    pub fn latest_version(&self) -> Option<&str> {
        self.dist_tags
            .as_ref()
            .and_then(|tags| tags.get("latest"))
            .map(String::as_str)
    }

    /// Dependency names of the `latest` version.
    pub fn latest_dependencies(&self) -> Result<Vec<PackageName>, FetchAnomaly> {
        let (Some(latest), Some(versions)) = (self.latest_version(), self.versions.as_ref()) else {
            return Err(FetchAnomaly::Unpublished);
        };

        let manifest = versions
            .get(latest)
            .ok_or_else(|| FetchAnomaly::MissingVersion(latest.to_string()))?;

        let Some(dependencies) = manifest.dependencies.as_ref() else {
            return Ok(Vec::new());
        };

        Ok(dependencies
            .keys()
            .filter_map(|dep| match PackageName::new(dep) {
                Ok(name) => Some(name),
                Err(e) => {
                    tracing::warn!("Skipping dependency of {}: {}", latest, e);
                    None
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(deps: Vec<PackageName>) -> Vec<String> {
        deps.into_iter().map(PackageName::into_string).collect()
    }

    #[test]
    fn test_latest_dependencies() {
        let doc = Packument::from_slice(
            br#"{
                "name": "cookies",
                "dist-tags": { "latest": "0.9.1", "next": "1.0.0-beta" },
                "versions": {
                    "0.9.0": { "dependencies": { "old-dep": "1" } },
                    "0.9.1": { "dependencies": { "keygrip": "~1.1.0", "depd": "~2.0.0" } }
                }
            }"#,
        )
        .unwrap();
        assert_eq!(doc.latest_version(), Some("0.9.1"));
        assert_eq!(names(doc.latest_dependencies().unwrap()), vec!["depd", "keygrip"]);
    }

    #[test]
    fn test_no_dependencies_block_is_confirmed_empty() {
        let doc = Packument::from_slice(
            br#"{ "dist-tags": { "latest": "1.0.0" }, "versions": { "1.0.0": {} } }"#,
        )
        .unwrap();
        assert_eq!(doc.latest_dependencies(), Ok(Vec::new()));
    }

    #[test]
    fn test_unpublished_package() {
        let doc = Packument::from_slice(br#"{ "name": "gone", "time": {} }"#).unwrap();
        assert_eq!(doc.latest_dependencies(), Err(FetchAnomaly::Unpublished));

        let doc = Packument::from_slice(br#"{ "dist-tags": {}, "versions": {} }"#).unwrap();
        assert_eq!(doc.latest_dependencies(), Err(FetchAnomaly::Unpublished));
    }

    #[test]
    fn test_latest_missing_from_versions() {
        let doc = Packument::from_slice(
            br#"{ "dist-tags": { "latest": "2.0.0" }, "versions": { "1.0.0": {} } }"#,
        )
        .unwrap();
        assert_eq!(
            doc.latest_dependencies(),
            Err(FetchAnomaly::MissingVersion("2.0.0".to_string()))
        );
    }

    #[test]
    fn test_malformed_body() {
        assert!(matches!(
            Packument::from_slice(b"<html>oops</html>"),
            Err(FetchAnomaly::Malformed(_))
        ));
    }
}
