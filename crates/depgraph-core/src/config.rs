//! Runtime configuration: defaults, `depgraph.toml`, then `DEPGRAPH_*` environment

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default config file looked up in the working directory.
pub const CONFIG_FILE: &str = "depgraph.toml";

/// Cache directory: .depgraph/
pub const CACHE_DIR: &str = ".depgraph";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid value for {key}: {value:?}")]
    InvalidEnv { key: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Base URL of the package registry.
    pub url: String,
    /// Per-request timeout.
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            url: "https://registry.npmjs.org".to_string(),
            timeout_secs: 30,
            user_agent: format!("depgraph/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub dir: PathBuf,
    /// Byte budget for the on-disk store. `None` means unbounded.
    pub capacity_bytes: Option<u64>,
    /// The whole cache is dropped at startup once it has gone unused this long.
    pub max_age_hours: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: PathBuf::from(CACHE_DIR),
            // Same order of magnitude as a browser storage quota.
            capacity_bytes: Some(10 * 1024 * 1024),
            max_age_hours: 24,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Upper bound on registry requests in flight at once.
    pub max_concurrent_requests: usize,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            max_concurrent_requests: 32,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 7890,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DepgraphConfig {
    pub registry: RegistryConfig,
    pub cache: CacheConfig,
    pub discovery: DiscoveryConfig,
    pub server: ServerConfig,
}

impl DepgraphConfig {
    /// Load configuration.
    /// Priority: environment variables > config file > defaults.
    /// An explicit `path` must exist; otherwise `./depgraph.toml` is used if present.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = Path::new(CONFIG_FILE);
                if default_path.exists() {
                    Self::from_file(default_path)?
                } else {
                    Self::default()
                }
            }
        };

        // Pick up a local .env before reading DEPGRAPH_* variables
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                tracing::warn!("Ignoring unreadable .env file: {}", e);
            }
        }
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Override fields from `DEPGRAPH_*` variables looked up through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("DEPGRAPH_REGISTRY_URL") {
            self.registry.url = url;
        }
        if let Some(dir) = lookup("DEPGRAPH_CACHE_DIR") {
            self.cache.dir = PathBuf::from(dir);
        }
        if let Some(value) = lookup("DEPGRAPH_MAX_CONCURRENCY") {
            self.discovery.max_concurrent_requests =
                parse_env("DEPGRAPH_MAX_CONCURRENCY", &value)?;
        }
        if let Some(value) = lookup("DEPGRAPH_CACHE_MAX_AGE_HOURS") {
            self.cache.max_age_hours = parse_env("DEPGRAPH_CACHE_MAX_AGE_HOURS", &value)?;
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        key,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = DepgraphConfig::default();
        assert_eq!(config.registry.url, "https://registry.npmjs.org");
        assert_eq!(config.cache.max_age_hours, 24);
        assert_eq!(config.discovery.max_concurrent_requests, 32);
        assert!(config.cache.enabled);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = DepgraphConfig::from_toml(
            r#"
[registry]
url = "http://localhost:4873"

[discovery]
max_concurrent_requests = 4
"#,
        )
        .unwrap();

        assert_eq!(config.registry.url, "http://localhost:4873");
        assert_eq!(config.registry.timeout_secs, 30);
        assert_eq!(config.discovery.max_concurrent_requests, 4);
        assert_eq!(config.cache, CacheConfig::default());
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("DEPGRAPH_REGISTRY_URL", "http://mirror.local"),
            ("DEPGRAPH_MAX_CONCURRENCY", "8"),
            ("DEPGRAPH_CACHE_DIR", "/tmp/depgraph"),
        ]
        .into_iter()
        .collect();

        let mut config = DepgraphConfig::default();
        config
            .apply_env(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.registry.url, "http://mirror.local");
        assert_eq!(config.discovery.max_concurrent_requests, 8);
        assert_eq!(config.cache.dir, PathBuf::from("/tmp/depgraph"));
    }

    #[test]
    fn test_invalid_env_value() {
        let mut config = DepgraphConfig::default();
        let err = config
            .apply_env(|key| (key == "DEPGRAPH_MAX_CONCURRENCY").then(|| "lots".to_string()))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidEnv { key: "DEPGRAPH_MAX_CONCURRENCY", .. }
        ));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "[server]\nport = 9000\n").unwrap();

        let config = DepgraphConfig::from_file(&path).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "127.0.0.1");

        let missing = DepgraphConfig::from_file(&dir.path().join("missing.toml"));
        assert!(matches!(missing, Err(ConfigError::Read { .. })));
    }
}
