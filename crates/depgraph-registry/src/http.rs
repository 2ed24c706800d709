//! reqwest-backed registry client

use crate::client::{FetchAnomaly, RegistryClient};
use crate::schema::Packument;
use depgraph_core::{PackageName, RegistryConfig};
use reqwest::{StatusCode, Url};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HttpRegistryError {
    #[error("invalid registry url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("cannot build http client: {0}")]
    Client(#[from] reqwest::Error),
}

pub struct HttpRegistry {
    client: reqwest::Client,
    base: Url,
}

impl HttpRegistry {
    pub fn new(config: &RegistryConfig) -> Result<Self, HttpRegistryError> {
        let base = Url::parse(&config.url).map_err(|e| HttpRegistryError::InvalidUrl {
            url: config.url.clone(),
            reason: e.to_string(),
        })?;
        if base.cannot_be_a_base() {
            return Err(HttpRegistryError::InvalidUrl {
                url: config.url.clone(),
                reason: "not a base url".to_string(),
            });
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self { client, base })
    }

    /// URL of the package document. The name is one path segment, so a scoped
    /// name keeps its slash percent-encoded (`@scope%2Fpkg`).
    pub fn package_url(&self, name: &PackageName) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(name.as_str());
        }
        url
    }

    async fn get(&self, name: &PackageName) -> Result<reqwest::Response, reqwest::Error> {
        let url = self.package_url(name);
        tracing::debug!("GET {}", url);
        self.client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
    }
}

#[async_trait::async_trait]
impl RegistryClient for HttpRegistry {
    async fn package_exists(&self, name: &PackageName) -> bool {
        match self.get(name).await {
            Ok(response) => response.status() == StatusCode::OK,
            Err(e) => {
                tracing::debug!("Existence probe for {} failed: {}", name, e);
                false
            }
        }
    }

    async fn fetch_dependencies(
        &self,
        name: &PackageName,
    ) -> Result<Vec<PackageName>, FetchAnomaly> {
        let response = self
            .get(name)
            .await
            .map_err(|e| FetchAnomaly::Transport(e.to_string()))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(FetchAnomaly::Status(status.as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| FetchAnomaly::Transport(e.to_string()))?;

        Packument::from_slice(&body)?.latest_dependencies()
    }

    fn name(&self) -> &str {
        self.base.as_str()
    }
}
