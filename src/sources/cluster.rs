//! [`ClusterInfo`] backed by the proxy's `/info` endpoint.

use super::{ClusterInfo, SourceError};
use crate::swift::SwiftVersion;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct InfoResponse {
    swift: SwiftSection,
}

#[derive(Debug, Deserialize)]
struct SwiftSection {
    version: String,
}

/// Fetches the running Swift release from `GET <url>`.
#[derive(Debug, Clone)]
pub struct SwiftInfoClient {
    client: reqwest::Client,
    url: String,
}

impl SwiftInfoClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, SourceError> {
        let url = url.into();
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| SourceError::Http {
                url: url.clone(),
                source,
            })?;
        Ok(Self { client, url })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ClusterInfo for SwiftInfoClient {
    async fn swift_version(&self) -> Result<SwiftVersion, SourceError> {
        let http = |source| SourceError::Http {
            url: self.url.clone(),
            source,
        };
        let info: InfoResponse = self
            .client
            .get(&self.url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(http)?
            .json()
            .await
            .map_err(http)?;

        debug!(url = %self.url, version = %info.swift.version, "Fetched Swift version");
        info.swift
            .version
            .parse()
            .map_err(|e| SourceError::parse(self.url.clone(), e))
    }
}

/// Used when the node identity file is missing: every request fails and
/// version-gated series stay unset.
#[derive(Debug, Clone, Default)]
pub struct UnknownCluster;

#[async_trait]
impl ClusterInfo for UnknownCluster {
    async fn swift_version(&self) -> Result<SwiftVersion, SourceError> {
        Err(SourceError::Unavailable("no proxy endpoint configured".into()))
    }
}
