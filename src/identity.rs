//! Node identity: the `FQDN` and `UUID` labels attached to most gauges.

use crate::sources::HostnameProbe;
use std::collections::HashMap;
use std::path::Path;
use tracing::warn;

/// Label value used when the hostname or UUID cannot be determined.
pub const UNKNOWN: &str = "unknown";

/// Parsed `ssnode.conf`.
///
/// ```text
/// node_uuid = 8c5e0d2e-...
/// api_hostname = proxy.example.com
/// api_ip = 10.0.0.5
/// api_port = 443
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeConfig {
    pub node_uuid: Option<String>,
    pub api_ip: Option<String>,
    pub api_port: Option<u16>,
    pub api_hostname: Option<String>,
}

impl NodeConfig {
    pub fn parse(contents: &str) -> Self {
        let values: HashMap<&str, &str> = contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .filter_map(|line| line.split_once('='))
            .map(|(key, value)| (key.trim(), value.trim().trim_matches('"')))
            .filter(|(_, value)| !value.is_empty())
            .collect();

        Self {
            node_uuid: values.get("node_uuid").map(|v| v.to_string()),
            api_ip: values.get("api_ip").map(|v| v.to_string()),
            api_port: values.get("api_port").and_then(|v| v.parse().ok()),
            api_hostname: values.get("api_hostname").map(|v| v.to_string()),
        }
    }

    pub async fn load(path: &Path) -> std::io::Result<Self> {
        let contents = tokio::fs::read_to_string(path).await?;
        Ok(Self::parse(&contents))
    }

    /// URL of the proxy's `/info` endpoint. The hostname is preferred over
    /// the IP; port 443 selects HTTPS.
    pub fn info_url(&self) -> Option<String> {
        let host = self.api_hostname.as_deref().or(self.api_ip.as_deref())?;
        let url = match self.api_port {
            Some(443) => format!("https://{host}/info"),
            Some(80) | None => format!("http://{host}/info"),
            Some(port) => format!("http://{host}:{port}/info"),
        };
        Some(url)
    }
}

/// Resolved once at startup and never changed afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeIdentity {
    pub fqdn: String,
    pub uuid: String,
}

impl Default for NodeIdentity {
    fn default() -> Self {
        Self {
            fqdn: UNKNOWN.to_string(),
            uuid: UNKNOWN.to_string(),
        }
    }
}

impl NodeIdentity {
    pub fn new(fqdn: impl Into<String>, uuid: impl Into<String>) -> Self {
        Self {
            fqdn: fqdn.into(),
            uuid: uuid.into(),
        }
    }

    pub async fn resolve(node: Option<&NodeConfig>, hostname: &dyn HostnameProbe) -> Self {
        let fqdn = match hostname.fqdn().await {
            Ok(fqdn) => fqdn,
            Err(e) => {
                warn!(error = %e, "Could not determine FQDN");
                UNKNOWN.to_string()
            }
        };
        let uuid = match node.and_then(|n| n.node_uuid.clone()) {
            Some(uuid) => uuid,
            None => {
                warn!("Node UUID not found in node configuration");
                UNKNOWN.to_string()
            }
        };
        Self { fqdn, uuid }
    }
}
