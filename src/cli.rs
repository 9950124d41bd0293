//! Command-line argument parsing.
//!
//! The arguments are merged on top of the YAML configuration, so every flag
//! here is optional and only overrides the file when given.

use clap::Parser;
use figment::{
    value::{Dict, Map, Value},
    Error, Metadata, Profile, Provider,
};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Prometheus exporter for OpenStack Swift storage nodes.
#[derive(Parser, Debug, Clone, Default)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the YAML configuration file.
    #[arg(value_name = "CONFIG")]
    pub config: Option<PathBuf>,

    /// Address the /metrics endpoint listens on.
    #[arg(long, env = "SWIFT_EXPORTER_LISTEN_ADDRESS", value_name = "ADDR")]
    pub listen_address: Option<SocketAddr>,

    /// Log filter, e.g. `info` or `swift_exporter=debug`.
    #[arg(long, env = "SWIFT_EXPORTER_LOG_LEVEL", value_name = "LEVEL")]
    pub log_level: Option<String>,
}

impl Cli {
    /// A `Cli` that only names a configuration file.
    pub fn for_config(path: &Path) -> Self {
        Self {
            config: Some(path.to_path_buf()),
            ..Self::default()
        }
    }
}

impl Provider for Cli {
    fn metadata(&self) -> Metadata {
        Metadata::named("Command-Line Arguments")
    }

    fn data(&self) -> Result<Map<Profile, Dict>, Error> {
        let mut dict = Dict::new();

        if let Some(addr) = self.listen_address {
            dict.insert("ListenAddress".into(), Value::from(addr.to_string()));
        }
        if let Some(level) = &self.log_level {
            dict.insert("LogLevel".into(), Value::from(level.clone()));
        }

        let mut map = Map::new();
        map.insert(Profile::Default, dict);
        Ok(map)
    }
}
