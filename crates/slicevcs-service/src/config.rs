//! Standalone server configuration.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;

/// Configuration for the standalone server binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address for the HTTP dispatch layer.
    pub bind_addr: SocketAddr,
    /// Key prefix for all durable objects.
    pub key_prefix: String,
    /// Per-call deadline applied by the dispatch layer, in milliseconds.
    pub request_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 50051)),
            key_prefix: String::from("slicevcs"),
            request_timeout_ms: 5000,
        }
    }
}

impl ServerConfig {
    /// Loads configuration from a TOML or JSON file, by extension.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();

        match ext.to_lowercase().as_str() {
            "toml" => {
                let config: ServerConfig = toml::from_str(&contents)?;
                Ok(config)
            }
            "json" => {
                let config: ServerConfig = serde_json::from_str(&contents)?;
                Ok(config)
            }
            _ => anyhow::bail!("Unsupported config file extension: {}", ext),
        }
    }
}
