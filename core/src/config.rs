//! Client configuration

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};

const CONFIG_FILE: &str = "config.json";
const MIN_POLL_INTERVAL_MS: u64 = 50;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub server: ServerConfig,
    pub sync: SyncConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub use_tls: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Cadence of every poller, in milliseconds.
    pub poll_interval_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8090,
            use_tls: false,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self { poll_interval_ms: 1000 }
    }
}

impl ClientConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            server: ServerConfig {
                host: host.to_string(),
                port,
                use_tls: false,
            },
            sync: SyncConfig::default(),
        }
    }

    /// Loads `config.json` from `dir`, falling back to defaults when absent.
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(CONFIG_FILE);

        if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            serde_json::from_str(&content)
                .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(dir.join(CONFIG_FILE), content)?;
        Ok(())
    }

    pub fn http_url(&self) -> String {
        let scheme = if self.server.use_tls { "https" } else { "http" };
        format!("{}://{}:{}", scheme, self.server.host, self.server.port)
    }

    pub fn route_url(&self, route: &str) -> String {
        format!("{}/{}", self.http_url(), route)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.sync.poll_interval_ms.max(MIN_POLL_INTERVAL_MS))
    }
}
