//! Configuration types for torrent-dl

use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, path::Path, path::PathBuf};
use utoipa::ToSchema;

use crate::error::{Error, Result};

/// Download behavior configuration (directories, active set size, connections)
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct DownloadConfig {
    /// Download directory (default: "./downloads")
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    /// Maximum torrents in the active set (default: 5)
    ///
    /// Starting a torrent beyond this limit demotes the least recently
    /// started one back to the queue. Force-uploaded torrents do not count.
    #[serde(default = "default_max_active_torrents")]
    pub max_active_torrents: usize,

    /// Established connection cap applied once metadata arrives (default: 80)
    #[serde(default = "default_max_connections")]
    pub default_max_connections: u32,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            max_active_torrents: default_max_active_torrents(),
            default_max_connections: default_max_connections(),
        }
    }
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct PersistenceConfig {
    /// Database path (default: "./torrent-dl.db")
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

/// API and external server integration configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct ServerIntegrationConfig {
    /// HTTP and websocket listener configuration
    #[serde(default)]
    pub api: ApiConfig,
}

/// HTTP listener configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiConfig {
    /// Address to bind to (default: 127.0.0.1:8000)
    #[serde(default = "default_bind_address")]
    pub bind_address: SocketAddr,

    /// Enable CORS for browser access (default: true)
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// Allowed CORS origins (default: ["*"])
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Enable Swagger UI at /swagger-ui (default: true)
    #[serde(default = "default_true")]
    pub swagger_ui: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            cors_enabled: true,
            cors_origins: default_cors_origins(),
            swagger_ui: true,
        }
    }
}

/// Client credential files written for the web UI
///
/// These settings are what the stored config snapshot is compared against:
/// the client config file is regenerated whenever they change.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ClientConnectConfig {
    /// File receiving the first issued token (default: "clientAuth.txt")
    #[serde(default = "default_auth_file")]
    pub auth_file: PathBuf,

    /// File receiving the websocket address and token (default: "clientConfig.json")
    #[serde(default = "default_client_config_file")]
    pub config_file: PathBuf,

    /// Client name the first token is minted for (default: "goTorrentWebUI")
    #[serde(default = "default_client_name")]
    pub default_client_name: String,

    /// Websocket address handed to clients, when it differs from the bind address
    #[serde(default)]
    pub public_address: Option<String>,
}

impl Default for ClientConnectConfig {
    fn default() -> Self {
        Self {
            auth_file: default_auth_file(),
            config_file: default_client_config_file(),
            default_client_name: default_client_name(),
            public_address: None,
        }
    }
}

/// Where log output goes
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    /// Standard output
    #[default]
    Stdout,
    /// The file named by `file_path`
    File,
}

/// Logging configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct LoggingConfig {
    /// Default filter directive when RUST_LOG is unset (default: "info")
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output destination (default: stdout)
    #[serde(default)]
    pub output: LogOutput,

    /// Log file path when output is "file" (default: "logs/server.log")
    #[serde(default = "default_log_file")]
    pub file_path: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            output: LogOutput::default(),
            file_path: default_log_file(),
        }
    }
}

/// Main configuration for the session manager
///
/// Download and API settings are flattened so the JSON file stays shallow.
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct Config {
    /// Download behavior settings
    #[serde(flatten)]
    pub download: DownloadConfig,

    /// Data storage
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// HTTP and websocket listener
    #[serde(flatten)]
    pub server: ServerIntegrationConfig,

    /// Client credential files
    #[serde(default)]
    pub client: ClientConnectConfig,

    /// Logging
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Download directory
    pub fn download_dir(&self) -> &PathBuf {
        &self.download.download_dir
    }

    /// Load configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("failed to read {}: {}", path.display(), e),
            key: None,
        })?;
        let config: Config = serde_json::from_str(&raw).map_err(|e| Error::Config {
            message: format!("failed to parse {}: {}", path.display(), e),
            key: None,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the manager cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.download.max_active_torrents == 0 {
            return Err(Error::Config {
                message: "max_active_torrents must be at least 1".into(),
                key: Some("max_active_torrents".into()),
            });
        }
        if self.client.default_client_name.trim().is_empty() {
            return Err(Error::Config {
                message: "default_client_name must not be empty".into(),
                key: Some("client.default_client_name".into()),
            });
        }
        Ok(())
    }

    /// Websocket address written to the client config file
    pub fn websocket_address(&self) -> String {
        match &self.client.public_address {
            Some(addr) => addr.clone(),
            None => format!("ws://{}/websocket", self.server.api.bind_address),
        }
    }
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("./downloads")
}

fn default_max_active_torrents() -> usize {
    5
}

fn default_max_connections() -> u32 {
    80
}

fn default_database_path() -> PathBuf {
    PathBuf::from("./torrent-dl.db")
}

fn default_true() -> bool {
    true
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8000))
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_auth_file() -> PathBuf {
    PathBuf::from("clientAuth.txt")
}

fn default_client_config_file() -> PathBuf {
    PathBuf::from("clientConfig.json")
}

fn default_client_name() -> String {
    "goTorrentWebUI".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> PathBuf {
    PathBuf::from("logs/server.log")
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_json_yields_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();

        assert_eq!(config.download.max_active_torrents, 5);
        assert_eq!(config.download.default_max_connections, 80);
        assert_eq!(config.server.api.bind_address.port(), 8000);
        assert_eq!(config.client.auth_file, PathBuf::from("clientAuth.txt"));
        assert_eq!(config.logging.output, LogOutput::Stdout);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn flattened_fields_sit_at_top_level() {
        let config: Config = serde_json::from_str(
            r#"{"download_dir": "/data", "max_active_torrents": 2, "bind_address": "0.0.0.0:9000", "logging": {"output": "file"}}"#,
        )
        .unwrap();

        assert_eq!(config.download_dir(), &PathBuf::from("/data"));
        assert_eq!(config.download.max_active_torrents, 2);
        assert_eq!(config.server.api.bind_address.port(), 9000);
        assert_eq!(config.logging.output, LogOutput::File);
    }

    #[test]
    fn zero_active_limit_is_rejected_with_key() {
        let mut config = Config::default();
        config.download.max_active_torrents = 0;

        match config.validate() {
            Err(Error::Config { key, .. }) => {
                assert_eq!(key.as_deref(), Some("max_active_torrents"))
            }
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn from_file_reads_json_and_reports_parse_errors() {
        let mut good = tempfile::NamedTempFile::new().unwrap();
        write!(good, r#"{{"max_active_torrents": 3}}"#).unwrap();
        let config = Config::from_file(good.path()).unwrap();
        assert_eq!(config.download.max_active_torrents, 3);

        let mut bad = tempfile::NamedTempFile::new().unwrap();
        write!(bad, "not json").unwrap();
        assert!(matches!(
            Config::from_file(bad.path()),
            Err(Error::Config { .. })
        ));

        assert!(Config::from_file("/nonexistent/torrent-dl.json").is_err());
    }

    #[test]
    fn websocket_address_prefers_public_address() {
        let mut config = Config::default();
        assert_eq!(config.websocket_address(), "ws://127.0.0.1:8000/websocket");

        config.client.public_address = Some("wss://example.org/websocket".into());
        assert_eq!(config.websocket_address(), "wss://example.org/websocket");
    }
}
