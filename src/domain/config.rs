//! Application configuration model.
//!
//! Every field carries a serde default so partial TOML files load cleanly.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Default upload ceiling: 10 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Interface to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Upper bound for a single document extraction.
    #[serde(default = "default_timeout")]
    pub extraction_timeout_secs: u64,

    /// Upper bound for a single export render.
    #[serde(default = "default_timeout")]
    pub render_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            extraction_timeout_secs: default_timeout(),
            render_timeout_secs: default_timeout(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

const fn default_port() -> u16 {
    3001
}

const fn default_timeout() -> u64 {
    30
}

/// Upload policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Maximum accepted upload size in bytes.
    #[serde(default = "default_max_size_bytes")]
    pub max_size_bytes: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_size_bytes: default_max_size_bytes(),
        }
    }
}

const fn default_max_size_bytes() -> u64 {
    DEFAULT_MAX_UPLOAD_BYTES
}

/// Which conversation store backs the pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Process-local, lost on exit.
    Memory,
    /// `SQLite` file under the data directory.
    #[default]
    Sqlite,
}

/// Configuration for conversation storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StoreBackend,

    /// Messages kept per conversation; older ones are trimmed.
    #[serde(default = "default_max_messages")]
    pub max_messages: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            max_messages: default_max_messages(),
        }
    }
}

const fn default_max_messages() -> usize {
    500
}

/// Export naming defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Prefix of generated filenames.
    #[serde(default = "default_filename_prefix")]
    pub filename_prefix: String,

    /// Title used when a request leaves it blank.
    #[serde(default = "default_title")]
    pub default_title: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            filename_prefix: default_filename_prefix(),
            default_title: default_title(),
        }
    }
}

fn default_filename_prefix() -> String {
    "eva-consultation".to_string()
}

fn default_title() -> String {
    "EVA Consultation".to_string()
}

/// Path configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PathConfig {
    /// Base data directory.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

/// Complete application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub upload: UploadConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub export: ExportConfig,

    #[serde(default)]
    pub paths: PathConfig,
}

impl AppConfig {
    /// Get the data directory, using default if not configured.
    #[must_use]
    pub fn data_dir(&self) -> PathBuf {
        self.paths
            .data_dir
            .clone()
            .unwrap_or_else(Self::default_data_dir)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".consultation-pipeline")
    }

    /// Get the conversation database path.
    #[must_use]
    pub fn storage_db_path(&self) -> PathBuf {
        self.data_dir().join("conversations.db")
    }

    /// Get the config file path.
    #[must_use]
    pub fn config_file_path(&self) -> PathBuf {
        self.data_dir().join("config.toml")
    }

    /// Socket address string for the HTTP server.
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
