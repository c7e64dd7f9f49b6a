//! Configuration file management.
//!
//! Handles loading and saving TOML configuration files.

use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::{AppConfig, AppError, Result};

/// Default configuration file content.
const DEFAULT_CONFIG: &str = r#"# Consultation Pipeline Configuration
# Auto-generated - edit as needed

[server]
# Interface and port for `consult serve`
host = "127.0.0.1"
port = 3001

# Upper bound in seconds for one document extraction / one export render
extraction_timeout_secs = 30
render_timeout_secs = 30

[upload]
# Maximum accepted upload size in bytes (default: 10 MiB)
max_size_bytes = 10485760

[storage]
# "sqlite" persists under the data directory, "memory" is lost on exit
backend = "sqlite"

# Messages kept per conversation; older ones are dropped
max_messages = 500

[export]
filename_prefix = "eva-consultation"
default_title = "EVA Consultation"

[paths]
# Custom data directory (optional, defaults to ~/.consultation-pipeline)
# data_dir = "/custom/path"
"#;

/// Load configuration from the default location, or defaults if absent.
///
/// # Errors
/// Returns error if file exists but cannot be read or parsed.
pub fn load_config() -> Result<AppConfig> {
    load_config_at(&config_file_path())
}

/// Load configuration from `path`, or defaults if the file does not exist yet.
///
/// # Errors
/// Returns error if an existing file cannot be read or parsed.
pub fn load_config_at(path: &Path) -> Result<AppConfig> {
    if path.exists() {
        load_config_from_file(path)
    } else {
        tracing::debug!(path = %path.display(), "No config file, using defaults");
        Ok(AppConfig::default())
    }
}

/// Load configuration from a specific file.
///
/// # Errors
/// Returns error if file cannot be read or parsed.
pub fn load_config_from_file(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .map_err(|e| AppError::io(format!("Failed to read config file: {}", path.display()), e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| AppError::Config {
        message: format!("Failed to parse config file: {e}"),
    })?;

    if config.storage.max_messages == 0 {
        return Err(AppError::Config {
            message: "storage.max_messages must be at least 1".to_string(),
        });
    }

    Ok(config)
}

/// Save configuration to its file under the data directory.
///
/// # Errors
/// Returns error if file cannot be written.
pub fn save_config(config: &AppConfig) -> Result<()> {
    let config_path = config.config_file_path();

    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| AppError::io("Failed to create config directory", e))?;
    }

    let content = toml::to_string_pretty(config).map_err(|e| AppError::Config {
        message: format!("Failed to serialize config: {e}"),
    })?;

    fs::write(&config_path, content).map_err(|e| {
        AppError::io(
            format!("Failed to write config file: {}", config_path.display()),
            e,
        )
    })?;

    tracing::info!(path = %config_path.display(), "Configuration saved");

    Ok(())
}

/// Write the commented default file at `path` if nothing is there yet.
///
/// # Errors
/// Returns error if file cannot be created.
pub fn ensure_config_at(path: &Path) -> Result<()> {
    if path.exists() {
        return Ok(());
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| AppError::io("Failed to create config directory", e))?;
    }

    fs::write(path, DEFAULT_CONFIG)
        .map_err(|e| AppError::io("Failed to create default config", e))?;

    tracing::info!(path = %path.display(), "Created default configuration");
    Ok(())
}

/// Create default configuration file if it doesn't exist.
///
/// # Errors
/// Returns error if file cannot be created.
pub fn ensure_config_exists() -> Result<()> {
    ensure_config_at(&config_file_path())
}

/// Get the path to the configuration file.
#[must_use]
pub fn config_file_path() -> PathBuf {
    AppConfig::default_data_dir().join("config.toml")
}
