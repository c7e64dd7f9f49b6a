//! Infrastructure layer - external adapters (database, filesystem).
//!
//! This layer handles all I/O operations and external dependencies.

pub mod config;
pub mod memory_store;
pub mod sqlite_store;

use std::sync::Arc;

use crate::domain::{AppConfig, ConversationStore, Result, StoreBackend};

pub use config::{
    config_file_path, ensure_config_at, ensure_config_exists, load_config, load_config_at,
    load_config_from_file, save_config,
};
pub use memory_store::MemoryStore;
pub use sqlite_store::SqliteStore;

/// Open the conversation store selected by the configuration.
///
/// # Errors
/// Returns error if the `SQLite` database cannot be opened.
pub fn open_store(config: &AppConfig) -> Result<Arc<dyn ConversationStore>> {
    let max_messages = config.storage.max_messages;
    match config.storage.backend {
        StoreBackend::Memory => Ok(Arc::new(MemoryStore::new(max_messages))),
        StoreBackend::Sqlite => {
            let path = config.storage_db_path();
            tracing::debug!(path = %path.display(), "Opening conversation database");
            Ok(Arc::new(SqliteStore::open(&path, max_messages)?))
        }
    }
}
