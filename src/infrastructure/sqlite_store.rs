//! SQLite-backed conversation store.
//!
//! Conversations survive restarts. Messages are ordered by an
//! autoincrement sequence, so append order is preserved even when
//! timestamps collide.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::domain::{
    AppError, Conversation, ConversationStore, ConversationSummary, Message, MessageMetadata,
    Result, Role,
};

/// Conversation store using a single `SQLite` connection.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    max_messages: usize,
}

impl SqliteStore {
    /// Opens or creates the conversation database.
    ///
    /// # Errors
    /// Returns error if database cannot be opened or schema creation fails.
    pub fn open(path: &Path, max_messages: usize) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| AppError::io("Failed to create storage directory", e))?;
        }

        let conn = Connection::open(path).map_err(AppError::database)?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;",
        )
        .map_err(AppError::database)?;

        Self::with_connection(conn, max_messages)
    }

    /// Opens a private in-memory database.
    ///
    /// # Errors
    /// Returns error if schema creation fails.
    pub fn open_in_memory(max_messages: usize) -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(AppError::database)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(AppError::database)?;
        Self::with_connection(conn, max_messages)
    }

    fn with_connection(conn: Connection, max_messages: usize) -> Result<Self> {
        init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            max_messages,
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| AppError::Database {
            message: "Conversation database lock poisoned".to_string(),
            source: None,
        })
    }
}

fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r"
        CREATE TABLE IF NOT EXISTS conversations (
            id TEXT PRIMARY KEY,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS messages (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            message_id TEXT NOT NULL,
            conversation_id TEXT NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
            role TEXT NOT NULL,
            content TEXT NOT NULL DEFAULT '',
            timestamp TEXT NOT NULL,
            metadata TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_messages_conversation
            ON messages(conversation_id, seq);
        CREATE INDEX IF NOT EXISTS idx_conversations_created
            ON conversations(created_at DESC);
        ",
    )
    .map_err(AppError::database)
}

/// Fixed-width RFC 3339, so text order matches time order.
fn db_time(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_time(value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e)))
}

fn ensure_conversation(conn: &Connection, id: &str, created_at: DateTime<Utc>) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO conversations (id, created_at) VALUES (?1, ?2)",
        params![id, db_time(created_at)],
    )
    .map_err(AppError::database)?;
    Ok(())
}

fn insert_message(conn: &Connection, conversation_id: &str, message: &Message) -> Result<()> {
    let metadata = message
        .metadata
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(AppError::json_parse)?;

    conn.execute(
        r"
        INSERT INTO messages (message_id, conversation_id, role, content, timestamp, metadata)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        ",
        params![
            &message.id,
            conversation_id,
            message.role.as_str(),
            &message.content,
            db_time(message.timestamp),
            metadata,
        ],
    )
    .map_err(AppError::database)?;
    Ok(())
}

fn trim_messages(conn: &Connection, conversation_id: &str, max: usize) -> Result<usize> {
    let keep = i64::try_from(max).unwrap_or(i64::MAX);
    conn.execute(
        r"
        DELETE FROM messages
        WHERE conversation_id = ?1
          AND seq NOT IN (
              SELECT seq FROM messages
              WHERE conversation_id = ?1
              ORDER BY seq DESC
              LIMIT ?2
          )
        ",
        params![conversation_id, keep],
    )
    .map_err(AppError::database)
}

fn load_messages(conn: &Connection, conversation_id: &str) -> Result<Vec<Message>> {
    let mut stmt = conn
        .prepare(
            r"
            SELECT message_id, role, content, timestamp, metadata
            FROM messages
            WHERE conversation_id = ?1
            ORDER BY seq ASC
            ",
        )
        .map_err(AppError::database)?;

    let rows = stmt
        .query_map([conversation_id], |row| {
            let role: String = row.get(1)?;
            let timestamp: String = row.get(3)?;
            let metadata: Option<String> = row.get(4)?;
            Ok((
                row.get::<_, String>(0)?,
                role,
                row.get::<_, String>(2)?,
                parse_time(&timestamp)?,
                metadata,
            ))
        })
        .map_err(AppError::database)?;

    let mut messages = Vec::new();
    for row in rows {
        let (id, role, content, timestamp, metadata) = row.map_err(AppError::database)?;
        let role = role.parse::<Role>().map_err(|message| AppError::Database {
            message,
            source: None,
        })?;
        let metadata = metadata
            .map(|m| serde_json::from_str::<MessageMetadata>(&m))
            .transpose()
            .map_err(AppError::json_parse)?;

        messages.push(Message {
            id,
            role,
            content,
            timestamp,
            metadata,
        });
    }

    Ok(messages)
}

impl ConversationStore for SqliteStore {
    fn create(&self) -> Result<Conversation> {
        let conversation = Conversation::new(Uuid::new_v4().to_string());
        let conn = self.lock()?;
        ensure_conversation(&conn, &conversation.id, conversation.created_at)?;
        Ok(conversation)
    }

    fn get(&self, id: &str) -> Result<Conversation> {
        let conn = self.lock()?;
        let created_at = conn
            .query_row(
                "SELECT created_at FROM conversations WHERE id = ?1",
                [id],
                |row| parse_time(&row.get::<_, String>(0)?),
            )
            .optional()
            .map_err(AppError::database)?
            .ok_or_else(|| AppError::not_found(format!("Conversation {id} not found")))?;

        Ok(Conversation {
            id: id.to_string(),
            created_at,
            messages: load_messages(&conn, id)?,
        })
    }

    fn append(&self, id: &str, message: Message) -> Result<Message> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(AppError::database)?;

        ensure_conversation(&tx, id, Utc::now())?;
        insert_message(&tx, id, &message)?;
        let trimmed = trim_messages(&tx, id, self.max_messages)?;

        tx.commit().map_err(AppError::database)?;

        if trimmed > 0 {
            tracing::debug!(conversation = %id, trimmed, "Applied message retention");
        }
        Ok(message)
    }

    fn list(&self) -> Result<Vec<ConversationSummary>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                r"
                SELECT c.id, c.created_at,
                       (SELECT COUNT(*) FROM messages m WHERE m.conversation_id = c.id),
                       (SELECT m.content FROM messages m WHERE m.conversation_id = c.id
                        ORDER BY m.seq ASC LIMIT 1)
                FROM conversations c
                ORDER BY c.created_at DESC, c.id ASC
                ",
            )
            .map_err(AppError::database)?;

        let rows = stmt
            .query_map([], |row| {
                let created_at: String = row.get(1)?;
                let preview: Option<String> = row.get(3)?;
                Ok(ConversationSummary {
                    id: row.get(0)?,
                    created_at: parse_time(&created_at)?,
                    message_count: usize::try_from(row.get::<_, i64>(2)?).unwrap_or(0),
                    preview: preview.unwrap_or_else(|| "[Empty conversation]".to_string()),
                })
            })
            .map_err(AppError::database)?;

        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(AppError::database)
    }

    fn import(&self, conversation: Conversation) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(AppError::database)?;

        tx.execute("DELETE FROM conversations WHERE id = ?1", [&conversation.id])
            .map_err(AppError::database)?;
        ensure_conversation(&tx, &conversation.id, conversation.created_at)?;
        for message in &conversation.messages {
            insert_message(&tx, &conversation.id, message)?;
        }
        trim_messages(&tx, &conversation.id, self.max_messages)?;

        tx.commit().map_err(AppError::database)?;

        tracing::info!(
            conversation = %conversation.id,
            messages = conversation.messages.len(),
            "Imported conversation"
        );
        Ok(())
    }
}
