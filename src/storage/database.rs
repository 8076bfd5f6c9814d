//! Database handle and schema.

use std::sync::Arc;

use tokio_rusqlite::Connection;
use tracing::info;

use crate::core::config::{DatabaseLocation, StorageConfig};
use crate::core::errors::StudioResult;

/// Schema applied on every open.
const SCHEMA: &str = "
    PRAGMA foreign_keys = ON;

    CREATE TABLE IF NOT EXISTS conversations (
        id TEXT PRIMARY KEY,
        title TEXT NOT NULL,
        parent_id TEXT,
        metadata_json TEXT NOT NULL,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_conversations_created
        ON conversations (created_at DESC);
    CREATE INDEX IF NOT EXISTS idx_conversations_parent
        ON conversations (parent_id);

    CREATE TABLE IF NOT EXISTS messages (
        id TEXT PRIMARY KEY,
        conversation_id TEXT NOT NULL REFERENCES conversations (id) ON DELETE CASCADE,
        sender TEXT NOT NULL,
        content TEXT NOT NULL,
        parent_message_id TEXT,
        created_at INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_messages_conversation_created
        ON messages (conversation_id, created_at);

    CREATE TABLE IF NOT EXISTS transcripts (
        id TEXT PRIMARY KEY,
        conversation_id TEXT NOT NULL REFERENCES conversations (id) ON DELETE CASCADE,
        speaker TEXT NOT NULL,
        content TEXT NOT NULL,
        created_at INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_transcripts_conversation_created
        ON transcripts (conversation_id, created_at);

    CREATE TABLE IF NOT EXISTS settings (
        key TEXT PRIMARY KEY,
        value_json TEXT NOT NULL,
        updated_at INTEGER NOT NULL
    );
";

/// Shared `SQLite` connection with the studio schema applied.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Connection>,
}

impl Database {
    /// Open the database described by `config` and create missing tables.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub async fn open(config: &StorageConfig) -> StudioResult<Self> {
        let conn = match &config.location {
            DatabaseLocation::File(path) => {
                info!("Opening database at {}", path.display());
                Connection::open(path).await?
            }
            DatabaseLocation::InMemory => {
                info!("Opening in-memory database");
                Connection::open_in_memory().await?
            }
        };

        conn.call(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;

        Ok(Self {
            conn: Arc::new(conn),
        })
    }

    /// Open a fresh in-memory database.
    ///
    /// # Errors
    /// Returns an error if the schema cannot be applied.
    pub async fn open_in_memory() -> StudioResult<Self> {
        Self::open(&StorageConfig::in_memory()).await
    }

    /// Shared connection handle.
    #[must_use]
    pub fn connection(&self) -> Arc<Connection> {
        Arc::clone(&self.conn)
    }
}
