//! SQLite-backed conversation store.

use std::sync::Arc;

use rusqlite::OptionalExtension;
use tokio_rusqlite::Connection;
use tracing::{debug, info};

use crate::core::errors::{StudioError, StudioResult};
use crate::core::ids::ConversationId;

use super::types::{Conversation, ConversationPatch, ConversationSummary, Metadata, NewConversation};
use super::{StoreFuture, json_from_column, json_to_column, now, timestamp_from_millis};

/// Summary projection with the derived message count.
const SUMMARY_SELECT: &str = "
    SELECT c.id, c.title, c.parent_id, c.created_at, c.updated_at,
           (SELECT COUNT(*) FROM messages m WHERE m.conversation_id = c.id)
    FROM conversations c";

/// Trait for conversation storage.
pub trait ConversationStore: Send + Sync {
    /// Create a conversation with a fresh identity.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn create(&self, input: NewConversation) -> StoreFuture<'_, StudioResult<Conversation>>;

    /// Get a conversation by ID.
    ///
    /// # Errors
    /// Returns `NotFound` if the conversation does not exist.
    fn get(&self, id: ConversationId) -> StoreFuture<'_, StudioResult<Conversation>>;

    /// Get a conversation summary by ID.
    ///
    /// # Errors
    /// Returns `NotFound` if the conversation does not exist.
    fn summary(&self, id: ConversationId) -> StoreFuture<'_, StudioResult<ConversationSummary>>;

    /// Apply a partial update and refresh `updated_at`.
    ///
    /// # Errors
    /// Returns `NotFound` if the conversation does not exist.
    fn update(
        &self,
        id: ConversationId,
        patch: ConversationPatch,
    ) -> StoreFuture<'_, StudioResult<Conversation>>;

    /// List all conversations, newest first.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn list(&self) -> StoreFuture<'_, StudioResult<Vec<ConversationSummary>>>;

    /// Delete a conversation together with its messages and transcripts.
    ///
    /// # Errors
    /// Returns `NotFound` if the conversation does not exist.
    fn delete(&self, id: ConversationId) -> StoreFuture<'_, StudioResult<()>>;

    /// Check if a conversation exists.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn exists(&self, id: ConversationId) -> StoreFuture<'_, StudioResult<bool>>;
}

/// `SQLite` implementation of the conversation store.
pub struct SqliteConversationStore {
    conn: Arc<Connection>,
}

impl SqliteConversationStore {
    /// Build the store on a shared connection.
    #[must_use]
    pub const fn new(conn: Arc<Connection>) -> Self {
        Self { conn }
    }
}

fn read_conversation(row: &rusqlite::Row<'_>) -> rusqlite::Result<Conversation> {
    let metadata_json: String = row.get(3)?;
    Ok(Conversation {
        id: row.get(0)?,
        title: row.get(1)?,
        parent_id: row.get(2)?,
        metadata: json_from_column(3, &metadata_json)?,
        created_at: timestamp_from_millis(4, row.get(4)?)?,
        updated_at: timestamp_from_millis(5, row.get(5)?)?,
    })
}

fn read_summary(row: &rusqlite::Row<'_>) -> rusqlite::Result<ConversationSummary> {
    let count: i64 = row.get(5)?;
    Ok(ConversationSummary {
        id: row.get(0)?,
        title: row.get(1)?,
        parent_id: row.get(2)?,
        created_at: timestamp_from_millis(3, row.get(3)?)?,
        updated_at: timestamp_from_millis(4, row.get(4)?)?,
        message_count: u64::try_from(count)
            .map_err(|_| rusqlite::Error::IntegralValueOutOfRange(5, count))?,
    })
}

/// Load a conversation, for use inside a connection call.
pub(crate) fn load_conversation(
    conn: &rusqlite::Connection,
    id: ConversationId,
) -> rusqlite::Result<Option<Conversation>> {
    conn.query_row(
        "SELECT id, title, parent_id, metadata_json, created_at, updated_at
         FROM conversations
         WHERE id = ?1",
        rusqlite::params![id],
        read_conversation,
    )
    .optional()
}

/// Load a conversation summary, for use inside a connection call.
pub(crate) fn load_summary(
    conn: &rusqlite::Connection,
    id: ConversationId,
) -> rusqlite::Result<Option<ConversationSummary>> {
    conn.query_row(
        &format!("{SUMMARY_SELECT} WHERE c.id = ?1"),
        rusqlite::params![id],
        read_summary,
    )
    .optional()
}

/// Insert a conversation row, for use inside a connection call.
pub(crate) fn insert_conversation(
    conn: &rusqlite::Connection,
    conversation: &Conversation,
) -> tokio_rusqlite::Result<()> {
    let metadata_json = json_to_column(&conversation.metadata)?;
    conn.execute(
        "INSERT INTO conversations (id, title, parent_id, metadata_json, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![
            conversation.id,
            conversation.title,
            conversation.parent_id,
            metadata_json,
            conversation.created_at.timestamp_millis(),
            conversation.updated_at.timestamp_millis()
        ],
    )?;
    Ok(())
}

impl ConversationStore for SqliteConversationStore {
    fn create(&self, input: NewConversation) -> StoreFuture<'_, StudioResult<Conversation>> {
        Box::pin(async move {
            let created_at = now();
            let conversation = Conversation {
                id: ConversationId::new(),
                title: input.title,
                parent_id: input.parent_id,
                metadata: input.metadata.unwrap_or_default(),
                created_at,
                updated_at: created_at,
            };

            let row = conversation.clone();
            self.conn
                .call(move |conn| insert_conversation(conn, &row))
                .await?;

            info!("Created conversation: {}", conversation.id);
            Ok(conversation)
        })
    }

    fn get(&self, id: ConversationId) -> StoreFuture<'_, StudioResult<Conversation>> {
        Box::pin(async move {
            let row = self
                .conn
                .call(move |conn| Ok(load_conversation(conn, id)?))
                .await?;
            row.ok_or_else(|| StudioError::not_found("conversation", id))
        })
    }

    fn summary(&self, id: ConversationId) -> StoreFuture<'_, StudioResult<ConversationSummary>> {
        Box::pin(async move {
            let row = self
                .conn
                .call(move |conn| Ok(load_summary(conn, id)?))
                .await?;
            row.ok_or_else(|| StudioError::not_found("conversation", id))
        })
    }

    fn update(
        &self,
        id: ConversationId,
        patch: ConversationPatch,
    ) -> StoreFuture<'_, StudioResult<Conversation>> {
        Box::pin(async move {
            let updated_at = now().timestamp_millis();
            let metadata_json = patch
                .metadata
                .as_ref()
                .map(serde_json::to_string::<Metadata>)
                .transpose()?;

            let row = self
                .conn
                .call(move |conn| {
                    let tx = conn.transaction()?;
                    let changed = tx.execute(
                        "UPDATE conversations
                         SET title = COALESCE(?1, title),
                             metadata_json = COALESCE(?2, metadata_json),
                             updated_at = ?3
                         WHERE id = ?4",
                        rusqlite::params![patch.title, metadata_json, updated_at, id],
                    )?;
                    let row = if changed == 0 {
                        None
                    } else {
                        load_conversation(&tx, id)?
                    };
                    tx.commit()?;
                    Ok(row)
                })
                .await?;

            let conversation = row.ok_or_else(|| StudioError::not_found("conversation", id))?;
            debug!("Updated conversation: {id}");
            Ok(conversation)
        })
    }

    fn list(&self) -> StoreFuture<'_, StudioResult<Vec<ConversationSummary>>> {
        Box::pin(async move {
            let rows = self
                .conn
                .call(|conn| {
                    let mut stmt = conn.prepare(&format!(
                        "{SUMMARY_SELECT} ORDER BY c.created_at DESC, c.rowid DESC"
                    ))?;
                    let rows = stmt
                        .query_map([], read_summary)?
                        .collect::<Result<Vec<_>, _>>()?;
                    Ok(rows)
                })
                .await?;
            Ok(rows)
        })
    }

    fn delete(&self, id: ConversationId) -> StoreFuture<'_, StudioResult<()>> {
        Box::pin(async move {
            let deleted = self
                .conn
                .call(move |conn| {
                    let tx = conn.transaction()?;
                    tx.execute(
                        "DELETE FROM messages WHERE conversation_id = ?1",
                        rusqlite::params![id],
                    )?;
                    tx.execute(
                        "DELETE FROM transcripts WHERE conversation_id = ?1",
                        rusqlite::params![id],
                    )?;
                    let deleted = tx.execute(
                        "DELETE FROM conversations WHERE id = ?1",
                        rusqlite::params![id],
                    )?;
                    tx.commit()?;
                    Ok(deleted)
                })
                .await?;

            if deleted == 0 {
                return Err(StudioError::not_found("conversation", id));
            }
            info!("Deleted conversation: {id}");
            Ok(())
        })
    }

    fn exists(&self, id: ConversationId) -> StoreFuture<'_, StudioResult<bool>> {
        Box::pin(async move {
            let exists = self
                .conn
                .call(move |conn| Ok(super::conversation_exists(conn, id)?))
                .await?;
            Ok(exists)
        })
    }
}
