//! Message store for conversation threads.

use std::sync::Arc;

use tokio_rusqlite::Connection;
use tracing::debug;

use crate::core::errors::{StudioError, StudioResult};
use crate::core::ids::{ConversationId, MessageId};

use super::types::{Message, NewMessage};
use super::{StoreFuture, conversation_exists, now, timestamp_from_millis, touch_conversation};

/// Message store trait.
pub trait MessageStore: Send + Sync {
    /// List the messages of a conversation in creation order.
    ///
    /// # Errors
    /// Returns `NotFound` if the conversation does not exist.
    fn list(&self, conversation_id: ConversationId) -> StoreFuture<'_, StudioResult<Vec<Message>>>;

    /// Append a message to a conversation.
    ///
    /// # Errors
    /// Returns `NotFound` if the conversation does not exist.
    fn create(
        &self,
        conversation_id: ConversationId,
        input: NewMessage,
    ) -> StoreFuture<'_, StudioResult<Message>>;
}

/// `SQLite` implementation of message storage.
pub struct SqliteMessageStore {
    conn: Arc<Connection>,
}

impl SqliteMessageStore {
    /// Build the store on a shared connection.
    #[must_use]
    pub const fn new(conn: Arc<Connection>) -> Self {
        Self { conn }
    }
}

/// Insert a message row, for use inside a connection call.
pub(crate) fn insert_message(conn: &rusqlite::Connection, message: &Message) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO messages (id, conversation_id, sender, content, parent_message_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![
            message.id,
            message.conversation_id,
            message.sender,
            message.content,
            message.parent_message_id,
            message.created_at.timestamp_millis()
        ],
    )?;
    Ok(())
}

/// Load the messages of a conversation, for use inside a connection call.
pub(crate) fn load_messages(
    conn: &rusqlite::Connection,
    conversation_id: ConversationId,
) -> rusqlite::Result<Vec<Message>> {
    let mut stmt = conn.prepare(
        "SELECT id, conversation_id, sender, content, parent_message_id, created_at
         FROM messages
         WHERE conversation_id = ?1
         ORDER BY created_at, rowid",
    )?;
    let rows = stmt
        .query_map(rusqlite::params![conversation_id], |row| {
            Ok(Message {
                id: row.get(0)?,
                conversation_id: row.get(1)?,
                sender: row.get(2)?,
                content: row.get(3)?,
                parent_message_id: row.get(4)?,
                created_at: timestamp_from_millis(5, row.get(5)?)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

impl MessageStore for SqliteMessageStore {
    fn list(&self, conversation_id: ConversationId) -> StoreFuture<'_, StudioResult<Vec<Message>>> {
        Box::pin(async move {
            let rows = self
                .conn
                .call(move |conn| {
                    if !conversation_exists(conn, conversation_id)? {
                        return Ok(None);
                    }
                    Ok(Some(load_messages(conn, conversation_id)?))
                })
                .await?;
            rows.ok_or_else(|| StudioError::not_found("conversation", conversation_id))
        })
    }

    fn create(
        &self,
        conversation_id: ConversationId,
        input: NewMessage,
    ) -> StoreFuture<'_, StudioResult<Message>> {
        Box::pin(async move {
            let message = Message {
                id: MessageId::new(),
                conversation_id,
                sender: input.sender,
                content: input.content,
                parent_message_id: input.parent_message_id,
                created_at: now(),
            };

            let row = message.clone();
            let inserted = self
                .conn
                .call(move |conn| {
                    let tx = conn.transaction()?;
                    if !conversation_exists(&tx, row.conversation_id)? {
                        return Ok(false);
                    }
                    insert_message(&tx, &row)?;
                    touch_conversation(&tx, row.conversation_id, row.created_at)?;
                    tx.commit()?;
                    Ok(true)
                })
                .await?;

            if !inserted {
                return Err(StudioError::not_found("conversation", conversation_id));
            }
            debug!("Appended message {} to conversation {conversation_id}", message.id);
            Ok(message)
        })
    }
}
