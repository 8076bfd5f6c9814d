//! Transcript store for speaker-attributed logs.

use std::sync::Arc;

use tokio_rusqlite::Connection;
use tracing::debug;

use crate::core::errors::{StudioError, StudioResult};
use crate::core::ids::{ConversationId, TranscriptId};

use super::types::{NewTranscript, Transcript};
use super::{StoreFuture, conversation_exists, now, timestamp_from_millis, touch_conversation};

/// Transcript store trait.
pub trait TranscriptStore: Send + Sync {
    /// Append a transcript entry to a conversation.
    ///
    /// # Errors
    /// Returns `NotFound` if the conversation does not exist.
    fn create(
        &self,
        conversation_id: ConversationId,
        input: NewTranscript,
    ) -> StoreFuture<'_, StudioResult<Transcript>>;

    /// List the transcript entries of a conversation in creation order.
    ///
    /// # Errors
    /// Returns `NotFound` if the conversation does not exist.
    fn list(
        &self,
        conversation_id: ConversationId,
    ) -> StoreFuture<'_, StudioResult<Vec<Transcript>>>;
}

/// `SQLite` implementation of transcript storage.
pub struct SqliteTranscriptStore {
    conn: Arc<Connection>,
}

impl SqliteTranscriptStore {
    /// Build the store on a shared connection.
    #[must_use]
    pub const fn new(conn: Arc<Connection>) -> Self {
        Self { conn }
    }
}

pub(crate) fn insert_transcript(
    conn: &rusqlite::Connection,
    transcript: &Transcript,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO transcripts (id, conversation_id, speaker, content, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![
            transcript.id,
            transcript.conversation_id,
            transcript.speaker,
            transcript.content,
            transcript.created_at.timestamp_millis()
        ],
    )?;
    Ok(())
}

pub(crate) fn load_transcripts(
    conn: &rusqlite::Connection,
    conversation_id: ConversationId,
) -> rusqlite::Result<Vec<Transcript>> {
    let mut stmt = conn.prepare(
        "SELECT id, conversation_id, speaker, content, created_at
         FROM transcripts
         WHERE conversation_id = ?1
         ORDER BY created_at, rowid",
    )?;
    let rows = stmt
        .query_map(rusqlite::params![conversation_id], |row| {
            Ok(Transcript {
                id: row.get(0)?,
                conversation_id: row.get(1)?,
                speaker: row.get(2)?,
                content: row.get(3)?,
                created_at: timestamp_from_millis(4, row.get(4)?)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

impl TranscriptStore for SqliteTranscriptStore {
    fn create(
        &self,
        conversation_id: ConversationId,
        input: NewTranscript,
    ) -> StoreFuture<'_, StudioResult<Transcript>> {
        Box::pin(async move {
            let transcript = Transcript {
                id: TranscriptId::new(),
                conversation_id,
                speaker: input.speaker,
                content: input.content,
                created_at: now(),
            };

            let row = transcript.clone();
            let inserted = self
                .conn
                .call(move |conn| {
                    let tx = conn.transaction()?;
                    if !conversation_exists(&tx, row.conversation_id)? {
                        return Ok(false);
                    }
                    insert_transcript(&tx, &row)?;
                    touch_conversation(&tx, row.conversation_id, row.created_at)?;
                    tx.commit()?;
                    Ok(true)
                })
                .await?;

            if !inserted {
                return Err(StudioError::not_found("conversation", conversation_id));
            }
            debug!("Appended transcript {} to conversation {conversation_id}", transcript.id);
            Ok(transcript)
        })
    }

    fn list(
        &self,
        conversation_id: ConversationId,
    ) -> StoreFuture<'_, StudioResult<Vec<Transcript>>> {
        Box::pin(async move {
            let rows = self
                .conn
                .call(move |conn| {
                    if !conversation_exists(conn, conversation_id)? {
                        return Ok(None);
                    }
                    Ok(Some(load_transcripts(conn, conversation_id)?))
                })
                .await?;
            rows.ok_or_else(|| StudioError::not_found("conversation", conversation_id))
        })
    }
}
