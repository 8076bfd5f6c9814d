//! Export and import of whole conversations.
//!
//! Export reads a conversation with its messages and transcripts in one
//! connection call. Import writes the new conversation and all of its rows in
//! a single transaction, so a failed import leaves nothing behind.

use std::sync::Arc;

use tokio_rusqlite::Connection;
use tracing::info;

use crate::core::errors::{StudioError, StudioResult};
use crate::core::ids::{ConversationId, MessageId, TranscriptId};

use super::conversation_store::{insert_conversation, load_summary};
use super::message_store::{insert_message, load_messages};
use super::transcript_store::{insert_transcript, load_transcripts};
use super::types::{
    Conversation, ConversationSummary, ExportDocument, ImportDocument, Message, Metadata, Transcript,
};
use super::{StoreFuture, now};

/// Conversation export/import trait.
pub trait ConversationExchange: Send + Sync {
    /// Snapshot a conversation with its messages and transcripts.
    ///
    /// # Errors
    /// Returns `NotFound` if the conversation does not exist.
    fn export(&self, id: ConversationId) -> StoreFuture<'_, StudioResult<ExportDocument>>;

    /// Recreate a document as a brand new conversation.
    ///
    /// Messages keep their timestamps and `parent_message_id` values as given;
    /// every row receives a fresh identity.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn import(&self, document: ImportDocument) -> StoreFuture<'_, StudioResult<ConversationSummary>>;
}

/// `SQLite` implementation of conversation export/import.
pub struct SqliteConversationExchange {
    conn: Arc<Connection>,
}

impl SqliteConversationExchange {
    /// Build the exchange on a shared connection.
    #[must_use]
    pub const fn new(conn: Arc<Connection>) -> Self {
        Self { conn }
    }
}

impl ConversationExchange for SqliteConversationExchange {
    fn export(&self, id: ConversationId) -> StoreFuture<'_, StudioResult<ExportDocument>> {
        Box::pin(async move {
            let document = self
                .conn
                .call(move |conn| {
                    let tx = conn.transaction()?;
                    let Some(conversation) = load_summary(&tx, id)? else {
                        return Ok(None);
                    };
                    let messages = load_messages(&tx, id)?;
                    let transcripts = load_transcripts(&tx, id)?;
                    tx.commit()?;
                    Ok(Some(ExportDocument {
                        conversation,
                        messages,
                        transcripts,
                    }))
                })
                .await?;
            document.ok_or_else(|| StudioError::not_found("conversation", id))
        })
    }

    fn import(&self, document: ImportDocument) -> StoreFuture<'_, StudioResult<ConversationSummary>> {
        Box::pin(async move {
            let imported_at = now();
            let conversation = Conversation {
                id: ConversationId::new(),
                title: document.conversation.title,
                parent_id: document.conversation.parent_id,
                metadata: Metadata::new(),
                created_at: imported_at,
                updated_at: imported_at,
            };
            let id = conversation.id;

            let messages: Vec<Message> = document
                .messages
                .into_iter()
                .map(|m| Message {
                    id: MessageId::new(),
                    conversation_id: id,
                    sender: m.sender,
                    content: m.content,
                    parent_message_id: m.parent_message_id,
                    created_at: m.created_at.unwrap_or(imported_at),
                })
                .collect();
            let transcripts: Vec<Transcript> = document
                .transcripts
                .into_iter()
                .map(|t| Transcript {
                    id: TranscriptId::new(),
                    conversation_id: id,
                    speaker: t.speaker,
                    content: t.content,
                    created_at: imported_at,
                })
                .collect();
            let (message_count, transcript_count) = (messages.len(), transcripts.len());

            let summary = self
                .conn
                .call(move |conn| {
                    let tx = conn.transaction()?;
                    insert_conversation(&tx, &conversation)?;
                    for message in &messages {
                        insert_message(&tx, message)?;
                    }
                    for transcript in &transcripts {
                        insert_transcript(&tx, transcript)?;
                    }
                    let summary = load_summary(&tx, id)?;
                    tx.commit()?;
                    Ok(summary)
                })
                .await?;

            info!(
                "Imported conversation {id} with {message_count} messages and {transcript_count} transcripts"
            );
            summary.ok_or_else(|| StudioError::not_found("conversation", id))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::conversation_store::{ConversationStore, SqliteConversationStore};
    use crate::storage::message_store::{MessageStore, SqliteMessageStore};
    use crate::storage::transcript_store::{SqliteTranscriptStore, TranscriptStore};
    use crate::storage::types::{NewConversation, NewMessage, NewTranscript};
    use crate::storage::Database;

    struct Fixture {
        db: Database,
        conversations: SqliteConversationStore,
        messages: SqliteMessageStore,
        transcripts: SqliteTranscriptStore,
        exchange: SqliteConversationExchange,
    }

    async fn fixture() -> Fixture {
        let db = Database::open_in_memory().await.unwrap();
        Fixture {
            conversations: SqliteConversationStore::new(db.connection()),
            messages: SqliteMessageStore::new(db.connection()),
            transcripts: SqliteTranscriptStore::new(db.connection()),
            exchange: SqliteConversationExchange::new(db.connection()),
            db,
        }
    }

    fn message(sender: &str, content: &str, parent: Option<MessageId>) -> NewMessage {
        NewMessage {
            sender: sender.to_string(),
            content: content.to_string(),
            parent_message_id: parent,
        }
    }

    #[tokio::test]
    async fn test_export_single_message() {
        let fx = fixture().await;
        let c1 = fx.conversations.create(NewConversation::titled("T")).await.unwrap();
        let m1 = fx.messages.create(c1.id, message("user", "hi", None)).await.unwrap();

        let doc = fx.exchange.export(c1.id).await.unwrap();
        assert_eq!(doc.conversation.id, c1.id);
        assert_eq!(doc.conversation.title, "T");
        assert_eq!(doc.conversation.message_count, 1);
        assert_eq!(doc.messages, vec![m1]);
        assert!(doc.transcripts.is_empty());
    }

    #[tokio::test]
    async fn test_export_missing_is_not_found() {
        let fx = fixture().await;
        assert!(matches!(
            fx.exchange.export(ConversationId::new()).await,
            Err(StudioError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_export_import_export() {
        let fx = fixture().await;
        let original = fx
            .conversations
            .create(NewConversation {
                title: "Research".to_string(),
                parent_id: Some(ConversationId::new()),
                metadata: Some(
                    [("pinned".to_string(), serde_json::json!(true))]
                        .into_iter()
                        .collect(),
                ),
            })
            .await
            .unwrap();
        let question = fx
            .messages
            .create(original.id, message("user", "question", None))
            .await
            .unwrap();
        fx.messages
            .create(original.id, message("assistant", "answer", Some(question.id)))
            .await
            .unwrap();
        fx.transcripts
            .create(
                original.id,
                NewTranscript {
                    speaker: "user".to_string(),
                    content: "spoken question".to_string(),
                },
            )
            .await
            .unwrap();

        let exported = fx.exchange.export(original.id).await.unwrap();
        let json = serde_json::to_string(&exported).unwrap();
        let document: ImportDocument = serde_json::from_str(&json).unwrap();
        let imported = fx.exchange.import(document).await.unwrap();

        assert_ne!(imported.id, original.id);
        assert_eq!(imported.title, "Research");
        assert_eq!(imported.parent_id, original.parent_id);
        assert_eq!(imported.message_count, 2);

        let again = fx.exchange.export(imported.id).await.unwrap();
        assert_eq!(again.conversation.title, exported.conversation.title);
        assert_eq!(again.messages.len(), exported.messages.len());
        assert_eq!(again.transcripts.len(), exported.transcripts.len());

        for (old, new) in exported.messages.iter().zip(&again.messages) {
            assert_ne!(old.id, new.id);
            assert_eq!(new.conversation_id, imported.id);
            assert_eq!(old.content, new.content);
            assert_eq!(old.created_at, new.created_at);
            assert_eq!(old.parent_message_id, new.parent_message_id);
        }

        let copy = fx.conversations.get(imported.id).await.unwrap();
        assert!(copy.metadata.is_empty());
    }

    #[tokio::test]
    async fn test_import_twice_creates_two_conversations() {
        let fx = fixture().await;
        let original = fx.conversations.create(NewConversation::titled("T")).await.unwrap();
        fx.messages
            .create(original.id, message("user", "hi", None))
            .await
            .unwrap();
        let exported = fx.exchange.export(original.id).await.unwrap();

        let first = fx.exchange.import(exported.clone().into()).await.unwrap();
        let second = fx.exchange.import(exported.into()).await.unwrap();

        assert_ne!(first.id, second.id);
        assert_eq!(fx.conversations.list().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_import_minimal_document() {
        let fx = fixture().await;
        let document: ImportDocument = serde_json::from_value(serde_json::json!({
            "conversation": {"title": "From file"},
            "messages": [{"sender": "user", "content": "hello"}]
        }))
        .unwrap();

        let imported = fx.exchange.import(document).await.unwrap();
        assert_eq!(imported.title, "From file");
        assert_eq!(imported.parent_id, None);
        assert_eq!(imported.message_count, 1);
    }

    #[tokio::test]
    async fn test_failed_import_leaves_nothing_behind() {
        let fx = fixture().await;
        fx.db
            .connection()
            .call(|conn| {
                conn.execute_batch(
                    "CREATE TRIGGER reject_transcripts BEFORE INSERT ON transcripts
                     BEGIN SELECT RAISE(ABORT, 'transcripts rejected'); END;",
                )?;
                Ok(())
            })
            .await
            .unwrap();

        let document: ImportDocument = serde_json::from_value(serde_json::json!({
            "conversation": {"title": "Doomed"},
            "messages": [{"sender": "user", "content": "hello"}],
            "transcripts": [{"speaker": "user", "content": "hello"}]
        }))
        .unwrap();

        let err = fx.exchange.import(document).await.unwrap_err();
        assert!(!err.is_client_error());
        assert!(fx.conversations.list().await.unwrap().is_empty());

        let orphaned: i64 = fx
            .db
            .connection()
            .call(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))?))
            .await
            .unwrap();
        assert_eq!(orphaned, 0);
    }
}
