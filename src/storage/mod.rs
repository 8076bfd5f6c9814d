//! Relational persistence for conversations, messages, transcripts and settings.
//!
//! All stores share one [`tokio_rusqlite::Connection`] opened by [`Database`];
//! each operation runs as a single `call` on the connection thread, and
//! multi-row writes are wrapped in a transaction.

pub mod conversation_store;
pub mod database;
pub mod exchange;
pub mod message_store;
pub mod settings_store;
pub mod transcript_store;
pub mod types;

use std::future::Future;
use std::pin::Pin;

use chrono::{DateTime, Utc};

pub use conversation_store::{ConversationStore, SqliteConversationStore};
pub use database::Database;
pub use exchange::{ConversationExchange, SqliteConversationExchange};
pub use message_store::{MessageStore, SqliteMessageStore};
pub use settings_store::{SettingsStore, SqliteSettingsStore};
pub use transcript_store::{SqliteTranscriptStore, TranscriptStore};
pub use types::{
    Conversation, ConversationPatch, ConversationSummary, ExportDocument, ImportDocument,
    ImportedConversation, ImportedMessage, ImportedTranscript, Message, Metadata, NewConversation,
    NewMessage, NewTranscript, SettingsMap, Transcript,
};

/// Boxed future type for store operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Current time truncated to the millisecond precision used on disk.
pub(crate) fn now() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now)
}

/// Decode a stored millisecond timestamp.
pub(crate) fn timestamp_from_millis(column: usize, millis: i64) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(column, millis))
}

/// Decode a JSON text column.
pub(crate) fn json_from_column<T: serde::de::DeserializeOwned>(
    column: usize,
    raw: &str,
) -> rusqlite::Result<T> {
    serde_json::from_str(raw).map_err(|err| {
        rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(err))
    })
}

/// Encode a value for a JSON text column inside a connection call.
pub(crate) fn json_to_column<T: serde::Serialize>(value: &T) -> tokio_rusqlite::Result<String> {
    serde_json::to_string(value).map_err(|err| tokio_rusqlite::Error::Other(Box::new(err)))
}

/// Whether a conversation row exists, for use inside a connection call.
pub(crate) fn conversation_exists(
    conn: &rusqlite::Connection,
    id: crate::core::ids::ConversationId,
) -> rusqlite::Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM conversations WHERE id = ?1",
        rusqlite::params![id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Refresh a conversation's `updated_at`, for use inside a connection call.
pub(crate) fn touch_conversation(
    conn: &rusqlite::Connection,
    id: crate::core::ids::ConversationId,
    at: DateTime<Utc>,
) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE conversations SET updated_at = ?1 WHERE id = ?2",
        rusqlite::params![at.timestamp_millis(), id],
    )?;
    Ok(())
}
