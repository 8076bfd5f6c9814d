//! Records exchanged with the stores.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::ids::{ConversationId, MessageId, TranscriptId};

/// Free-form conversation metadata.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Settings keyed by name.
pub type SettingsMap = BTreeMap<String, serde_json::Value>;

/// A stored conversation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    /// Unique identifier.
    pub id: ConversationId,
    /// Display title.
    pub title: String,
    /// Conversation this one branched from. Not required to exist.
    pub parent_id: Option<ConversationId>,
    /// Free-form metadata.
    pub metadata: Metadata,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last mutation time.
    pub updated_at: DateTime<Utc>,
}

/// Conversation listing entry with its derived message count.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationSummary {
    /// Unique identifier.
    pub id: ConversationId,
    /// Display title.
    pub title: String,
    /// Conversation this one branched from.
    pub parent_id: Option<ConversationId>,
    /// Number of messages in the conversation.
    pub message_count: u64,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last mutation time.
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a conversation.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct NewConversation {
    /// Display title.
    pub title: String,
    /// Optional parent conversation.
    #[serde(default)]
    pub parent_id: Option<ConversationId>,
    /// Optional initial metadata.
    #[serde(default)]
    pub metadata: Option<Metadata>,
}

impl NewConversation {
    /// Conversation with only a title.
    #[must_use]
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }
}

/// Partial update of a conversation. `None` leaves a field unchanged.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ConversationPatch {
    /// Replacement title.
    #[serde(default)]
    pub title: Option<String>,
    /// Replacement metadata.
    #[serde(default)]
    pub metadata: Option<Metadata>,
}

/// A message in a conversation thread.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Unique identifier.
    pub id: MessageId,
    /// Owning conversation.
    pub conversation_id: ConversationId,
    /// Author label, e.g. `user` or `assistant`.
    pub sender: String,
    /// Message body.
    pub content: String,
    /// Message this one replies to, for branching threads.
    pub parent_message_id: Option<MessageId>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// Input for appending a message.
#[derive(Clone, Debug, Deserialize)]
pub struct NewMessage {
    /// Author label.
    pub sender: String,
    /// Message body.
    pub content: String,
    /// Optional parent message.
    #[serde(default)]
    pub parent_message_id: Option<MessageId>,
}

/// A speaker-attributed transcript entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transcript {
    /// Unique identifier.
    pub id: TranscriptId,
    /// Owning conversation.
    pub conversation_id: ConversationId,
    /// Speaker label.
    pub speaker: String,
    /// Spoken text.
    pub content: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// Input for appending a transcript entry.
#[derive(Clone, Debug, Deserialize)]
pub struct NewTranscript {
    /// Speaker label.
    pub speaker: String,
    /// Spoken text.
    pub content: String,
}

/// Portable snapshot of one conversation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportDocument {
    /// Conversation summary.
    pub conversation: ConversationSummary,
    /// Messages in creation order.
    pub messages: Vec<Message>,
    /// Transcript entries in creation order.
    pub transcripts: Vec<Transcript>,
}

/// Document accepted by import.
///
/// Only the fields import uses are read; an [`ExportDocument`] serialized to
/// JSON always parses as one.
#[derive(Clone, Debug, Deserialize)]
pub struct ImportDocument {
    /// Conversation header.
    pub conversation: ImportedConversation,
    /// Messages to recreate.
    #[serde(default)]
    pub messages: Vec<ImportedMessage>,
    /// Transcript entries to recreate.
    #[serde(default)]
    pub transcripts: Vec<ImportedTranscript>,
}

/// Conversation header of an import document.
#[derive(Clone, Debug, Deserialize)]
pub struct ImportedConversation {
    /// Title copied to the new conversation.
    pub title: String,
    /// Parent copied verbatim.
    #[serde(default)]
    pub parent_id: Option<ConversationId>,
}

/// Message of an import document.
#[derive(Clone, Debug, Deserialize)]
pub struct ImportedMessage {
    /// Author label.
    pub sender: String,
    /// Message body.
    pub content: String,
    /// Parent message, copied unchanged.
    #[serde(default)]
    pub parent_message_id: Option<MessageId>,
    /// Original creation time; import time when absent.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Transcript entry of an import document.
#[derive(Clone, Debug, Deserialize)]
pub struct ImportedTranscript {
    /// Speaker label.
    pub speaker: String,
    /// Spoken text.
    pub content: String,
}

impl From<ExportDocument> for ImportDocument {
    fn from(doc: ExportDocument) -> Self {
        Self {
            conversation: ImportedConversation {
                title: doc.conversation.title,
                parent_id: doc.conversation.parent_id,
            },
            messages: doc
                .messages
                .into_iter()
                .map(|m| ImportedMessage {
                    sender: m.sender,
                    content: m.content,
                    parent_message_id: m.parent_message_id,
                    created_at: Some(m.created_at),
                })
                .collect(),
            transcripts: doc
                .transcripts
                .into_iter()
                .map(|t| ImportedTranscript {
                    speaker: t.speaker,
                    content: t.content,
                })
                .collect(),
        }
    }
}
