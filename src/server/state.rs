//! Application state shared across all request handlers.

use std::sync::Arc;

use tracing::info;

use crate::chat::{ChatBackend, PlaceholderChat, find_model_path};
use crate::core::config::ModelConfig;
use crate::models::ModelRegistry;
use crate::storage::{
    ConversationExchange, ConversationStore, Database, MessageStore, SettingsStore,
    SqliteConversationExchange, SqliteConversationStore, SqliteMessageStore, SqliteSettingsStore,
    SqliteTranscriptStore, TranscriptStore,
};

/// Shared application state.
pub struct AppState {
    /// Conversation records.
    pub conversations: Arc<dyn ConversationStore>,
    /// Conversation messages.
    pub messages: Arc<dyn MessageStore>,
    /// Conversation transcripts.
    pub transcripts: Arc<dyn TranscriptStore>,
    /// Export and import of whole conversations.
    pub exchange: Arc<dyn ConversationExchange>,
    /// User settings.
    pub settings: Arc<dyn SettingsStore>,
    /// Reply generator.
    pub chat: Arc<dyn ChatBackend>,
    /// Model files.
    pub models: ModelRegistry,
}

impl AppState {
    /// Wire the `SQLite` stores and the placeholder chat backend.
    #[must_use]
    pub fn new(db: &Database, models: &ModelConfig) -> Arc<Self> {
        let registry = ModelRegistry::new(models);
        let chat = PlaceholderChat::new(find_model_path(registry.models_dir()));
        if let Some(path) = chat.model_path() {
            info!("Discovered model file {}", path.display());
        } else {
            info!("No model file found in {}", registry.models_dir().display());
        }

        Arc::new(Self {
            conversations: Arc::new(SqliteConversationStore::new(db.connection())),
            messages: Arc::new(SqliteMessageStore::new(db.connection())),
            transcripts: Arc::new(SqliteTranscriptStore::new(db.connection())),
            exchange: Arc::new(SqliteConversationExchange::new(db.connection())),
            settings: Arc::new(SqliteSettingsStore::new(db.connection())),
            chat: Arc::new(chat),
            models: registry,
        })
    }
}
