//! Core types shared by every subsystem: configuration, errors and identifiers.

pub mod config;
pub mod errors;
pub mod ids;

pub use config::{DatabaseLocation, ModelConfig, ServerConfig, StorageConfig, StudioConfig};
pub use errors::{StudioError, StudioResult};
pub use ids::{ConversationId, MessageId, TranscriptId};
