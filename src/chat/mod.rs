//! Chat generation seam.
//!
//! [`ChatBackend`] is what request handlers talk to; [`PlaceholderChat`] is the
//! only implementation until a real GGUF-backed model is wired in.

pub mod placeholder;

pub use placeholder::{KNOWN_MODEL_NAMES, PlaceholderChat, find_model_path};

use crate::core::errors::StudioResult;

/// A text generator answering a single prompt.
pub trait ChatBackend: Send + Sync {
    /// Produce a reply for `prompt`.
    ///
    /// # Errors
    /// Returns a validation error for an empty or whitespace-only prompt.
    fn generate(&self, prompt: &str) -> StudioResult<String>;

    /// Human-readable backend name.
    fn name(&self) -> &str;
}
