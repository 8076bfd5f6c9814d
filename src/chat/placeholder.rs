//! Echo-style chat backend used until a real model loader exists.

use std::path::{Path, PathBuf};

use crate::core::errors::{StudioError, StudioResult};

use super::ChatBackend;

/// Model files looked for next to the application, in priority order.
pub const KNOWN_MODEL_NAMES: [&str; 3] = [
    "test_model.gguf",
    "test_model_ablated.gguf",
    "test_model_ablated_ablated.gguf",
];

/// Prefix marking placeholder replies.
const REPLY_PREFIX: &str = "(placeholder) You said: ";

/// Return the first known model file present in `dir`.
#[must_use]
pub fn find_model_path(dir: &Path) -> Option<PathBuf> {
    KNOWN_MODEL_NAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|candidate| candidate.is_file())
}

/// Deterministic echo backend.
#[derive(Clone, Debug, Default)]
pub struct PlaceholderChat {
    model_path: Option<PathBuf>,
}

impl PlaceholderChat {
    /// Create the backend, remembering the model file a real loader would use.
    #[must_use]
    pub const fn new(model_path: Option<PathBuf>) -> Self {
        Self { model_path }
    }

    /// Model file discovered at startup, if any.
    #[must_use]
    pub fn model_path(&self) -> Option<&Path> {
        self.model_path.as_deref()
    }
}

impl ChatBackend for PlaceholderChat {
    fn generate(&self, prompt: &str) -> StudioResult<String> {
        if prompt.trim().is_empty() {
            return Err(StudioError::validation("Prompt cannot be empty."));
        }
        Ok(format!("{REPLY_PREFIX}{prompt}"))
    }

    fn name(&self) -> &str {
        "placeholder"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_echoes_prompt() {
        let chat = PlaceholderChat::default();
        let reply = chat.generate("hello world").unwrap();
        assert_eq!(reply, "(placeholder) You said: hello world");
    }

    #[test]
    fn test_is_deterministic_and_verbatim() {
        let chat = PlaceholderChat::default();
        for prompt in ["a", "  padded  ", "multi\nline", "unicode é ✓"] {
            let first = chat.generate(prompt).unwrap();
            assert_eq!(first, chat.generate(prompt).unwrap());
            assert!(first.contains(prompt));
        }
    }

    #[test]
    fn test_rejects_blank_prompts() {
        let chat = PlaceholderChat::default();
        for prompt in ["", "   ", "\n\t"] {
            assert!(matches!(
                chat.generate(prompt),
                Err(StudioError::Validation(_))
            ));
        }
    }

    #[test]
    fn test_find_model_path_prefers_first_known_name() {
        let dir = std::env::temp_dir().join(format!("lambeck-chat-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        assert_eq!(find_model_path(&dir), None);

        std::fs::write(dir.join("test_model_ablated.gguf"), b"gguf").unwrap();
        assert_eq!(
            find_model_path(&dir),
            Some(dir.join("test_model_ablated.gguf"))
        );

        std::fs::write(dir.join("test_model.gguf"), b"gguf").unwrap();
        assert_eq!(find_model_path(&dir), Some(dir.join("test_model.gguf")));

        let chat = PlaceholderChat::new(find_model_path(&dir));
        assert_eq!(chat.model_path(), Some(dir.join("test_model.gguf").as_path()));

        let _ = std::fs::remove_dir_all(dir);
    }
}
