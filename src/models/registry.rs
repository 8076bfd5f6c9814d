//! Registry of `.gguf` model files in a directory.
//!
//! Nothing here touches model weights: loading only marks a file as the
//! active model, and ablation duplicates the file under a suffixed name.

use std::ffi::OsStr;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::chat::ChatBackend;
use crate::core::config::ModelConfig;
use crate::core::errors::{StudioError, StudioResult};

/// File extension of model files.
pub const MODEL_EXTENSION: &str = "gguf";

/// Suffix appended to the stem of an ablated copy.
const ABLATED_SUFFIX: &str = "_ablated";

/// A model file known to the registry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ModelInfo {
    /// File name, used as the model identifier.
    pub name: String,
    /// File size in bytes.
    pub size_bytes: u64,
    /// Whether this is the active model.
    pub active: bool,
}

/// One model's answer in a comparison run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ComparisonResult {
    /// Model name.
    pub model: String,
    /// Generated reply.
    pub response: String,
}

/// Tracks model files and the single active model.
pub struct ModelRegistry {
    models_dir: PathBuf,
    active: RwLock<Option<String>>,
}

impl ModelRegistry {
    /// Create a registry over the configured directory.
    #[must_use]
    pub fn new(config: &ModelConfig) -> Self {
        Self {
            models_dir: config.models_dir.clone(),
            active: RwLock::new(None),
        }
    }

    /// Directory scanned for model files.
    #[must_use]
    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }

    /// List model files sorted by name.
    ///
    /// A missing directory yields an empty list.
    ///
    /// # Errors
    /// Returns an error if the directory cannot be read.
    pub async fn list(&self) -> StudioResult<Vec<ModelInfo>> {
        let mut entries = match tokio::fs::read_dir(&self.models_dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let active = self.active.read().await.clone();
        let mut models = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(OsStr::to_str) != Some(MODEL_EXTENSION) {
                continue;
            }
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }
            let Some(name) = path.file_name().and_then(OsStr::to_str) else {
                continue;
            };
            models.push(ModelInfo {
                name: name.to_string(),
                size_bytes: metadata.len(),
                active: active.as_deref() == Some(name),
            });
        }

        models.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(models)
    }

    /// Name of the active model.
    pub async fn active(&self) -> Option<String> {
        self.active.read().await.clone()
    }

    /// Make `name` the active model, replacing any previous one.
    ///
    /// # Errors
    /// Returns a validation error for malformed names and `NotFound` when the
    /// file does not exist.
    pub async fn load(&self, name: &str) -> StudioResult<ModelInfo> {
        let size_bytes = self.model_size(name).await?;

        let previous = self.active.write().await.replace(name.to_string());
        match previous {
            Some(previous) if previous != name => info!("Swapped model {previous} for {name}"),
            _ => info!("Loaded model {name}"),
        }

        Ok(ModelInfo {
            name: name.to_string(),
            size_bytes,
            active: true,
        })
    }

    /// Clear the active model, returning the one that was unloaded.
    pub async fn unload(&self) -> Option<String> {
        let previous = self.active.write().await.take();
        if let Some(name) = &previous {
            info!("Unloaded model {name}");
        }
        previous
    }

    /// Create `<stem>_ablated.gguf` as a copy of `name`.
    ///
    /// # Errors
    /// Returns `NotFound` when the source is missing and a validation error
    /// when the name is malformed or the copy already exists.
    pub async fn ablate(&self, name: &str) -> StudioResult<ModelInfo> {
        self.model_size(name).await?;

        let target = ablated_name(name);
        let target_path = self.models_dir.join(&target);
        if tokio::fs::try_exists(&target_path).await? {
            return Err(StudioError::validation(format!(
                "Ablated model {target} already exists"
            )));
        }

        let size_bytes = tokio::fs::copy(self.models_dir.join(name), &target_path).await?;
        info!("Created ablated model {target} from {name}");

        let active = self.active.read().await.as_deref() == Some(target.as_str());
        Ok(ModelInfo {
            name: target,
            size_bytes,
            active,
        })
    }

    /// Ask `chat` the same prompt once per model.
    ///
    /// # Errors
    /// Returns a validation error for a blank prompt or fewer than two distinct
    /// models, and `NotFound` for unknown models.
    pub async fn compare(
        &self,
        chat: &dyn ChatBackend,
        models: &[String],
        prompt: &str,
    ) -> StudioResult<Vec<ComparisonResult>> {
        let mut selected: Vec<&str> = Vec::with_capacity(models.len());
        for model in models {
            if !selected.contains(&model.as_str()) {
                selected.push(model);
            }
        }
        if selected.len() < 2 {
            return Err(StudioError::validation(
                "Please select at least 2 models for comparison",
            ));
        }
        if prompt.trim().is_empty() {
            return Err(StudioError::validation("Prompt cannot be empty."));
        }

        for model in &selected {
            self.model_size(model).await?;
        }

        let mut results = Vec::with_capacity(selected.len());
        for model in selected {
            results.push(ComparisonResult {
                model: model.to_string(),
                response: chat.generate(prompt)?,
            });
        }
        debug!("Compared {} models using {}", results.len(), chat.name());
        Ok(results)
    }

    async fn model_size(&self, name: &str) -> StudioResult<u64> {
        validate_model_name(name)?;
        match tokio::fs::metadata(self.models_dir.join(name)).await {
            Ok(metadata) if metadata.is_file() => Ok(metadata.len()),
            Ok(_) => Err(StudioError::not_found("model", name)),
            Err(err) if err.kind() == ErrorKind::NotFound => Err(StudioError::not_found("model", name)),
            Err(err) => Err(err.into()),
        }
    }
}

/// Reject anything that is not a bare `.gguf` file name.
fn validate_model_name(name: &str) -> StudioResult<()> {
    let path = Path::new(name);
    let is_bare = path.file_name().and_then(OsStr::to_str) == Some(name);
    if name.is_empty() || !is_bare || name.contains(['/', '\\']) || name.starts_with('.') || name.contains("..") {
        return Err(StudioError::validation(format!("Invalid model name: {name:?}")));
    }
    if path.extension().and_then(OsStr::to_str) != Some(MODEL_EXTENSION) {
        return Err(StudioError::validation(format!(
            "Model name must end with .{MODEL_EXTENSION}: {name}"
        )));
    }
    Ok(())
}

fn ablated_name(name: &str) -> String {
    let stem = Path::new(name)
        .file_stem()
        .and_then(OsStr::to_str)
        .unwrap_or(name);
    format!("{stem}{ABLATED_SUFFIX}.{MODEL_EXTENSION}")
}
