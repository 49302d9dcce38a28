//! The generative model seam.
//!
//! The orchestrator only needs `prompt → text`. A missing credential or a
//! failed call falls back to deterministic placeholder dialogue whenever a
//! scene is available, so generation keeps working offline.

use crate::config::ScriptConfig;
use crate::scene::Scene;
use async_trait::async_trait;
use claude::Claude;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Beats rendered into placeholder dialogue.
const FALLBACK_BEAT_LIMIT: usize = 4;

/// Errors from a model call.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Claude API error: {0}")]
    Claude(#[from] claude::Error),

    #[error("Model call failed: {0}")]
    Failed(String),
}

/// Anything that turns a prompt into dialogue text.
#[async_trait]
pub trait DialogueModel: Send + Sync {
    /// Generate text for `prompt`.
    async fn complete(&self, prompt: &str) -> Result<String, ModelError>;

    /// Short name for logs.
    fn name(&self) -> &str;
}

/// Dialogue model backed by the Claude Messages API.
#[derive(Debug, Clone)]
pub struct ClaudeModel {
    client: Claude,
    max_tokens: usize,
    temperature: Option<f32>,
}

impl ClaudeModel {
    pub fn new(client: Claude) -> Self {
        Self {
            client,
            max_tokens: 1024,
            temperature: Some(0.7),
        }
    }

    /// Build from `ANTHROPIC_API_KEY` and the model settings in `config`.
    ///
    /// Returns `None` when no key is configured.
    pub fn from_env(config: &ScriptConfig) -> Option<Self> {
        let client = Claude::from_env().ok()?;
        Some(Self::with_config(client, config))
    }

    pub fn with_config(client: Claude, config: &ScriptConfig) -> Self {
        let client = match config.model {
            Some(ref model) => client.with_model(model),
            None => client,
        };
        Self {
            client,
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        }
    }
}

#[async_trait]
impl DialogueModel for ClaudeModel {
    async fn complete(&self, prompt: &str) -> Result<String, ModelError> {
        Ok(self
            .client
            .complete_text(prompt, self.max_tokens, self.temperature)
            .await?)
    }

    fn name(&self) -> &str {
        self.client.model()
    }
}

/// Where a piece of dialogue came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialogueSource {
    Model,
    /// Placeholder text produced without (or despite) the model.
    Fallback,
}

/// Text returned by [`call_with_fallback`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelReply {
    pub text: String,
    pub source: DialogueSource,
}

/// Deterministic placeholder dialogue for a scene.
///
/// One line per beat (first four), speakers cycling through the cast.
pub fn mock_dialogue(scene: &Scene) -> String {
    let default_cast = ["D".to_string(), "J".to_string()];
    let default_beats = ["beat 1".to_string(), "beat 2".to_string()];

    let cast: &[String] = if scene.characters.is_empty() {
        &default_cast
    } else {
        &scene.characters
    };
    let beats: &[String] = if scene.beats.is_empty() {
        &default_beats
    } else {
        &scene.beats
    };

    beats
        .iter()
        .take(FALLBACK_BEAT_LIMIT)
        .enumerate()
        .map(|(i, beat)| format!("{}: [Generated for '{}']", cast[i % cast.len()], beat))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Call `model`, substituting placeholder dialogue when a scene is known.
///
/// - no model: placeholder text for `scene`, or empty text without one;
/// - model error: placeholder text for `scene`, or the error without one.
pub async fn call_with_fallback(
    model: Option<&dyn DialogueModel>,
    prompt: &str,
    scene: Option<&Scene>,
) -> Result<ModelReply, ModelError> {
    let fallback = |scene: &Scene| ModelReply {
        text: mock_dialogue(scene),
        source: DialogueSource::Fallback,
    };

    let Some(model) = model else {
        return Ok(match scene {
            Some(scene) => {
                tracing::debug!(
                    scene_id = %scene.scene_id,
                    "no model configured, using placeholder dialogue"
                );
                fallback(scene)
            }
            None => ModelReply {
                text: String::new(),
                source: DialogueSource::Fallback,
            },
        });
    };

    match model.complete(prompt).await {
        Ok(text) => Ok(ModelReply {
            text,
            source: DialogueSource::Model,
        }),
        Err(e) => match scene {
            Some(scene) => {
                tracing::warn!(
                    model = model.name(),
                    scene_id = %scene.scene_id,
                    error = %e,
                    "model call failed, using placeholder dialogue"
                );
                Ok(fallback(scene))
            }
            None => Err(e),
        },
    }
}
