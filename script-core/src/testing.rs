//! Testing utilities.
//!
//! - `ScriptedModel` for deterministic generation without API calls
//! - fixture helpers that lay out a scripts/data tree on disk

use crate::config::ScriptConfig;
use crate::model::{DialogueModel, ModelError};
use crate::scene::{Character, Scene};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Mutex;

/// One scripted reply.
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    Text(String),
    Fail(String),
}

/// A model that returns scripted replies in order.
///
/// Once the script runs out the last reply repeats, so a single reply means
/// "always answer this". Every prompt received is recorded.
#[derive(Debug, Default)]
pub struct ScriptedModel {
    replies: Mutex<VecDeque<ScriptedReply>>,
    last: Mutex<Option<ScriptedReply>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    /// Reply with each text in turn.
    pub fn new<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_replies(texts.into_iter().map(|t| ScriptedReply::Text(t.into())))
    }

    pub fn from_replies(replies: impl IntoIterator<Item = ScriptedReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            ..Self::default()
        }
    }

    /// Always answer with `text`.
    pub fn always(text: impl Into<String>) -> Self {
        Self::new([text.into()])
    }

    /// Always fail with `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self::from_replies([ScriptedReply::Fail(message.into())])
    }

    /// Prompts received so far, oldest first.
    pub fn prompts(&self) -> Vec<String> {
        lock(&self.prompts).clone()
    }

    /// Number of calls made.
    pub fn calls(&self) -> usize {
        lock(&self.prompts).len()
    }

    fn next_reply(&self) -> Option<ScriptedReply> {
        let mut last = lock(&self.last);
        if let Some(reply) = lock(&self.replies).pop_front() {
            *last = Some(reply);
        }
        last.clone()
    }
}

#[async_trait]
impl DialogueModel for ScriptedModel {
    async fn complete(&self, prompt: &str) -> Result<String, ModelError> {
        lock(&self.prompts).push(prompt.to_string());
        match self.next_reply() {
            Some(ScriptedReply::Text(text)) => Ok(text),
            Some(ScriptedReply::Fail(message)) => Err(ModelError::Failed(message)),
            None => Ok(String::new()),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Write scenes and characters as JSON documents under `root/scripts`.
///
/// Returns a config rooted at `root`.
pub fn write_fixture(
    root: impl AsRef<Path>,
    scenes: &[Scene],
    characters: &[Character],
) -> std::io::Result<ScriptConfig> {
    let config = ScriptConfig::rooted_at(root);
    let scenes_dir = config.scenes_dir();
    let characters_dir = config.characters_dir();
    std::fs::create_dir_all(&scenes_dir)?;
    std::fs::create_dir_all(&characters_dir)?;

    for scene in scenes {
        let json = serde_json::to_string_pretty(scene)?;
        std::fs::write(scenes_dir.join(format!("{}.json", scene.scene_id)), json)?;
    }
    for character in characters {
        let json = serde_json::to_string_pretty(character)?;
        std::fs::write(
            characters_dir.join(format!("{}.json", character.character_id)),
            json,
        )?;
    }
    Ok(config)
}
