//! Scene and character loading.
//!
//! Each `*.json` document in a directory is one record. Malformed documents
//! are skipped with a warning rather than failing the whole load.

use crate::scene::{Character, Scene};
use serde::de::DeserializeOwned;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;

/// File name reserved for a JSON schema living next to the records.
const SCHEMA_FILE: &str = "schema.json";

/// Errors from the scene store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A loaded scene collection keyed by scene id.
#[derive(Debug, Clone, Default)]
pub struct SceneSet {
    scenes: BTreeMap<String, Scene>,
}

impl SceneSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from scenes in memory. Later duplicates are dropped.
    pub fn from_scenes(scenes: impl IntoIterator<Item = Scene>) -> Self {
        let mut set = Self::new();
        for scene in scenes {
            set.insert(scene);
        }
        set
    }

    /// Insert a scene unless its id is already taken. Returns whether it was added.
    pub fn insert(&mut self, scene: Scene) -> bool {
        if self.scenes.contains_key(&scene.scene_id) {
            return false;
        }
        self.scenes.insert(scene.scene_id.clone(), scene);
        true
    }

    pub fn get(&self, scene_id: &str) -> Option<&Scene> {
        self.scenes.get(scene_id)
    }

    pub fn contains(&self, scene_id: &str) -> bool {
        self.scenes.contains_key(scene_id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.scenes.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Scene> {
        self.scenes.values()
    }

    /// The scene with the lowest id, used when a caller names none.
    pub fn first(&self) -> Option<&Scene> {
        self.scenes.values().next()
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }
}

/// Loaded characters keyed by character id.
#[derive(Debug, Clone, Default)]
pub struct CharacterSet {
    characters: HashMap<String, Character>,
}

impl CharacterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_characters(characters: impl IntoIterator<Item = Character>) -> Self {
        let mut set = Self::new();
        for character in characters {
            set.characters
                .entry(character.character_id.clone())
                .or_insert(character);
        }
        set
    }

    pub fn get(&self, character_id: &str) -> Option<&Character> {
        self.characters.get(character_id)
    }

    pub fn len(&self) -> usize {
        self.characters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.characters.is_empty()
    }

    /// Characters cast in `scene`, in scene order. Unknown ids are dropped.
    pub fn for_scene(&self, scene: &Scene) -> Vec<Character> {
        scene
            .characters
            .iter()
            .filter_map(|id| self.characters.get(id).cloned())
            .collect()
    }
}

/// Load every scene document in `dir`.
///
/// A missing directory is an empty collection. When two documents share a
/// `scene_id` the first in file-name order wins.
pub async fn load_scenes(dir: impl AsRef<Path>) -> Result<SceneSet, StoreError> {
    let mut set = SceneSet::new();
    for (path, scene) in load_documents::<Scene>(dir.as_ref()).await? {
        if scene.scene_id.is_empty() {
            tracing::warn!(path = %path.display(), "skipping scene without scene_id");
            continue;
        }
        let scene_id = scene.scene_id.clone();
        if !set.insert(scene) {
            tracing::warn!(path = %path.display(), %scene_id, "skipping duplicate scene id");
        }
    }
    Ok(set)
}

/// Load every character document in `dir`.
pub async fn load_characters(dir: impl AsRef<Path>) -> Result<CharacterSet, StoreError> {
    let mut set = CharacterSet::new();
    for (path, character) in load_documents::<Character>(dir.as_ref()).await? {
        if character.character_id.is_empty() {
            tracing::warn!(path = %path.display(), "skipping character without character_id");
            continue;
        }
        if set.characters.contains_key(&character.character_id) {
            tracing::warn!(
                path = %path.display(),
                character_id = %character.character_id,
                "skipping duplicate character id"
            );
            continue;
        }
        set.characters
            .insert(character.character_id.clone(), character);
    }
    Ok(set)
}

async fn load_documents<T: DeserializeOwned>(dir: &Path) -> Result<Vec<(PathBuf, T)>, StoreError> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(StoreError::Io {
                path: dir.to_path_buf(),
                source,
            })
        }
    };

    let mut paths = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(|source| StoreError::Io {
        path: dir.to_path_buf(),
        source,
    })? {
        let path = entry.path();
        let is_json = path.extension().map(|e| e == "json").unwrap_or(false);
        let is_schema = path.file_name().map(|n| n == SCHEMA_FILE).unwrap_or(false);
        if is_json && !is_schema {
            paths.push(path);
        }
    }
    paths.sort();

    let mut documents = Vec::with_capacity(paths.len());
    for path in paths {
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping unreadable document");
                continue;
            }
        };
        match serde_json::from_str::<T>(&content) {
            Ok(doc) => documents.push((path, doc)),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping malformed document");
            }
        }
    }
    Ok(documents)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scene_set_keeps_first_duplicate() {
        let set = SceneSet::from_scenes([
            Scene::new("a").with_setting("first"),
            Scene::new("b"),
            Scene::new("a").with_setting("second"),
        ]);
        assert_eq!(set.len(), 2);
        assert_eq!(set.get("a").unwrap().setting, "first");
        assert_eq!(set.first().unwrap().scene_id, "a");
        assert_eq!(set.ids().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn test_characters_for_scene_in_scene_order() {
        let characters = CharacterSet::from_characters([
            Character::new("D", "Dana"),
            Character::new("J", "Jonah"),
        ]);
        let scene = Scene::new("s")
            .with_character("J")
            .with_character("ghost")
            .with_character("D");
        let cast: Vec<_> = characters
            .for_scene(&scene)
            .into_iter()
            .map(|c| c.character_id)
            .collect();
        assert_eq!(cast, vec!["J", "D"]);
    }

    #[tokio::test]
    async fn test_missing_directory_is_empty() {
        let set = load_scenes("/definitely/not/here").await.unwrap();
        assert!(set.is_empty());
    }
}
