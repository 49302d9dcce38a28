//! Version history for generated scenes.
//!
//! Each accepted generation is written once as
//! `{root}/{scene_id}/{version_id}.json` and never rewritten. Versions may
//! name a parent, but the lineage is advisory and never checked.

use crate::controls::ParamMap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Constraint name → value, as snapshotted with each version.
pub type ConstraintMap = BTreeMap<String, serde_json::Value>;

/// Upper bound on collision suffixes tried for one second.
const MAX_ID_SUFFIX: u32 = 10_000;

/// Errors from the version store.
#[derive(Debug, Error)]
pub enum VersionError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid scene id: {0:?}")]
    InvalidSceneId(String),

    #[error("Could not allocate a version id for {scene_id} at {stamp}")]
    IdExhausted { scene_id: String, stamp: String },
}

/// An immutable snapshot of generated dialogue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Version {
    pub version_id: String,
    pub scene_id: String,
    pub text: String,
    #[serde(default)]
    pub constraints: ConstraintMap,
    #[serde(default)]
    pub emotional_params: ParamMap,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub parent_version_id: Option<String>,
}

/// A version without its text, for listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionSummary {
    pub version_id: String,
    pub scene_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub emotional_params: ParamMap,
    #[serde(default)]
    pub constraints: ConstraintMap,
    #[serde(default)]
    pub parent_version_id: Option<String>,
}

impl From<&Version> for VersionSummary {
    fn from(v: &Version) -> Self {
        Self {
            version_id: v.version_id.clone(),
            scene_id: v.scene_id.clone(),
            timestamp: v.timestamp,
            emotional_params: v.emotional_params.clone(),
            constraints: v.constraints.clone(),
            parent_version_id: v.parent_version_id.clone(),
        }
    }
}

/// Flat-file version store.
#[derive(Debug, Clone)]
pub struct VersionStore {
    root: PathBuf,
}

impl VersionStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Persist a new version and return its id.
    ///
    /// The id is `{scene_id}_{YYYYMMDD_HHMMSS}` in UTC. A second save in the
    /// same second gets `_2`, then `_3`, and so on; existing files are never
    /// overwritten.
    pub async fn save_version(
        &self,
        scene_id: &str,
        text: &str,
        constraints: ConstraintMap,
        emotional_params: ParamMap,
        parent_version_id: Option<String>,
    ) -> Result<String, VersionError> {
        if !is_safe_component(scene_id) {
            return Err(VersionError::InvalidSceneId(scene_id.to_string()));
        }

        let dir = self.root.join(scene_id);
        fs::create_dir_all(&dir).await?;

        let now = Utc::now();
        let stamp = now.format("%Y%m%d_%H%M%S").to_string();
        let base_id = format!("{scene_id}_{stamp}");

        let mut version = Version {
            version_id: base_id.clone(),
            scene_id: scene_id.to_string(),
            text: text.to_string(),
            constraints,
            emotional_params,
            timestamp: now,
            parent_version_id,
        };

        for n in 1..=MAX_ID_SUFFIX {
            if n > 1 {
                version.version_id = format!("{base_id}_{n}");
            }
            let path = dir.join(format!("{}.json", version.version_id));
            let content = serde_json::to_string_pretty(&version)?;

            if write_new(&path, content.as_bytes()).await? {
                tracing::info!(%scene_id, version_id = %version.version_id, "saved version");
                return Ok(version.version_id);
            }
        }

        Err(VersionError::IdExhausted {
            scene_id: scene_id.to_string(),
            stamp,
        })
    }

    /// Load one version. Unknown ids are `Ok(None)`.
    pub async fn load_version(
        &self,
        scene_id: &str,
        version_id: &str,
    ) -> Result<Option<Version>, VersionError> {
        if !is_safe_component(scene_id) || !is_safe_component(version_id) {
            return Ok(None);
        }
        let path = self.version_path(scene_id, version_id);
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_str(&content)?))
    }

    /// All versions of a scene, newest first. Unreadable records are skipped.
    pub async fn list_versions(&self, scene_id: &str) -> Result<Vec<VersionSummary>, VersionError> {
        if !is_safe_component(scene_id) {
            return Ok(Vec::new());
        }
        let dir = self.root.join(scene_id);
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut versions = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !path.extension().map(|e| e == "json").unwrap_or(false) {
                continue;
            }
            let parsed = match fs::read_to_string(&path).await {
                Ok(content) => serde_json::from_str::<VersionSummary>(&content)
                    .map_err(|e| e.to_string()),
                Err(e) => Err(e.to_string()),
            };
            match parsed {
                Ok(summary) => versions.push(summary),
                Err(error) => {
                    tracing::warn!(path = %path.display(), %error, "skipping unreadable version");
                }
            }
        }

        versions.sort_by(|a, b| {
            b.timestamp
                .cmp(&a.timestamp)
                .then_with(|| {
                    natural_id_key(&b.version_id).cmp(&natural_id_key(&a.version_id))
                })
        });
        Ok(versions)
    }

    /// The newest version of a scene, if any.
    pub async fn latest_version(&self, scene_id: &str) -> Result<Option<Version>, VersionError> {
        for summary in self.list_versions(scene_id).await? {
            match self.load_version(scene_id, &summary.version_id).await {
                Ok(Some(version)) => return Ok(Some(version)),
                Ok(None) => {}
                Err(VersionError::Json(error)) => {
                    tracing::warn!(
                        %scene_id,
                        version_id = %summary.version_id,
                        %error,
                        "skipping unreadable version"
                    );
                }
                Err(e) => return Err(e),
            }
        }
        Ok(None)
    }

    fn version_path(&self, scene_id: &str, version_id: &str) -> PathBuf {
        self.root.join(scene_id).join(format!("{version_id}.json"))
    }
}

/// Write `content` to a file that must not exist yet.
///
/// Returns `Ok(false)` when the path is taken. A failed write removes the
/// partial file.
async fn write_new(path: &Path, content: &[u8]) -> std::io::Result<bool> {
    let mut file = match fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await
    {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => return Ok(false),
        Err(e) => return Err(e),
    };

    let written = async {
        file.write_all(content).await?;
        file.flush().await
    }
    .await;

    if let Err(e) = written {
        drop(file);
        let _ = fs::remove_file(path).await;
        return Err(e);
    }
    Ok(true)
}

/// Ids become path components; refuse anything that could escape the root.
fn is_safe_component(id: &str) -> bool {
    !id.is_empty()
        && id != "."
        && id != ".."
        && !id.contains(['/', '\\'])
        && !id.contains('\0')
}

/// Sort key that orders `x_2` before `x_10`.
fn natural_id_key(version_id: &str) -> (&str, u32) {
    match version_id.rsplit_once('_') {
        Some((base, suffix)) if suffix.len() < 6 => match suffix.parse() {
            Ok(n) => (base, n),
            Err(_) => (version_id, 1),
        },
        _ => (version_id, 1),
    }
}
