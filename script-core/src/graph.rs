//! Scene graph checks and traversal.
//!
//! The graph is implicit in each scene's transition list. Nothing here
//! gates generation; it feeds navigation in the CLI and HTTP surfaces.

use crate::scene::Scene;
use crate::store::SceneSet;
use serde::{Serialize, Serializer};
use std::fmt;

/// A transition whose target is not in the loaded collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DanglingTransition {
    pub source: String,
    pub target: String,
}

impl fmt::Display for DanglingTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} → {}: target scene not found", self.source, self.target)
    }
}

/// One element of a traversal path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathStep {
    /// A scene visited for the first time on this path.
    Scene(String),
    /// A transition back to a scene already on the path. Always last.
    Loop(String),
}

impl PathStep {
    pub fn scene_id(&self) -> &str {
        match self {
            PathStep::Scene(id) | PathStep::Loop(id) => id,
        }
    }

    pub fn is_loop(&self) -> bool {
        matches!(self, PathStep::Loop(_))
    }
}

impl fmt::Display for PathStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathStep::Scene(id) => write!(f, "{id}"),
            PathStep::Loop(id) => write!(f, "{id} (loop)"),
        }
    }
}

impl Serialize for PathStep {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A path through the graph from the traversal start.
pub type ScenePath = Vec<PathStep>;

/// Report every transition that points at a scene not in `scenes`.
///
/// Targetless transitions are not reported.
pub fn validate_transitions(scenes: &SceneSet) -> Vec<DanglingTransition> {
    let mut errors = Vec::new();
    for scene in scenes.iter() {
        for transition in &scene.transitions {
            let Some(target) = transition.target.as_deref() else {
                continue;
            };
            if !target.is_empty() && !scenes.contains(target) {
                errors.push(DanglingTransition {
                    source: scene.scene_id.clone(),
                    target: target.to_string(),
                });
            }
        }
    }
    errors
}

/// Outgoing `(target, transition type)` pairs in declaration order.
pub fn next_scenes(scene: &Scene) -> Vec<(&str, &str)> {
    scene
        .transitions
        .iter()
        .filter_map(|t| match t.target.as_deref() {
            Some(target) if !target.is_empty() => Some((target, t.kind.as_str())),
            _ => None,
        })
        .collect()
}

/// Enumerate every path from `start_id`, depth first.
///
/// A branch ends at a dead end, or with a [`PathStep::Loop`] marker when it
/// would revisit a scene already on the path. Branches into scenes that are
/// not loaded contribute nothing.
pub fn traverse(scenes: &SceneSet, start_id: &str) -> Vec<ScenePath> {
    let mut paths = Vec::new();
    let mut path = vec![start_id.to_string()];
    walk(scenes, start_id, &mut path, &mut paths);
    paths
}

fn walk(scenes: &SceneSet, scene_id: &str, path: &mut Vec<String>, out: &mut Vec<ScenePath>) {
    let Some(scene) = scenes.get(scene_id) else {
        return;
    };

    let next = next_scenes(scene);
    if next.is_empty() {
        out.push(to_steps(path, None));
        return;
    }

    for (target, _) in next {
        if path.iter().any(|visited| visited == target) {
            out.push(to_steps(path, Some(target)));
        } else {
            path.push(target.to_string());
            walk(scenes, target, path, out);
            path.pop();
        }
    }
}

fn to_steps(path: &[String], loop_target: Option<&str>) -> ScenePath {
    let mut steps: ScenePath = path.iter().cloned().map(PathStep::Scene).collect();
    if let Some(target) = loop_target {
        steps.push(PathStep::Loop(target.to_string()));
    }
    steps
}
