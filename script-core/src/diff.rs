//! Comparing two versions: line hunks, emotional shifts, constraint changes.
//!
//! Hunks and changed-line sets work on normalised text: each line trimmed,
//! blank lines dropped. The unified diff works on raw lines.

use crate::controls::ParamMap;
use crate::dialogue::non_blank_lines;
use crate::versions::Version;
use serde::{Deserialize, Serialize};
use similar::{capture_diff_slices, Algorithm, DiffTag, TextDiff};
use std::collections::{BTreeMap, BTreeSet};

/// Context lines around each unified-diff hunk.
const UNIFIED_CONTEXT: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HunkKind {
    Added,
    Removed,
    Unchanged,
}

/// A run of lines sharing one kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffHunk {
    #[serde(rename = "type")]
    pub kind: HunkKind,
    pub lines: Vec<String>,
}

impl DiffHunk {
    fn new(kind: HunkKind, lines: &[&str]) -> Self {
        Self {
            kind,
            lines: lines.iter().map(|l| l.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    Same,
}

/// Movement of one emotional parameter between versions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamShift {
    pub param: String,
    pub old: f64,
    pub new: f64,
    pub direction: Direction,
}

/// A constraint whose value differs. Missing on one side is `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintChange {
    pub old: Option<serde_json::Value>,
    pub new: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataDiff {
    pub emotional_shift: Vec<ParamShift>,
    pub constraint_changes: BTreeMap<String, ConstraintChange>,
}

/// Text and metadata comparison of two versions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionDiff {
    pub text_diff: Vec<DiffHunk>,
    pub metadata_diff: MetadataDiff,
}

/// Trimmed, non-blank lines of `text`.
pub fn normalize_lines(text: &str) -> Vec<&str> {
    non_blank_lines(text).collect()
}

/// Line hunks turning `old` into `new`.
///
/// A replaced run becomes a `removed` hunk followed by an `added` one.
pub fn text_diff(old: &str, new: &str) -> Vec<DiffHunk> {
    let old_lines = normalize_lines(old);
    let new_lines = normalize_lines(new);

    let mut hunks = Vec::new();
    let mut push = |kind, lines: &[&str]| {
        if !lines.is_empty() {
            hunks.push(DiffHunk::new(kind, lines));
        }
    };
    for op in capture_diff_slices(Algorithm::Lcs, &old_lines, &new_lines) {
        let (tag, old_range, new_range) = op.as_tag_tuple();
        match tag {
            DiffTag::Equal => push(HunkKind::Unchanged, &old_lines[old_range]),
            DiffTag::Delete => push(HunkKind::Removed, &old_lines[old_range]),
            DiffTag::Insert => push(HunkKind::Added, &new_lines[new_range]),
            DiffTag::Replace => {
                push(HunkKind::Removed, &old_lines[old_range]);
                push(HunkKind::Added, &new_lines[new_range]);
            }
        }
    }
    hunks
}

/// `(removed, added)`: sorted lines present on only one side.
pub fn changed_lines(old: &str, new: &str) -> (Vec<String>, Vec<String>) {
    let old_set: BTreeSet<&str> = normalize_lines(old).into_iter().collect();
    let new_set: BTreeSet<&str> = normalize_lines(new).into_iter().collect();
    let removed = old_set.difference(&new_set).map(|s| s.to_string()).collect();
    let added = new_set.difference(&old_set).map(|s| s.to_string()).collect();
    (removed, added)
}

/// One shift per parameter in either map, sorted by name. Missing means 0.
pub fn emotional_shift(old: &ParamMap, new: &ParamMap) -> Vec<ParamShift> {
    let keys: BTreeSet<&String> = old.keys().chain(new.keys()).collect();
    keys.into_iter()
        .map(|param| {
            let old_value = old.get(param).copied().unwrap_or(0.0);
            let new_value = new.get(param).copied().unwrap_or(0.0);
            let direction = if old_value < new_value {
                Direction::Up
            } else if old_value > new_value {
                Direction::Down
            } else {
                Direction::Same
            };
            ParamShift {
                param: param.clone(),
                old: old_value,
                new: new_value,
                direction,
            }
        })
        .collect()
}

/// Emotional shifts plus the constraints whose values changed.
pub fn metadata_diff(old: &Version, new: &Version) -> MetadataDiff {
    let mut constraint_changes = BTreeMap::new();
    let keys: BTreeSet<&String> = old
        .constraints
        .keys()
        .chain(new.constraints.keys())
        .collect();
    for key in keys {
        let before = old.constraints.get(key);
        let after = new.constraints.get(key);
        if before != after {
            constraint_changes.insert(
                key.clone(),
                ConstraintChange {
                    old: before.cloned(),
                    new: after.cloned(),
                },
            );
        }
    }

    MetadataDiff {
        emotional_shift: emotional_shift(&old.emotional_params, &new.emotional_params),
        constraint_changes,
    }
}

/// Unified diff of the raw text. Empty when nothing changed.
pub fn unified_diff_text(old: &str, new: &str, old_label: &str, new_label: &str) -> String {
    if old == new {
        return String::new();
    }
    TextDiff::from_lines(old, new)
        .unified_diff()
        .context_radius(UNIFIED_CONTEXT)
        .missing_newline_hint(false)
        .header(old_label, new_label)
        .to_string()
}

pub fn diff_versions(old: &Version, new: &Version) -> VersionDiff {
    VersionDiff {
        text_diff: text_diff(&old.text, &new.text),
        metadata_diff: metadata_diff(old, new),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn version(text: &str, tension: f64, max_lines: u32) -> Version {
        let mut params = ParamMap::new();
        params.insert("tension".into(), tension);
        let mut constraints = crate::versions::ConstraintMap::new();
        constraints.insert("max_lines".into(), serde_json::json!(max_lines));
        constraints.insert("no_exposition".into(), serde_json::json!(true));
        Version {
            version_id: format!("s_{tension}"),
            scene_id: "s".into(),
            text: text.into(),
            constraints,
            emotional_params: params,
            timestamp: Utc::now(),
            parent_version_id: None,
        }
    }

    fn rebuild(hunks: &[DiffHunk], skip: HunkKind) -> Vec<String> {
        hunks
            .iter()
            .filter(|h| h.kind != skip)
            .flat_map(|h| h.lines.iter().cloned())
            .collect()
    }

    #[test]
    fn test_text_diff_replace_is_removed_then_added() {
        let hunks = text_diff("A: one\nB: two\nA: three", "A: one\nB: deux\nA: three");
        assert_eq!(
            hunks,
            vec![
                DiffHunk::new(HunkKind::Unchanged, &["A: one"]),
                DiffHunk::new(HunkKind::Removed, &["B: two"]),
                DiffHunk::new(HunkKind::Added, &["B: deux"]),
                DiffHunk::new(HunkKind::Unchanged, &["A: three"]),
            ]
        );
    }

    #[test]
    fn test_text_diff_reconstructs_both_sides() {
        let old = "  A: one\n\nB: two\nC: three\nD: four\n";
        let new = "A: one\nC: three\nE: five\nD: four\nF: six";
        let hunks = text_diff(old, new);
        assert_eq!(rebuild(&hunks, HunkKind::Removed), normalize_lines(new));
        assert_eq!(rebuild(&hunks, HunkKind::Added), normalize_lines(old));
    }

    #[test]
    fn test_identical_text_is_unchanged() {
        let hunks = text_diff("A: x\nB: y", "A: x\n\n  B: y  ");
        assert_eq!(hunks, vec![DiffHunk::new(HunkKind::Unchanged, &["A: x", "B: y"])]);
        assert!(text_diff("", "").is_empty());
    }

    #[test]
    fn test_changed_lines_sorted() {
        let (removed, added) = changed_lines("b\na\nc", "c\nz\ny");
        assert_eq!(removed, vec!["a", "b"]);
        assert_eq!(added, vec!["y", "z"]);
    }

    #[test]
    fn test_emotional_shift_union_with_zero_default() {
        let mut old = ParamMap::new();
        old.insert("tension".into(), 0.2);
        old.insert("silence_density".into(), 0.3);
        let mut new = ParamMap::new();
        new.insert("tension".into(), 0.8);
        new.insert("emotional_distance".into(), 0.4);
        new.insert("silence_density".into(), 0.3);

        let shifts = emotional_shift(&old, &new);
        let summary: Vec<_> = shifts.iter().map(|s| (s.param.as_str(), s.direction)).collect();
        assert_eq!(
            summary,
            vec![
                ("emotional_distance", Direction::Up),
                ("silence_density", Direction::Same),
                ("tension", Direction::Up),
            ]
        );
        assert_eq!(shifts[0].old, 0.0);
    }

    #[test]
    fn test_metadata_diff_only_changed_constraints() {
        let old = version("A: x", 0.8, 6);
        let mut new = version("A: y", 0.2, 4);
        new.constraints.remove("no_exposition");

        let diff = metadata_diff(&old, &new);
        assert_eq!(diff.emotional_shift[0].direction, Direction::Down);
        assert_eq!(diff.constraint_changes.len(), 2);
        assert_eq!(
            diff.constraint_changes["max_lines"],
            ConstraintChange {
                old: Some(serde_json::json!(6)),
                new: Some(serde_json::json!(4)),
            }
        );
        assert_eq!(diff.constraint_changes["no_exposition"].new, None);

        let json = serde_json::to_value(&diff).unwrap();
        assert_eq!(json["constraint_changes"]["no_exposition"]["new"], serde_json::Value::Null);
        assert_eq!(json["emotional_shift"][0]["direction"], "down");
    }

    #[test]
    fn test_unified_diff() {
        assert_eq!(unified_diff_text("A: x\n", "A: x\n", "old", "new"), "");

        let out = unified_diff_text("A: x\nB: y\n", "A: x\nB: z\n", "v1", "v2");
        assert!(out.starts_with("--- v1\n+++ v2\n"));
        assert!(out.contains("-B: y\n"));
        assert!(out.contains("+B: z\n"));
        assert!(out.contains(" A: x\n"));
    }

    #[test]
    fn test_hunk_serializes_with_type_tag() {
        let json = serde_json::to_value(DiffHunk::new(HunkKind::Added, &["x"])).unwrap();
        assert_eq!(json, serde_json::json!({"type": "added", "lines": ["x"]}));
    }
}
