//! Parses playbook descriptors and resolves the assets they reference.
//!
//! It does **not**: read the workbook, evaluate rules, or dispatch actions —
//! it only materializes a `Playbook` record that the other components
//! consume. Path references resolve first relative to the playbook file's
//! own directory, then to a repository root.

use std::fmt;
use std::path::{Path, PathBuf};

use notify_actions::QuietHours;
use notify_schemas::Action;
use serde::Deserialize;

#[derive(Debug, Clone)]
pub enum PlaybookError {
    /// The named playbook identifier has no matching file under the
    /// playbooks directory.
    NotFound(String),
    /// The playbook document is malformed, or a mandatory path is missing.
    Invalid(String),
}

impl fmt::Display for PlaybookError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybookError::NotFound(id) => write!(f, "playbook not found: {id}"),
            PlaybookError::Invalid(msg) => write!(f, "invalid playbook: {msg}"),
        }
    }
}

impl std::error::Error for PlaybookError {}

#[derive(Debug, Clone, Deserialize)]
struct SourceDoc {
    #[serde(default)]
    #[allow(dead_code)]
    kind: Option<String>,
    path: String,
}

#[derive(Debug, Clone, Deserialize)]
struct QuietHoursDoc {
    start: String,
    end: String,
}

#[derive(Debug, Clone, Deserialize)]
struct PlaybookDoc {
    #[serde(default)]
    name: Option<String>,
    source: SourceDoc,
    mapping: String,
    ruleset: String,
    #[serde(default)]
    quiet_hours: Option<QuietHoursDoc>,
    #[serde(default)]
    actions: Vec<Action>,
}

/// An immutable, loaded playbook: the union of a data source, a column
/// mapping, a rule set, a list of actions, and an optional quiet window.
#[derive(Debug, Clone)]
pub struct Playbook {
    pub name: String,
    pub source_path: PathBuf,
    pub mapping_path: PathBuf,
    pub ruleset_path: PathBuf,
    pub actions: Vec<Action>,
    pub quiet_hours: Option<QuietHours>,
}

/// Loads `{playbooks_dir}/{identifier}.yaml` (identifier may already carry
/// the `.yaml` suffix), resolving `source.path`/`mapping`/`ruleset` against
/// the playbook's own directory first, then `repository_root`.
pub fn load_playbook(
    playbooks_dir: &Path,
    repository_root: &Path,
    identifier: &str,
) -> Result<Playbook, PlaybookError> {
    let playbook_path = resolve_playbook_path(playbooks_dir, identifier)?;

    let raw = std::fs::read_to_string(&playbook_path).map_err(|e| {
        PlaybookError::Invalid(format!("read {}: {e}", playbook_path.display()))
    })?;
    let doc: PlaybookDoc = serde_yaml::from_str(&raw)
        .map_err(|e| PlaybookError::Invalid(format!("parse {}: {e}", playbook_path.display())))?;

    let name = doc.name.clone().unwrap_or_else(|| {
        playbook_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| identifier.to_string())
    });

    let source_path =
        resolve_related_path(&playbook_path, repository_root, Some(&doc.source.path))?;
    let mapping_path = resolve_related_path(&playbook_path, repository_root, Some(&doc.mapping))?;
    let ruleset_path = resolve_related_path(&playbook_path, repository_root, Some(&doc.ruleset))?;
    let quiet_hours = parse_quiet_hours(doc.quiet_hours.as_ref())?;

    Ok(Playbook {
        name,
        source_path,
        mapping_path,
        ruleset_path,
        actions: doc.actions,
        quiet_hours,
    })
}

fn resolve_playbook_path(playbooks_dir: &Path, identifier: &str) -> Result<PathBuf, PlaybookError> {
    let filename = if identifier.ends_with(".yaml") || identifier.ends_with(".yml") {
        identifier.to_string()
    } else {
        format!("{identifier}.yaml")
    };
    let candidate = playbooks_dir.join(filename);
    if candidate.exists() {
        Ok(candidate)
    } else {
        Err(PlaybookError::NotFound(identifier.to_string()))
    }
}

/// Local directory first, then repository root; a missing mandatory path is
/// a `PlaybookError`, not a `PlaybookNotFound`.
fn resolve_related_path(
    playbook_path: &Path,
    repository_root: &Path,
    value: Option<&str>,
) -> Result<PathBuf, PlaybookError> {
    let value = value.ok_or_else(|| {
        PlaybookError::Invalid(format!(
            "playbook '{}' is missing a required path",
            playbook_path.display()
        ))
    })?;

    let candidate = PathBuf::from(value);
    if candidate.is_absolute() {
        return Ok(candidate);
    }

    let local = playbook_path
        .parent()
        .map(|dir| dir.join(&candidate))
        .unwrap_or_else(|| candidate.clone());
    if local.exists() {
        return Ok(local);
    }

    let root_candidate = repository_root.join(&candidate);
    if root_candidate.exists() {
        return Ok(root_candidate);
    }

    Ok(local)
}

fn parse_quiet_hours(doc: Option<&QuietHoursDoc>) -> Result<Option<QuietHours>, PlaybookError> {
    let Some(doc) = doc else { return Ok(None) };
    let start = chrono::NaiveTime::parse_from_str(&doc.start, "%H:%M")
        .map_err(|e| PlaybookError::Invalid(format!("invalid quiet_hours.start: {e}")))?;
    let end = chrono::NaiveTime::parse_from_str(&doc.end, "%H:%M")
        .map_err(|e| PlaybookError::Invalid(format!("invalid quiet_hours.end: {e}")))?;
    Ok(Some(QuietHours::new(start, end)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn write(path: &Path, content: &str) {
        fs::write(path, content).unwrap();
    }

    #[test]
    fn resolves_related_paths_against_playbook_dir_then_root() {
        let root = tempdir().unwrap();
        let playbooks_dir = root.path().join("workflows/playbooks");
        fs::create_dir_all(&playbooks_dir).unwrap();
        let assets_dir = root.path().join("workflows/playbooks/assets");
        fs::create_dir_all(&assets_dir).unwrap();
        write(&assets_dir.join("mapping.yaml"), "columns: {}\n");
        write(&assets_dir.join("rules.yaml"), "rules: []\n");
        write(&assets_dir.join("roster.xlsx"), "");

        write(
            &playbooks_dir.join("compliance.yaml"),
            "name: Compliance\n\
             source:\n  kind: xlsx\n  path: assets/roster.xlsx\n\
             mapping: assets/mapping.yaml\n\
             ruleset: assets/rules.yaml\n\
             actions: []\n",
        );

        let pb = load_playbook(&playbooks_dir, root.path(), "compliance").unwrap();
        assert_eq!(pb.name, "Compliance");
        assert_eq!(pb.source_path, assets_dir.join("roster.xlsx"));
        assert_eq!(pb.mapping_path, assets_dir.join("mapping.yaml"));
    }

    #[test]
    fn missing_playbook_is_not_found() {
        let root = tempdir().unwrap();
        let err = load_playbook(root.path(), root.path(), "ghost").unwrap_err();
        assert!(matches!(err, PlaybookError::NotFound(_)));
    }

    #[test]
    fn name_defaults_to_file_stem() {
        let root = tempdir().unwrap();
        fs::create_dir_all(root.path()).unwrap();
        write(&root.path().join("mapping.yaml"), "columns: {}\n");
        write(&root.path().join("rules.yaml"), "rules: []\n");
        write(&root.path().join("roster.xlsx"), "");
        write(
            &root.path().join("unnamed.yaml"),
            "source:\n  kind: xlsx\n  path: roster.xlsx\nmapping: mapping.yaml\nruleset: rules.yaml\nactions: []\n",
        );
        let pb = load_playbook(root.path(), root.path(), "unnamed").unwrap();
        assert_eq!(pb.name, "unnamed");
    }
}
