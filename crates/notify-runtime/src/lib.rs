//! Ties the pipeline together: load a playbook, read and map its workbook,
//! normalize rows, evaluate rules, and dispatch actions.
//!
//! `WorkflowRunner` exclusively owns its loaded `Playbook`; the `Dispatcher`
//! it builds borrows the adapter registry and the audit repository handed in
//! by the caller, per the ownership split in the design note. It does
//! **not**: parse playbook YAML, read xlsx, resolve columns, coerce cells,
//! evaluate rule expressions, or deliver to a channel adapter — every one of
//! those is delegated to its own crate.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use notify_actions::QuietHours;
use notify_adapters::AdapterRegistry;
use notify_audit::AuditRepository;
use notify_dispatch::{Clock, Dispatcher, EvaluatedRow, OutboxQueue, Summary};
use notify_io::SheetSelector;
use notify_playbook::{load_playbook, Playbook, PlaybookError};

#[derive(Debug)]
pub enum RunError {
    Playbook(PlaybookError),
    Input(notify_io::InputError),
    Mapping(notify_mapping::MissingColumns),
    Rules(notify_rules::RuleEvaluationError),
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunError::Playbook(e) => write!(f, "{e}"),
            RunError::Input(e) => write!(f, "{e}"),
            RunError::Mapping(e) => write!(f, "{e}"),
            RunError::Rules(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for RunError {}

impl From<PlaybookError> for RunError {
    fn from(e: PlaybookError) -> Self {
        RunError::Playbook(e)
    }
}
impl From<notify_io::InputError> for RunError {
    fn from(e: notify_io::InputError) -> Self {
        RunError::Input(e)
    }
}
impl From<notify_mapping::MissingColumns> for RunError {
    fn from(e: notify_mapping::MissingColumns) -> Self {
        RunError::Mapping(e)
    }
}
impl From<notify_rules::RuleEvaluationError> for RunError {
    fn from(e: notify_rules::RuleEvaluationError) -> Self {
        RunError::Rules(e)
    }
}

/// Mirrors the original runner's return payload: enough to report a run
/// without re-deriving totals from the summary at every call site.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub playbook: String,
    pub dry_run: bool,
    pub total_rows: usize,
    pub matched_actions: u64,
    pub enqueued_actions: u64,
    pub summary: Summary,
}

/// Loads playbooks from a fixed directory relative to a repository root and
/// runs them end to end. Owns nothing across calls; every `run()` is
/// independent and re-reads its playbook and workbook from disk.
pub struct WorkflowRunner {
    playbooks_dir: PathBuf,
    repository_root: PathBuf,
}

impl WorkflowRunner {
    pub fn new(playbooks_dir: impl Into<PathBuf>, repository_root: impl Into<PathBuf>) -> Self {
        Self {
            playbooks_dir: playbooks_dir.into(),
            repository_root: repository_root.into(),
        }
    }

    /// Loads `identifier`'s playbook without evaluating it, for callers that
    /// only need its quiet-hours window or action list (e.g. the daemon
    /// deciding which `Dispatcher` to build).
    pub fn load(&self, identifier: &str) -> Result<Playbook, RunError> {
        Ok(load_playbook(&self.playbooks_dir, &self.repository_root, identifier)?)
    }

    /// Reads the playbook's workbook, resolves columns, normalizes every
    /// row, and evaluates the ruleset against each — the pure, side-effect
    /// free half of a run.
    pub fn evaluate(&self, playbook: &Playbook) -> Result<Vec<EvaluatedRow>, RunError> {
        let tabular = notify_io::read_workbook(&playbook.source_path, &SheetSelector::Index(0))?;

        let mapping_src = std::fs::read_to_string(&playbook.mapping_path).map_err(|e| {
            RunError::Playbook(PlaybookError::Invalid(format!(
                "read {}: {e}",
                playbook.mapping_path.display()
            )))
        })?;
        let mapping_doc = notify_mapping::MappingDocument::from_yaml(&mapping_src).map_err(|e| {
            RunError::Playbook(PlaybookError::Invalid(format!(
                "parse {}: {e}",
                playbook.mapping_path.display()
            )))
        })?;
        let header_set: BTreeSet<String> = tabular.headers.iter().cloned().collect();
        let resolved = notify_mapping::resolve(&mapping_doc, &header_set)?;

        let workbook_stem = playbook
            .source_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let workbook_label = workbook_stem.clone();

        let mapped_rows: Vec<_> = tabular
            .rows
            .iter()
            .map(|raw| notify_mapping::project_row(raw, &resolved, &workbook_stem, &workbook_label))
            .collect();

        let today = Utc::now().date_naive();
        let defaults = notify_normalize::derive_workbook_defaults(&mapped_rows, today, 6);

        let ruleset = notify_rules::RuleSet::from_yaml(&std::fs::read_to_string(&playbook.ruleset_path).map_err(
            |e| RunError::Playbook(PlaybookError::Invalid(format!("read {}: {e}", playbook.ruleset_path.display()))),
        )?)?;

        let mut evaluated = Vec::new();
        for mapped in &mapped_rows {
            let Some(row) = notify_normalize::normalize_row(mapped, &defaults, today) else {
                continue;
            };
            let ctx = notify_schemas::Context::new(row.clone(), Default::default());
            let rule_results = ruleset.evaluate(&ctx, today)?;
            evaluated.push(EvaluatedRow { row, rule_results });
        }

        Ok(evaluated)
    }

    /// Runs `identifier` end to end: load, evaluate, dispatch. The caller
    /// supplies the adapter registry, audit repository, optional queue and
    /// clock — the runner owns only the `Playbook` it loads. `adapter_timeout`
    /// overrides the per-adapter delivery deadline; `None` keeps the
    /// dispatcher's own default (10s).
    #[allow(clippy::too_many_arguments)]
    pub fn run(
        &self,
        identifier: &str,
        dry_run: bool,
        registry: &AdapterRegistry,
        audit: &dyn AuditRepository,
        queue: Option<&dyn OutboxQueue>,
        clock: Option<Clock>,
        adapter_timeout: Option<Duration>,
    ) -> Result<RunReport, RunError> {
        let playbook = self.load(identifier)?;
        let evaluated_rows = self.evaluate(&playbook)?;

        let mut dispatcher = Dispatcher::new(registry, audit).with_quiet_hours(playbook.quiet_hours.clone());
        if let Some(q) = queue {
            dispatcher = dispatcher.with_queue(q);
        }
        if let Some(c) = clock {
            dispatcher = dispatcher.with_clock(c);
        }
        if let Some(t) = adapter_timeout {
            dispatcher = dispatcher.with_adapter_timeout(t);
        }

        let summary = dispatcher.dispatch(&evaluated_rows, &playbook.actions, dry_run, Some(&playbook.name));

        let matched_actions = summary.values().map(|s| s.matches).sum();
        let enqueued_actions = summary.values().map(|s| s.enqueued).sum();

        Ok(RunReport {
            playbook: playbook.name,
            dry_run,
            total_rows: evaluated_rows.len(),
            matched_actions,
            enqueued_actions,
            summary,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify_adapters::{AdapterError, ChannelAdapter};
    use notify_audit::InMemoryAuditRepository;
    use serde_json::json;
    use std::fs;
    use tempfile::tempdir;

    struct StubAdapter;
    impl ChannelAdapter for StubAdapter {
        fn send(&self, _payload: &serde_json::Value) -> Result<serde_json::Value, AdapterError> {
            Ok(json!({"status": "sent"}))
        }
    }

    fn write(path: &Path, content: &str) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    #[test]
    fn load_resolves_a_playbook_without_evaluating_it() {
        let root = tempdir().unwrap();
        let playbooks_dir = root.path().join("workflows/playbooks");
        write(
            &playbooks_dir.join("compliance.yaml"),
            "name: Compliance\n\
             source:\n  kind: xlsx\n  path: assets/roster.xlsx\n\
             mapping: assets/mapping.yaml\n\
             ruleset: assets/rules.yaml\n\
             actions: []\n",
        );
        write(&playbooks_dir.join("assets/mapping.yaml"), "columns:\n  email: Email\n");
        write(&playbooks_dir.join("assets/rules.yaml"), "rules: []\n");
        write(&playbooks_dir.join("assets/roster.xlsx"), "");

        let runner = WorkflowRunner::new(&playbooks_dir, root.path());
        let playbook = runner.load("compliance").unwrap();
        assert_eq!(playbook.name, "Compliance");
    }

    #[test]
    fn missing_playbook_surfaces_as_run_error() {
        let root = tempdir().unwrap();
        let runner = WorkflowRunner::new(root.path(), root.path());
        let registry = AdapterRegistry::new();
        let audit = InMemoryAuditRepository::new();
        let err = runner.run("ghost", true, &registry, &audit, None, None, None).unwrap_err();
        assert!(matches!(err, RunError::Playbook(PlaybookError::NotFound(_))));
    }

    #[test]
    fn run_with_empty_workbook_yields_zero_rows() {
        // calamine cannot open a stub text file as xlsx; this exercises the
        // I/O error path, confirming it surfaces as RunError::Input rather
        // than panicking.
        let root = tempdir().unwrap();
        let playbooks_dir = root.path().join("workflows/playbooks");
        write(
            &playbooks_dir.join("compliance.yaml"),
            "name: Compliance\n\
             source:\n  kind: xlsx\n  path: assets/roster.xlsx\n\
             mapping: assets/mapping.yaml\n\
             ruleset: assets/rules.yaml\n\
             actions: []\n",
        );
        write(&playbooks_dir.join("assets/mapping.yaml"), "columns:\n  email: Email\n");
        write(&playbooks_dir.join("assets/rules.yaml"), "rules: []\n");
        write(&playbooks_dir.join("assets/roster.xlsx"), "not a real workbook");

        let runner = WorkflowRunner::new(&playbooks_dir, root.path());
        let registry = AdapterRegistry::new();
        let audit = InMemoryAuditRepository::new();
        let err = runner.run("compliance", true, &registry, &audit, None, None, None).unwrap_err();
        assert!(matches!(err, RunError::Input(_)));
        let _ = StubAdapter;
    }
}
