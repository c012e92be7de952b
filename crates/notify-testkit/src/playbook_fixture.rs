use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tempfile::TempDir;

/// A fully wired playbook tree under a temp directory: a repository root
/// holding `workflows/playbooks/<name>.yaml` plus its mapping, ruleset, and
/// (stub) workbook asset. Grounded on `notify-playbook`'s own test fixtures,
/// factored out here so `notify-runtime`/`notify-daemon`/`notify-cli`
/// integration tests don't each hand-roll the same tree.
///
/// `source.path` points at a file that exists but isn't a real workbook —
/// the same stand-in every other crate's tests use, since exercising actual
/// xlsx parsing is out of scope for unit tests (`calamine`'s behavior is
/// assumed correct).
pub struct PlaybookFixture {
    _root: TempDir,
    pub root_path: PathBuf,
    pub playbooks_dir: PathBuf,
    pub name: String,
}

impl PlaybookFixture {
    /// Writes a playbook named `name` whose ruleset and actions are `rules`
    /// and `actions` (already-rendered YAML bodies, e.g. the `rules:` list
    /// and `actions:` list respectively), and whose mapping requires the
    /// given column names.
    pub fn build(name: &str, required_columns: &[&str], rules_yaml: &str, actions_yaml: &str) -> Result<Self> {
        let root = TempDir::new().context("create fixture tempdir")?;
        let root_path = root.path().to_path_buf();
        let playbooks_dir = root_path.join("workflows/playbooks");
        let assets_dir = playbooks_dir.join("assets");
        fs::create_dir_all(&assets_dir).context("create assets dir")?;

        let mut columns = String::new();
        for col in required_columns {
            columns.push_str(&format!("  {col}: {col}\n"));
        }

        fs::write(
            assets_dir.join("mapping.yaml"),
            format!("columns:\n{columns}"),
        )
        .context("write mapping.yaml")?;
        fs::write(assets_dir.join("rules.yaml"), format!("rules:\n{rules_yaml}")).context("write rules.yaml")?;
        fs::write(assets_dir.join("roster.xlsx"), "not a real workbook").context("write roster.xlsx")?;

        fs::write(
            playbooks_dir.join(format!("{name}.yaml")),
            format!(
                "name: {name}\n\
                 source:\n  kind: xlsx\n  path: assets/roster.xlsx\n\
                 mapping: assets/mapping.yaml\n\
                 ruleset: assets/rules.yaml\n\
                 actions:\n{actions_yaml}"
            ),
        )
        .context("write playbook yaml")?;

        Ok(Self { _root: root, root_path, playbooks_dir, name: name.to_string() })
    }

    pub fn playbook_path(&self) -> PathBuf {
        self.playbooks_dir.join(format!("{}.yaml", self.name))
    }

    pub fn assets_dir(&self) -> PathBuf {
        self.playbooks_dir.join("assets")
    }
}

/// Writes `<name>.txt` (and, if `html` is `Some`, `<name>.html`) into a fresh
/// temp directory, for `EmailAdapter` tests that need real template files on
/// disk.
pub fn email_templates_dir(name: &str, text: &str, html: Option<&str>) -> Result<(TempDir, PathBuf)> {
    let dir = TempDir::new().context("create templates tempdir")?;
    let path = dir.path().to_path_buf();
    fs::write(path.join(format!("{name}.txt")), text).context("write text template")?;
    if let Some(html) = html {
        fs::write(path.join(format!("{name}.html")), html).context("write html template")?;
    }
    Ok((dir, path))
}

pub fn assert_exists(path: &Path) {
    assert!(path.exists(), "expected {} to exist", path.display());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_a_loadable_playbook_tree() {
        let fixture = PlaybookFixture::build(
            "compliance",
            &["Email"],
            "  - id: debe_notificar\n    when: \"row.Email != ''\"\n",
            "  - type: notify\n    channel: whatsapp\n    to: \"{{ row.Email }}\"\n",
        )
        .unwrap();

        assert_exists(&fixture.playbook_path());
        assert_exists(&fixture.assets_dir().join("mapping.yaml"));
        assert_exists(&fixture.assets_dir().join("rules.yaml"));

        let playbook = notify_playbook::load_playbook(&fixture.playbooks_dir, &fixture.root_path, "compliance")
            .unwrap();
        assert_eq!(playbook.name, "compliance");
        assert_eq!(playbook.actions.len(), 1);
    }
}
