//! Resolves logical fields (`email`, `course_name`, `progress_hours`, ...) to
//! source spreadsheet columns, with per-field fallback candidates and
//! template defaults.
//!
//! It does **not**: read the workbook itself or coerce cell values — that is
//! `notify-io` and `notify-normalize`'s job respectively.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use notify_schemas::{RawCell, RawRow};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SheetRef {
    Name(String),
    Index(usize),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum ColumnSpecRaw {
    Shorthand(String),
    Full(FullColumnSpec),
}

#[derive(Debug, Clone, Deserialize)]
struct FullColumnSpec {
    sources: Vec<String>,
    #[serde(default)]
    required: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MappingDocument {
    #[serde(default)]
    pub sheet_name: Option<SheetRef>,
    pub columns: BTreeMap<String, ColumnSpecRaw>,
    #[serde(default)]
    pub defaults: BTreeMap<String, String>,
}

impl MappingDocument {
    pub fn from_yaml(src: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(src)
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedField {
    pub source_column: Option<String>,
    pub default: Option<String>,
}

pub type ResolvedMapping = BTreeMap<String, ResolvedField>;

#[derive(Debug, Clone)]
pub struct MissingColumns {
    pub fields: Vec<String>,
}

impl fmt::Display for MissingColumns {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "missing required columns: {}", self.fields.join(", "))
    }
}

impl std::error::Error for MissingColumns {}

/// Every `required` field must have at least one candidate source present in
/// `header_set`; the first present candidate (in declared order) wins.
pub fn resolve(
    doc: &MappingDocument,
    header_set: &BTreeSet<String>,
) -> Result<ResolvedMapping, MissingColumns> {
    let mut out = ResolvedMapping::new();
    let mut missing = Vec::new();

    for (field, spec) in &doc.columns {
        let (sources, required) = match spec {
            ColumnSpecRaw::Shorthand(col) => (vec![col.clone()], true),
            ColumnSpecRaw::Full(full) => (full.sources.clone(), full.required),
        };
        let found = sources.iter().find(|s| header_set.contains(s.as_str())).cloned();
        if found.is_none() && required {
            missing.push(field.clone());
        }
        out.insert(
            field.clone(),
            ResolvedField {
                source_column: found,
                default: doc.defaults.get(field).cloned(),
            },
        );
    }

    if missing.is_empty() {
        Ok(out)
    } else {
        Err(MissingColumns { fields: missing })
    }
}

/// Projects a raw sheet row onto logical fields using a resolved mapping,
/// falling back to the field's template default (with `{workbook_stem}` /
/// `{workbook_label}` substitution) when the source column is absent or blank.
pub fn project_row(
    raw: &RawRow,
    resolved: &ResolvedMapping,
    workbook_stem: &str,
    workbook_label: &str,
) -> BTreeMap<String, RawCell> {
    let mut out = BTreeMap::new();
    for (field, rf) in resolved {
        let value = rf
            .source_column
            .as_ref()
            .and_then(|col| raw.get(col))
            .filter(|cell| !cell.is_empty())
            .cloned();
        let value = value.unwrap_or_else(|| match &rf.default {
            Some(template) => RawCell::Str(render_default(template, workbook_stem, workbook_label)),
            None => RawCell::Empty,
        });
        out.insert(field.clone(), value);
    }
    out
}

fn render_default(template: &str, workbook_stem: &str, workbook_label: &str) -> String {
    template
        .replace("{workbook_stem}", workbook_stem)
        .replace("{workbook_label}", workbook_label)
}
