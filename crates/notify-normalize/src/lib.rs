//! Coerces raw mapped cells into the typed row context consumed by the rule
//! engine, and derives workbook-wide defaults (hours required, deadlines)
//! used when a row omits them.
//!
//! It does **not**: select columns (that's `notify-mapping`) or evaluate
//! rules — coercions here are deterministic and total: a field that fails to
//! parse renders as `null`, it never aborts the row.

mod parsers;

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use notify_schemas::{RawCell, Row, Value};

pub use parsers::{parse_date_flexible, parse_datetime_or_none, parse_duration_hours, parse_numeric};

const DAYS_UNTIL_DEADLINE_DEFAULT: i64 = 30;

#[derive(Debug, Clone, Copy)]
pub struct WorkbookDefaults {
    pub default_course_hours_required: i64,
    pub default_course_deadline_date: NaiveDate,
    pub default_certificate_expires_at: NaiveDate,
}

/// Computes the three workbook-wide defaults before any row is normalized:
/// `ceil(max(total_time_hours))`, and
/// `max(last_access|first_access) + 30 days` (or `today + 30 days` if the
/// sheet carries no access timestamps at all).
pub fn derive_workbook_defaults(
    mapped_rows: &[BTreeMap<String, RawCell>],
    today: NaiveDate,
    configured_default_hours: i64,
) -> WorkbookDefaults {
    let mut max_hours: Option<f64> = None;
    let mut max_access: Option<NaiveDateTime> = None;

    for row in mapped_rows {
        let total_time = row.get("total_time").map(RawCell::as_raw_string).unwrap_or_default();
        if !total_time.trim().is_empty() {
            let hours = parse_duration_hours(&total_time);
            max_hours = Some(max_hours.map_or(hours, |m: f64| m.max(hours)));
        }
        for key in ["first_access_at", "last_access_at"] {
            if let Some(cell) = row.get(key) {
                if let Some(dt) = cell_to_datetime(cell) {
                    max_access = Some(max_access.map_or(dt, |m| m.max(dt)));
                }
            }
        }
    }

    let default_course_hours_required = max_hours
        .map(|h| h.ceil() as i64)
        .unwrap_or(configured_default_hours);

    let default_course_deadline_date = max_access
        .map(|dt| dt.date() + Duration::days(DAYS_UNTIL_DEADLINE_DEFAULT))
        .unwrap_or_else(|| today + Duration::days(DAYS_UNTIL_DEADLINE_DEFAULT));

    WorkbookDefaults {
        default_course_hours_required,
        default_course_deadline_date,
        default_certificate_expires_at: default_course_deadline_date,
    }
}

/// Normalizes one mapped row into a typed `Row`, or `None` if `email` is
/// blank (such rows are skipped entirely).
pub fn normalize_row(
    mapped: &BTreeMap<String, RawCell>,
    defaults: &WorkbookDefaults,
    today: NaiveDate,
) -> Option<Row> {
    let email = field_string(mapped, "email").trim().to_string();
    if email.is_empty() {
        return None;
    }

    let first_name = field_string(mapped, "first_name");
    let last_name = field_string(mapped, "last_name");
    let full_name_field = field_string(mapped, "full_name");
    let full_name = if !first_name.trim().is_empty() && !last_name.trim().is_empty() {
        format!("{} {}", first_name.trim(), last_name.trim())
    } else if !full_name_field.trim().is_empty() {
        full_name_field.trim().to_string()
    } else {
        email.clone()
    };

    let telefono = field_string(mapped, "telefono");
    let course_name = field_string(mapped, "course_name");

    let course_hours_required = mapped
        .get("course_hours_required")
        .and_then(cell_to_f64)
        .map(|h| h.ceil() as i64)
        .unwrap_or(defaults.default_course_hours_required);

    let raw_total_time = field_string(mapped, "total_time");
    let progress_hours = mapped
        .get("progress_hours")
        .and_then(cell_to_f64)
        .unwrap_or_else(|| parse_duration_hours(&raw_total_time));

    let first_access_at = mapped.get("first_access_at").and_then(cell_to_datetime);
    let last_access_at = mapped.get("last_access_at").and_then(cell_to_datetime);

    let course_deadline_date = mapped
        .get("course_deadline_date")
        .and_then(cell_to_date)
        .or_else(|| {
            [first_access_at, last_access_at]
                .into_iter()
                .flatten()
                .max()
                .map(|dt| dt.date() + Duration::days(DAYS_UNTIL_DEADLINE_DEFAULT))
        })
        .unwrap_or(defaults.default_course_deadline_date);

    let certificate_expires_at = mapped
        .get("certificate_expires_at")
        .and_then(cell_to_date)
        .unwrap_or(course_deadline_date);

    let mut row = Row::new();
    row.insert("full_name".into(), Value::Str(full_name));
    row.insert("email".into(), Value::Str(email));
    row.insert("telefono".into(), Value::Str(telefono));
    row.insert("course_name".into(), Value::Str(course_name));
    row.insert("course_hours_required".into(), Value::Int(course_hours_required));
    row.insert(
        "course_deadline_date".into(),
        Value::Str(course_deadline_date.format("%Y-%m-%d").to_string()),
    );
    row.insert(
        "certificate_expires_at".into(),
        Value::Str(certificate_expires_at.format("%Y-%m-%d").to_string()),
    );
    row.insert("progress_hours".into(), Value::Float(progress_hours));
    row.insert("raw_total_time".into(), Value::Str(raw_total_time));
    row.insert(
        "first_access_at".into(),
        first_access_at
            .map(|dt| Value::Str(dt.format("%Y-%m-%dT%H:%M:%S").to_string()))
            .unwrap_or(Value::Null),
    );
    row.insert(
        "last_access_at".into(),
        last_access_at
            .map(|dt| Value::Str(dt.format("%Y-%m-%dT%H:%M:%S").to_string()))
            .unwrap_or(Value::Null),
    );

    Some(row)
}

fn field_string(mapped: &BTreeMap<String, RawCell>, key: &str) -> String {
    mapped.get(key).map(RawCell::as_raw_string).unwrap_or_default()
}

fn cell_to_f64(cell: &RawCell) -> Option<f64> {
    match cell {
        RawCell::Number(n) => Some(*n),
        RawCell::Str(s) => parse_numeric(s),
        _ => None,
    }
}

fn cell_to_date(cell: &RawCell) -> Option<NaiveDate> {
    match cell {
        RawCell::DateTime(dt) => Some(dt.date()),
        RawCell::Str(s) => parse_date_flexible(s),
        _ => None,
    }
}

fn cell_to_datetime(cell: &RawCell) -> Option<NaiveDateTime> {
    match cell {
        RawCell::DateTime(dt) => Some(*dt),
        RawCell::Str(s) => parse_datetime_or_none(s),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapped_row(fields: &[(&str, RawCell)]) -> BTreeMap<String, RawCell> {
        fields.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 11, 1).unwrap()
    }

    #[test]
    fn row_with_empty_email_is_skipped() {
        let row = mapped_row(&[("email", RawCell::Str(String::new()))]);
        let defaults = derive_workbook_defaults(&[], today(), 6);
        assert!(normalize_row(&row, &defaults, today()).is_none());
    }

    #[test]
    fn workbook_hours_derivation_matches_scenario_6() {
        let ana = mapped_row(&[
            ("email", RawCell::Str("ana@ex.com".into())),
            ("total_time", RawCell::Str("02h 15m 00s".into())),
            ("first_access_at", RawCell::Str("21/10/2025".into())),
        ]);
        let juan = mapped_row(&[
            ("email", RawCell::Str("juan@ex.com".into())),
            ("total_time", RawCell::Str("00h 00m 00s".into())),
            ("first_access_at", RawCell::Str("No visitado".into())),
        ]);
        let rows = vec![ana.clone(), juan.clone()];
        let defaults = derive_workbook_defaults(&rows, today(), 6);
        assert_eq!(defaults.default_course_hours_required, 3);

        let ana_row = normalize_row(&ana, &defaults, today()).unwrap();
        assert_eq!(ana_row.get("progress_hours"), Some(&Value::Float(2.25)));
        assert_eq!(ana_row.get("course_hours_required"), Some(&Value::Int(3)));

        let juan_row = normalize_row(&juan, &defaults, today()).unwrap();
        assert_eq!(juan_row.get("progress_hours"), Some(&Value::Float(0.0)));
        assert_eq!(juan_row.get("first_access_at"), Some(&Value::Null));
    }

    #[test]
    fn full_name_prefers_first_plus_last_over_full_name_field() {
        let row = mapped_row(&[
            ("email", RawCell::Str("a@b.com".into())),
            ("first_name", RawCell::Str("Ana".into())),
            ("last_name", RawCell::Str("Lopez".into())),
            ("full_name", RawCell::Str("Should Not Win".into())),
        ]);
        let defaults = derive_workbook_defaults(&[], today(), 6);
        let normalized = normalize_row(&row, &defaults, today()).unwrap();
        assert_eq!(normalized.get("full_name"), Some(&Value::Str("Ana Lopez".into())));
    }

    #[test]
    fn full_name_falls_back_to_email_when_nothing_else_present() {
        let row = mapped_row(&[("email", RawCell::Str("solo@ex.com".into()))]);
        let defaults = derive_workbook_defaults(&[], today(), 6);
        let normalized = normalize_row(&row, &defaults, today()).unwrap();
        assert_eq!(normalized.get("full_name"), Some(&Value::Str("solo@ex.com".into())));
    }
}
