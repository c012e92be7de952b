use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;
use std::sync::OnceLock;

fn duration_token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)(\d+)\s*([hms])").unwrap())
}

/// "no visitado" (any case) → 0.0. Otherwise accumulates `NhNmNs` tokens into
/// hours; if no token matches, falls back to parsing the cleaned string as a
/// raw number, left undivided (matches the `"3600" → 3600.0` boundary case).
pub fn parse_duration_hours(raw: &str) -> f64 {
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case("no visitado") {
        return 0.0;
    }

    let mut total_seconds: f64 = 0.0;
    let mut matched_any = false;
    for caps in duration_token_re().captures_iter(trimmed) {
        matched_any = true;
        let amount: f64 = caps[1].parse().unwrap_or(0.0);
        let unit = caps[2].to_ascii_lowercase();
        total_seconds += match unit.as_str() {
            "h" => amount * 3600.0,
            "m" => amount * 60.0,
            "s" => amount,
            _ => 0.0,
        };
    }

    if matched_any {
        total_seconds / 3600.0
    } else {
        parse_numeric(trimmed).unwrap_or(0.0)
    }
}

/// Accepts `,` or `.` as the decimal separator.
pub fn parse_numeric(raw: &str) -> Option<f64> {
    let cleaned = raw.trim().replace(',', ".");
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok()
}

/// Day-first when the string contains `/`; otherwise ISO (`YYYY-MM-DD`).
pub fn parse_date_flexible(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.contains('/') {
        for fmt in ["%d/%m/%Y", "%d/%m/%y"] {
            if let Ok(d) = NaiveDate::parse_from_str(trimmed, fmt) {
                return Some(d);
            }
        }
        None
    } else {
        for fmt in ["%Y-%m-%d", "%Y/%m/%d"] {
            if let Ok(d) = NaiveDate::parse_from_str(trimmed, fmt) {
                return Some(d);
            }
        }
        None
    }
}

/// `"No visitado"` (any case) → `None`. Otherwise parses a date or date-time.
pub fn parse_datetime_or_none(raw: &str) -> Option<NaiveDateTime> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("no visitado") {
        return None;
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%d/%m/%Y %H:%M:%S", "%d/%m/%Y %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Some(dt);
        }
    }
    parse_date_flexible(trimmed).map(|d| d.and_time(NaiveTime::MIN))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_hours_minutes_seconds() {
        assert_eq!(parse_duration_hours("02h 15m 00s"), 2.25);
    }

    #[test]
    fn duration_no_visitado_is_zero() {
        assert_eq!(parse_duration_hours("No Visitado"), 0.0);
    }

    #[test]
    fn duration_raw_number_is_left_undivided() {
        assert_eq!(parse_duration_hours("3600"), 3600.0);
    }

    #[test]
    fn numeric_accepts_comma_decimal() {
        assert_eq!(parse_numeric("2,25"), Some(2.25));
    }

    #[test]
    fn date_is_day_first_with_slashes() {
        let d = parse_date_flexible("01/02/2024").unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
    }

    #[test]
    fn datetime_no_visitado_is_none() {
        assert_eq!(parse_datetime_or_none("No visitado"), None);
    }
}
