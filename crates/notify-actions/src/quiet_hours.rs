use chrono::{DateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

/// A recurring daily window during which live notifications are suppressed.
/// The timezone is an explicit field defaulting to UTC rather than left
/// implicit.
#[derive(Debug, Clone, Copy)]
pub struct QuietHours {
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub tz: Tz,
}

impl QuietHours {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end, tz: chrono_tz::UTC }
    }

    pub fn with_tz(start: NaiveTime, end: NaiveTime, tz: Tz) -> Self {
        Self { start, end, tz }
    }

    /// True iff `now` (converted into this window's timezone) falls outside
    /// the quiet window. Windows spanning midnight (`start > end`) invert the
    /// inside/outside test accordingly.
    pub fn allows(&self, now: DateTime<Utc>) -> bool {
        let local = now.with_timezone(&self.tz).time();
        if self.start < self.end {
            !(self.start <= local && local < self.end)
        } else {
            self.end <= local && local < self.start
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.from_utc_datetime(
            &NaiveDate::from_ymd_opt(2025, 1, 1)
                .unwrap()
                .and_hms_opt(hour, minute, 0)
                .unwrap(),
        )
    }

    fn window() -> QuietHours {
        QuietHours::new(
            NaiveTime::from_hms_opt(21, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
        )
    }

    #[test]
    fn just_before_end_is_still_quiet() {
        assert!(!window().allows(at(7, 59)));
    }

    #[test]
    fn at_end_boundary_allows() {
        assert!(window().allows(at(8, 0)));
    }

    #[test]
    fn inside_window_after_start_is_quiet() {
        assert!(!window().allows(at(22, 0)));
    }

    #[test]
    fn daytime_allows() {
        assert!(window().allows(at(10, 0)));
    }

    #[test]
    fn non_spanning_window() {
        let w = QuietHours::new(
            NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
        );
        assert!(!w.allows(at(12, 0)));
        assert!(w.allows(at(18, 0)));
    }
}
