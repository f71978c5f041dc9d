//! Pure pattern-to-date expansion.
//!
//! `expand` is a pure function of the pattern and the requested range: no
//! clock, no store. Re-running it with the same inputs always yields the
//! same ordered date set.

use chrono::{Duration, NaiveDate};

use crate::models::{PatternKind, SchedulePattern};

/// Expand a pattern into the ordered set of calendar dates it covers within
/// `[range_start, range_end]`, minus blackouts and exceptions.
pub fn expand(
    pattern: &SchedulePattern,
    range_start: NaiveDate,
    range_end: NaiveDate,
) -> Vec<NaiveDate> {
    let window_start = range_start.max(pattern.start_date);
    let window_end = range_end.min(pattern.end_date);
    if window_end < window_start {
        return Vec::new();
    }

    let mut dates: Vec<NaiveDate> = match &pattern.kind {
        PatternKind::List { dates } => {
            let mut selected: Vec<NaiveDate> = dates
                .iter()
                .copied()
                .filter(|d| (window_start..=window_end).contains(d))
                .collect();
            selected.sort();
            selected.dedup();
            selected
        }
        PatternKind::Recurrence { rule } => {
            let mut selected = Vec::new();
            let mut day = window_start;
            while day <= window_end {
                if rule.matches(pattern.start_date, day) {
                    selected.push(day);
                }
                day += Duration::days(1);
            }
            selected
        }
    };

    dates.retain(|d| !pattern.blackout_dates.contains(d) && !pattern.exceptions.contains(d));
    dates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RecurrenceRule;
    use chrono::{NaiveTime, Weekday};
    use chrono::Datelike;
    use uuid::Uuid;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn pattern(kind: PatternKind) -> SchedulePattern {
        SchedulePattern {
            id: Uuid::new_v4(),
            tour_id: Uuid::new_v4(),
            kind,
            local_start_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            timezone: chrono_tz::Asia::Kamchatka,
            start_date: date(2025, 7, 1),
            end_date: date(2025, 7, 31),
            capacity: 12,
            price_override: None,
            cutoff_hours_override: None,
            min_participants_override: None,
            blackout_dates: vec![],
            exceptions: vec![],
        }
    }

    #[test]
    fn test_list_pattern_intersects_range() {
        let p = pattern(PatternKind::List {
            dates: vec![date(2025, 6, 30), date(2025, 7, 5), date(2025, 7, 20), date(2025, 8, 1)],
        });
        assert_eq!(
            expand(&p, date(2025, 7, 1), date(2025, 7, 31)),
            vec![date(2025, 7, 5), date(2025, 7, 20)]
        );
    }

    #[test]
    fn test_list_pattern_output_is_sorted_and_deduped() {
        let p = pattern(PatternKind::List {
            dates: vec![date(2025, 7, 20), date(2025, 7, 5), date(2025, 7, 5)],
        });
        assert_eq!(
            expand(&p, date(2025, 7, 1), date(2025, 7, 31)),
            vec![date(2025, 7, 5), date(2025, 7, 20)]
        );
    }

    #[test]
    fn test_blackouts_and_exceptions_subtracted() {
        let mut p = pattern(PatternKind::List {
            dates: vec![date(2025, 7, 5), date(2025, 7, 12), date(2025, 7, 19)],
        });
        p.blackout_dates = vec![date(2025, 7, 12)];
        p.exceptions = vec![date(2025, 7, 19)];
        assert_eq!(
            expand(&p, date(2025, 7, 1), date(2025, 7, 31)),
            vec![date(2025, 7, 5)]
        );
    }

    #[test]
    fn test_recurrence_clamped_to_validity_window() {
        let rule = RecurrenceRule::parse("FREQ=DAILY").unwrap();
        let p = pattern(PatternKind::Recurrence { rule });
        // Range extends past the pattern's end_date
        let dates = expand(&p, date(2025, 7, 29), date(2025, 8, 10));
        assert_eq!(
            dates,
            vec![date(2025, 7, 29), date(2025, 7, 30), date(2025, 7, 31)]
        );
    }

    #[test]
    fn test_weekly_byday_expansion() {
        let rule = RecurrenceRule::parse("FREQ=WEEKLY;BYDAY=SA,SU").unwrap();
        let p = pattern(PatternKind::Recurrence { rule });
        let dates = expand(&p, date(2025, 7, 1), date(2025, 7, 14));
        assert_eq!(
            dates,
            vec![date(2025, 7, 5), date(2025, 7, 6), date(2025, 7, 12), date(2025, 7, 13)]
        );
        assert!(dates.iter().all(|d| matches!(
            d.weekday(),
            Weekday::Sat | Weekday::Sun
        )));
    }

    #[test]
    fn test_empty_window_yields_nothing() {
        let p = pattern(PatternKind::List {
            dates: vec![date(2025, 7, 5)],
        });
        assert!(expand(&p, date(2025, 9, 1), date(2025, 9, 30)).is_empty());
    }

    #[test]
    fn test_expansion_is_deterministic() {
        let rule = RecurrenceRule::parse("FREQ=WEEKLY;BYDAY=MO,WE,FR;INTERVAL=2").unwrap();
        let p = pattern(PatternKind::Recurrence { rule });
        let first = expand(&p, date(2025, 7, 1), date(2025, 7, 31));
        let second = expand(&p, date(2025, 7, 1), date(2025, 7, 31));
        assert_eq!(first, second);
        assert!(!first.is_empty());
    }
}
