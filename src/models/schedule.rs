//! Recurring schedule patterns.
//!
//! A pattern is either an explicit date list or a recurrence rule. Recurrence
//! expressions are parsed and validated when the pattern is created, so
//! expansion never sees a malformed rule.

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};
use chrono_tz::Tz;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{EngineError, Result};
use crate::models::tour::MAX_CUTOFF_HOURS;

/// Recurrence frequency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Daily,
    Weekly,
}

/// A validated recurrence rule, parsed from an RRULE-style expression.
///
/// Supported form: `FREQ=DAILY|WEEKLY[;INTERVAL=n][;BYDAY=MO,TU,..]`
/// (`BYDAY` only with `FREQ=WEEKLY`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurrenceRule {
    /// The expression this rule was parsed from
    pub source: String,
    pub freq: Frequency,
    pub interval: u32,
    pub by_weekday: Vec<Weekday>,
}

fn parse_weekday(token: &str) -> Result<Weekday> {
    match token {
        "MO" => Ok(Weekday::Mon),
        "TU" => Ok(Weekday::Tue),
        "WE" => Ok(Weekday::Wed),
        "TH" => Ok(Weekday::Thu),
        "FR" => Ok(Weekday::Fri),
        "SA" => Ok(Weekday::Sat),
        "SU" => Ok(Weekday::Sun),
        other => Err(EngineError::Validation(format!(
            "unknown BYDAY token '{other}'"
        ))),
    }
}

impl RecurrenceRule {
    /// Parse and validate a recurrence expression.
    ///
    /// Fails fast at pattern-creation time; a stored pattern always carries a
    /// rule that expands cleanly.
    pub fn parse(source: &str) -> Result<Self> {
        let mut freq = None;
        let mut interval = 1u32;
        let mut by_weekday = Vec::new();

        for part in source.split(';').filter(|p| !p.is_empty()) {
            let (key, value) = part.split_once('=').ok_or_else(|| {
                EngineError::Validation(format!("malformed recurrence part '{part}'"))
            })?;
            match key {
                "FREQ" => {
                    freq = Some(match value {
                        "DAILY" => Frequency::Daily,
                        "WEEKLY" => Frequency::Weekly,
                        other => {
                            return Err(EngineError::Validation(format!(
                                "unsupported FREQ '{other}'"
                            )))
                        }
                    });
                }
                "INTERVAL" => {
                    interval = value.parse::<u32>().ok().filter(|n| *n >= 1).ok_or_else(|| {
                        EngineError::Validation(format!("INTERVAL must be a positive integer, got '{value}'"))
                    })?;
                }
                "BYDAY" => {
                    for token in value.split(',') {
                        by_weekday.push(parse_weekday(token)?);
                    }
                }
                other => {
                    return Err(EngineError::Validation(format!(
                        "unsupported recurrence key '{other}'"
                    )));
                }
            }
        }

        let freq = freq
            .ok_or_else(|| EngineError::Validation("recurrence rule is missing FREQ".into()))?;
        if freq == Frequency::Daily && !by_weekday.is_empty() {
            return Err(EngineError::Validation(
                "BYDAY is only valid with FREQ=WEEKLY".into(),
            ));
        }

        Ok(Self {
            source: source.to_string(),
            freq,
            interval,
            by_weekday,
        })
    }

    /// Whether `date` falls on the rule anchored at `anchor`.
    ///
    /// Pure: depends only on the rule, the anchor and the candidate date.
    pub fn matches(&self, anchor: NaiveDate, date: NaiveDate) -> bool {
        let days_since = (date - anchor).num_days();
        if days_since < 0 {
            return false;
        }
        match self.freq {
            Frequency::Daily => days_since % i64::from(self.interval) == 0,
            Frequency::Weekly => {
                let weeks_since = days_since / 7;
                if weeks_since % i64::from(self.interval) != 0 {
                    return false;
                }
                if self.by_weekday.is_empty() {
                    date.weekday() == anchor.weekday()
                } else {
                    self.by_weekday.contains(&date.weekday())
                }
            }
        }
    }
}

/// How a pattern produces its date set
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PatternKind {
    /// Explicit list of ISO dates
    List { dates: Vec<NaiveDate> },
    /// Recurrence expression
    Recurrence { rule: RecurrenceRule },
}

/// A recurrence rule bound to one tour.
///
/// Multiple patterns may coexist per tour; their generated occurrences must
/// not collide on a date (that is a configuration error, surfaced to the
/// operator at materialization time).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulePattern {
    pub id: Uuid,
    pub tour_id: Uuid,
    #[serde(flatten)]
    pub kind: PatternKind,
    /// Local daily start time in `timezone`
    pub local_start_time: NaiveTime,
    pub timezone: Tz,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Per-occurrence seat capacity
    pub capacity: i32,
    #[serde(with = "rust_decimal::serde::str_option", default)]
    pub price_override: Option<Decimal>,
    pub cutoff_hours_override: Option<i64>,
    pub min_participants_override: Option<i32>,
    /// Dates subtracted from the computed set
    pub blackout_dates: Vec<NaiveDate>,
    pub exceptions: Vec<NaiveDate>,
}

impl SchedulePattern {
    /// Validate invariants at creation time.
    pub fn validate(&self) -> Result<()> {
        if self.end_date < self.start_date {
            return Err(EngineError::Validation(format!(
                "pattern validity window {}..{} is inverted",
                self.start_date, self.end_date
            )));
        }
        if self.capacity < 1 {
            return Err(EngineError::Validation(
                "pattern capacity must be positive".into(),
            ));
        }
        if let Some(price) = self.price_override {
            if price < Decimal::ZERO {
                return Err(EngineError::Validation(
                    "price override must be non-negative".into(),
                ));
            }
        }
        if let Some(cutoff) = self.cutoff_hours_override {
            if !(0..=MAX_CUTOFF_HOURS).contains(&cutoff) {
                return Err(EngineError::Validation(format!(
                    "cutoff override must be 0..={MAX_CUTOFF_HOURS} hours"
                )));
            }
        }
        if let Some(min) = self.min_participants_override {
            if min < 1 {
                return Err(EngineError::Validation(
                    "min participants override must be at least 1".into(),
                ));
            }
        }
        if let PatternKind::List { dates } = &self.kind {
            if dates.is_empty() {
                return Err(EngineError::Validation(
                    "list pattern must declare at least one date".into(),
                ));
            }
        }
        Ok(())
    }

    /// Resolve the UTC start instant for one expanded date.
    ///
    /// Ambiguous or nonexistent local times (DST transitions) are surfaced to
    /// the operator rather than silently resolved.
    pub fn start_instant(&self, date: NaiveDate) -> Result<DateTime<Utc>> {
        let local = date.and_time(self.local_start_time);
        match self.timezone.from_local_datetime(&local) {
            chrono::LocalResult::Single(dt) => Ok(dt.with_timezone(&Utc)),
            chrono::LocalResult::Ambiguous(_, _) => Err(EngineError::Configuration {
                message: format!("local time {local} is ambiguous in {}", self.timezone),
                errors: vec![format!("{date}")],
            }),
            chrono::LocalResult::None => Err(EngineError::Configuration {
                message: format!("local time {local} does not exist in {}", self.timezone),
                errors: vec![format!("{date}")],
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    // ==================== RecurrenceRule::parse tests ====================

    #[test]
    fn test_parse_daily() {
        let rule = RecurrenceRule::parse("FREQ=DAILY").unwrap();
        assert_eq!(rule.freq, Frequency::Daily);
        assert_eq!(rule.interval, 1);
        assert!(rule.by_weekday.is_empty());
    }

    #[test]
    fn test_parse_weekly_byday() {
        let rule = RecurrenceRule::parse("FREQ=WEEKLY;BYDAY=MO,WE,FR").unwrap();
        assert_eq!(rule.freq, Frequency::Weekly);
        assert_eq!(
            rule.by_weekday,
            vec![Weekday::Mon, Weekday::Wed, Weekday::Fri]
        );
    }

    #[test]
    fn test_parse_interval() {
        let rule = RecurrenceRule::parse("FREQ=DAILY;INTERVAL=3").unwrap();
        assert_eq!(rule.interval, 3);
    }

    #[test]
    fn test_parse_rejects_missing_freq() {
        assert!(RecurrenceRule::parse("INTERVAL=2").is_err());
    }

    #[test]
    fn test_parse_rejects_unknown_freq() {
        assert!(RecurrenceRule::parse("FREQ=MONTHLY").is_err());
    }

    #[test]
    fn test_parse_rejects_zero_interval() {
        assert!(RecurrenceRule::parse("FREQ=DAILY;INTERVAL=0").is_err());
    }

    #[test]
    fn test_parse_rejects_byday_with_daily() {
        assert!(RecurrenceRule::parse("FREQ=DAILY;BYDAY=MO").is_err());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(RecurrenceRule::parse("every other tuesday").is_err());
        assert!(RecurrenceRule::parse("FREQ=WEEKLY;BYDAY=XX").is_err());
    }

    // ==================== RecurrenceRule::matches tests ====================

    #[test]
    fn test_daily_matches_every_day() {
        let rule = RecurrenceRule::parse("FREQ=DAILY").unwrap();
        let anchor = date(2025, 7, 1);
        assert!(rule.matches(anchor, date(2025, 7, 1)));
        assert!(rule.matches(anchor, date(2025, 7, 2)));
        assert!(!rule.matches(anchor, date(2025, 6, 30)));
    }

    #[test]
    fn test_daily_interval_skips_days() {
        let rule = RecurrenceRule::parse("FREQ=DAILY;INTERVAL=3").unwrap();
        let anchor = date(2025, 7, 1);
        assert!(rule.matches(anchor, date(2025, 7, 1)));
        assert!(!rule.matches(anchor, date(2025, 7, 2)));
        assert!(rule.matches(anchor, date(2025, 7, 4)));
    }

    #[test]
    fn test_weekly_byday() {
        let rule = RecurrenceRule::parse("FREQ=WEEKLY;BYDAY=MO,FR").unwrap();
        // 2025-07-01 is a Tuesday
        let anchor = date(2025, 7, 1);
        assert!(!rule.matches(anchor, date(2025, 7, 1)));
        assert!(rule.matches(anchor, date(2025, 7, 4))); // Friday
        assert!(rule.matches(anchor, date(2025, 7, 7))); // Monday
    }

    #[test]
    fn test_weekly_without_byday_uses_anchor_weekday() {
        let rule = RecurrenceRule::parse("FREQ=WEEKLY").unwrap();
        let anchor = date(2025, 7, 1); // Tuesday
        assert!(rule.matches(anchor, date(2025, 7, 8)));
        assert!(!rule.matches(anchor, date(2025, 7, 9)));
    }

    // ==================== SchedulePattern tests ====================

    fn sample_pattern(kind: PatternKind) -> SchedulePattern {
        SchedulePattern {
            id: Uuid::new_v4(),
            tour_id: Uuid::new_v4(),
            kind,
            local_start_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            timezone: chrono_tz::Asia::Kamchatka,
            start_date: date(2025, 7, 1),
            end_date: date(2025, 8, 31),
            capacity: 12,
            price_override: None,
            cutoff_hours_override: None,
            min_participants_override: None,
            blackout_dates: vec![],
            exceptions: vec![],
        }
    }

    #[test]
    fn test_pattern_rejects_inverted_window() {
        let mut p = sample_pattern(PatternKind::List {
            dates: vec![date(2025, 7, 5)],
        });
        p.end_date = date(2025, 6, 1);
        assert!(p.validate().is_err());
    }

    #[test]
    fn test_pattern_rejects_zero_capacity() {
        let mut p = sample_pattern(PatternKind::List {
            dates: vec![date(2025, 7, 5)],
        });
        p.capacity = 0;
        assert!(p.validate().is_err());
    }

    #[test]
    fn test_pattern_rejects_empty_date_list() {
        let p = sample_pattern(PatternKind::List { dates: vec![] });
        assert!(p.validate().is_err());
    }

    #[test]
    fn test_start_instant_converts_to_utc() {
        let p = sample_pattern(PatternKind::List {
            dates: vec![date(2025, 7, 5)],
        });
        let instant = p.start_instant(date(2025, 7, 5)).unwrap();
        // Kamchatka is UTC+12: 10:00 local is 22:00 UTC the previous day
        assert_eq!(instant.to_rfc3339(), "2025-07-04T22:00:00+00:00");
    }
}
