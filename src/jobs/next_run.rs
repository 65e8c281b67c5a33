//! Trigger-field evaluation.
//!
//! Computes concrete fire times for a [`TriggerFields`] set in a given
//! timezone. Each field is `*`, `*/N`, a numeric value, or a comma list
//! (weekday names for `day_of_week`); absent fields match anything. Steps
//! are anchored at the start of the field's range, so `*/2` on `week`
//! matches ISO weeks 1, 3, 5, …

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Timelike};
use chrono_tz::Tz;

use crate::parser::trigger::TriggerFields;

/// How far ahead we search for a match before declaring the trigger dead.
const SEARCH_HORIZON_DAYS: i64 = 5 * 366;

/// A parsed trigger field.
#[derive(Debug, Clone, PartialEq)]
enum FieldSpec {
    Any,
    Value(u32),
    List(Vec<u32>),
    Step(u32),
}

impl FieldSpec {
    /// Parse a field. `names` supplies a symbolic vocabulary (weekdays).
    fn parse(field: &str, names: &[&str]) -> Result<FieldSpec> {
        let field = field.trim();
        if field == "*" {
            return Ok(FieldSpec::Any);
        }
        if let Some(step) = field.strip_prefix("*/") {
            let step: u32 = step.parse().context("invalid step value")?;
            if step == 0 {
                bail!("step value must be positive");
            }
            return Ok(FieldSpec::Step(step));
        }
        let values: Result<Vec<u32>> = field
            .split(',')
            .map(|token| {
                let token = token.trim();
                if let Some(idx) = names.iter().position(|n| *n == token) {
                    return Ok(idx as u32);
                }
                token
                    .parse::<u32>()
                    .with_context(|| format!("invalid field token {:?}", token))
            })
            .collect();
        let values = values?;
        match values.as_slice() {
            [single] => Ok(FieldSpec::Value(*single)),
            _ => Ok(FieldSpec::List(values)),
        }
    }

    /// Check the field against a value. `range_start` anchors steps.
    fn matches(&self, value: u32, range_start: u32) -> bool {
        match self {
            FieldSpec::Any => true,
            FieldSpec::Value(v) => *v == value,
            FieldSpec::List(values) => values.contains(&value),
            FieldSpec::Step(step) => value.saturating_sub(range_start) % step == 0,
        }
    }
}

const WEEKDAY_NAMES: [&str; 7] = ["mon", "tue", "wed", "thu", "fri", "sat", "sun"];

/// Parsed form of a trigger field set, ready for evaluation.
#[derive(Debug, Clone)]
pub struct TriggerSchedule {
    day_of_week: FieldSpec,
    week: FieldSpec,
    month: FieldSpec,
    year: FieldSpec,
    hour: FieldSpec,
    minute: FieldSpec,
    start_date: Option<chrono::NaiveDateTime>,
    end_date: Option<chrono::NaiveDateTime>,
}

impl TriggerSchedule {
    pub fn parse(fields: &TriggerFields) -> Result<TriggerSchedule> {
        let spec = |field: &Option<String>, names: &[&str]| -> Result<FieldSpec> {
            match field {
                Some(value) => FieldSpec::parse(value, names),
                None => Ok(FieldSpec::Any),
            }
        };
        Ok(TriggerSchedule {
            day_of_week: spec(&fields.day_of_week, &WEEKDAY_NAMES).context("day_of_week")?,
            week: spec(&fields.week, &[]).context("week")?,
            month: spec(&fields.month, &[]).context("month")?,
            year: spec(&fields.year, &[]).context("year")?,
            hour: spec(&fields.hour, &[]).context("hour")?,
            minute: spec(&fields.minute, &[]).context("minute")?,
            start_date: fields.start_date,
            end_date: fields.end_date,
        })
    }

    fn day_matches(&self, date: NaiveDate) -> bool {
        self.year.matches(date.year().unsigned_abs(), 1970)
            && self.month.matches(date.month(), 1)
            && self.week.matches(date.iso_week().week(), 1)
            && self
                .day_of_week
                .matches(date.weekday().num_days_from_monday(), 0)
    }

    /// Next local fire time strictly after `after`, or `None` when the
    /// trigger has no further occurrence (end bound passed, or nothing in
    /// the search horizon).
    pub fn next_after(&self, after: DateTime<Tz>) -> Option<DateTime<Tz>> {
        let tz = after.timezone();
        let local = after.naive_local();
        // Candidates are minute-aligned and strictly in the future.
        let floor = local
            .with_second(0)
            .and_then(|t| t.with_nanosecond(0))
            .unwrap_or(local)
            + Duration::minutes(1);
        let floor = match self.start_date {
            Some(start) if start > floor => start,
            _ => floor,
        };

        for offset in 0..SEARCH_HORIZON_DAYS {
            let date = floor.date() + Duration::days(offset);
            if let Some(end) = self.end_date {
                if date > end.date() {
                    return None;
                }
            }
            if !self.day_matches(date) {
                continue;
            }
            for hour in 0..24u32 {
                if !self.hour.matches(hour, 0) {
                    continue;
                }
                for minute in 0..60u32 {
                    if !self.minute.matches(minute, 0) {
                        continue;
                    }
                    let candidate = match date.and_hms_opt(hour, minute, 0) {
                        Some(c) => c,
                        None => continue,
                    };
                    if candidate < floor {
                        continue;
                    }
                    if let Some(end) = self.end_date {
                        if candidate > end {
                            return None;
                        }
                    }
                    // Skip instants that do not exist locally (DST gaps).
                    if let Some(resolved) = tz.from_local_datetime(&candidate).earliest() {
                        return Some(resolved);
                    }
                }
            }
        }
        None
    }
}

/// Convenience wrapper: parse and evaluate in one step.
pub fn next_occurrence(fields: &TriggerFields, after: DateTime<Tz>) -> Result<Option<DateTime<Tz>>> {
    Ok(TriggerSchedule::parse(fields)?.next_after(after))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use chrono_tz::Tz;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Tz> {
        let tz: Tz = "Europe/Berlin".parse().unwrap();
        tz.from_local_datetime(
            &NaiveDate::from_ymd_opt(y, mo, d)
                .unwrap()
                .and_hms_opt(h, mi, 0)
                .unwrap(),
        )
        .single()
        .unwrap()
    }

    fn fields(day_of_week: Option<&str>, week: Option<&str>, hour: &str, minute: &str) -> TriggerFields {
        TriggerFields {
            day_of_week: day_of_week.map(|s| s.to_string()),
            week: week.map(|s| s.to_string()),
            hour: Some(hour.to_string()),
            minute: Some(minute.to_string()),
            ..TriggerFields::default()
        }
    }

    #[test]
    fn test_daily_fires_later_today_or_tomorrow() {
        let daily = fields(Some("*"), None, "9", "0");
        // Before 9am: fires the same day.
        let next = next_occurrence(&daily, at(2020, 4, 28, 8, 20)).unwrap().unwrap();
        assert_eq!(next, at(2020, 4, 28, 9, 0));
        // After 9am: tomorrow.
        let next = next_occurrence(&daily, at(2020, 4, 28, 9, 0)).unwrap().unwrap();
        assert_eq!(next, at(2020, 4, 29, 9, 0));
    }

    #[test]
    fn test_weekly_on_monday() {
        let weekly = fields(Some("mon"), Some("*"), "9", "0");
        // 2020-04-28 is a Tuesday; next Monday is May 4.
        let next = next_occurrence(&weekly, at(2020, 4, 28, 8, 20)).unwrap().unwrap();
        assert_eq!(next, at(2020, 5, 4, 9, 0));
    }

    #[test]
    fn test_weekday_list() {
        let spec = fields(Some("fri,sun"), Some("*"), "14", "0");
        let next = next_occurrence(&spec, at(2020, 4, 28, 8, 20)).unwrap().unwrap();
        assert_eq!(next, at(2020, 5, 1, 14, 0));
        let next = next_occurrence(&spec, at(2020, 5, 1, 14, 0)).unwrap().unwrap();
        assert_eq!(next, at(2020, 5, 3, 14, 0));
    }

    #[test]
    fn test_biweekly_skips_odd_weeks() {
        let spec = fields(Some("wed"), Some("*/2"), "14", "0");
        // 2020-04-28 is in ISO week 18 (even): */2 anchored at week 1
        // matches odd weeks, so the next match is Wednesday of week 19.
        let next = next_occurrence(&spec, at(2020, 4, 28, 8, 20)).unwrap().unwrap();
        assert_eq!(next, at(2020, 5, 6, 14, 0));
        let next = next_occurrence(&spec, next).unwrap().unwrap();
        assert_eq!(next, at(2020, 5, 20, 14, 0));
    }

    #[test]
    fn test_minutely_step() {
        let spec = TriggerFields {
            hour: Some("9".to_string()),
            minute: Some("*/15".to_string()),
            ..TriggerFields::default()
        };
        let next = next_occurrence(&spec, at(2020, 4, 28, 9, 1)).unwrap().unwrap();
        assert_eq!(next, at(2020, 4, 28, 9, 15));
        let next = next_occurrence(&spec, at(2020, 4, 28, 9, 45)).unwrap().unwrap();
        assert_eq!(next, at(2020, 4, 29, 9, 0));
    }

    #[test]
    fn test_end_date_exhausts_trigger() {
        let mut spec = fields(Some("*"), None, "9", "0");
        spec.end_date = NaiveDate::from_ymd_opt(2020, 4, 30).unwrap().and_hms_opt(9, 0, 0);
        let next = next_occurrence(&spec, at(2020, 4, 29, 10, 0)).unwrap().unwrap();
        assert_eq!(next, at(2020, 4, 30, 9, 0));
        assert_eq!(next_occurrence(&spec, at(2020, 4, 30, 9, 0)).unwrap(), None);
    }

    #[test]
    fn test_start_date_defers_first_fire() {
        let mut spec = fields(Some("*"), None, "9", "0");
        spec.start_date = NaiveDate::from_ymd_opt(2020, 5, 10).unwrap().and_hms_opt(0, 0, 0);
        let next = next_occurrence(&spec, at(2020, 4, 28, 8, 20)).unwrap().unwrap();
        assert_eq!(next, at(2020, 5, 10, 9, 0));
    }

    #[test]
    fn test_invalid_field_is_an_error() {
        let spec = fields(Some("funday"), None, "9", "0");
        assert!(next_occurrence(&spec, at(2020, 4, 28, 8, 20)).is_err());
    }
}
