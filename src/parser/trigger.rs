//! Recurrence-to-trigger conversion.
//!
//! Flattens a [`Recurrence`] into the field set the scheduler's cron-style
//! trigger consumes. Structural fields pass through renamed; the recurrence
//! unit decides which single field receives the interval (`*` for 1, `*/N`
//! otherwise), overwriting any passthrough value on that field.

use chrono::{NaiveDateTime, Weekday};
use serde::{Deserialize, Serialize};

use crate::parser::frequency::{Recurrence, Unit};

/// Flat cron-style trigger parameters.
///
/// Field names are the trigger's vocabulary, not ours; they must not be
/// renamed. Absent fields are unconstrained.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub day_of_week: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub week: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub month: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hour: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minute: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub second: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDateTime>,
}

/// Convert a recurrence rule to trigger fields.
pub fn to_trigger_fields(rec: &Recurrence) -> TriggerFields {
    let mut fields = TriggerFields::default();

    if !rec.weekdays.is_empty() {
        fields.day_of_week = Some(
            rec.weekdays
                .iter()
                .map(|wd| cron_weekday(*wd))
                .collect::<Vec<_>>()
                .join(","),
        );
    }
    if let Some(month) = rec.month {
        fields.month = Some(month.to_string());
    }
    if let Some(hour) = rec.hour {
        fields.hour = Some(hour.to_string());
    }
    if let Some(minute) = rec.minute {
        fields.minute = Some(minute.to_string());
    }
    fields.start_date = rec.start;
    fields.end_date = rec.end;

    // The unit's target field takes the interval, last so it wins.
    let value = if rec.interval == 1 {
        "*".to_string()
    } else {
        format!("*/{}", rec.interval)
    };
    match rec.unit {
        Unit::Daily => fields.day_of_week = Some(value),
        Unit::Weekly => fields.week = Some(value),
        Unit::Monthly => fields.month = Some(value),
        Unit::Yearly => fields.year = Some(value),
        Unit::Minutely => fields.minute = Some(value),
    }

    fields
}

/// Three-letter cron weekday names.
pub fn cron_weekday(wd: Weekday) -> &'static str {
    match wd {
        Weekday::Mon => "mon",
        Weekday::Tue => "tue",
        Weekday::Wed => "wed",
        Weekday::Thu => "thu",
        Weekday::Fri => "fri",
        Weekday::Sat => "sat",
        Weekday::Sun => "sun",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::frequency::{parse_frequency, Frequency};
    use chrono::NaiveDate;

    fn fields_for(text: &str) -> TriggerFields {
        let now = NaiveDate::from_ymd_opt(2020, 4, 28)
            .unwrap()
            .and_hms_opt(8, 20, 0)
            .unwrap();
        match parse_frequency(text, now) {
            Some(Frequency::Recurring(rec)) => to_trigger_fields(&rec),
            other => panic!("expected recurrence for {:?}, got {:?}", text, other),
        }
    }

    #[test]
    fn test_every_day_at_midnight() {
        let fields = fields_for("every day at 12am");
        assert_eq!(fields.day_of_week.as_deref(), Some("*"));
        assert_eq!(fields.hour.as_deref(), Some("0"));
        assert_eq!(fields.minute.as_deref(), Some("0"));
        assert_eq!(fields.week, None);
    }

    #[test]
    fn test_every_monday_at_9am() {
        let fields = fields_for("every Monday at 9am");
        assert_eq!(fields.day_of_week.as_deref(), Some("mon"));
        assert_eq!(fields.hour.as_deref(), Some("9"));
        assert_eq!(fields.minute.as_deref(), Some("0"));
        assert_eq!(fields.week.as_deref(), Some("*"));
    }

    #[test]
    fn test_every_weekday_at_11pm() {
        let fields = fields_for("every weekday at 11pm");
        assert_eq!(fields.day_of_week.as_deref(), Some("mon,tue,wed,thu,fri"));
        assert_eq!(fields.hour.as_deref(), Some("23"));
        assert_eq!(fields.week.as_deref(), Some("*"));
    }

    #[test]
    fn test_weekday_pair_at_2pm() {
        let fields = fields_for("every Friday and Sunday at 2pm");
        assert_eq!(fields.day_of_week.as_deref(), Some("fri,sun"));
        assert_eq!(fields.hour.as_deref(), Some("14"));
        assert_eq!(fields.minute.as_deref(), Some("0"));
        assert_eq!(fields.week.as_deref(), Some("*"));
    }

    #[test]
    fn test_every_other_wednesday_at_2pm() {
        let fields = fields_for("every other Wednesday at 2pm");
        assert_eq!(fields.day_of_week.as_deref(), Some("wed"));
        assert_eq!(fields.hour.as_deref(), Some("14"));
        assert_eq!(fields.minute.as_deref(), Some("0"));
        assert_eq!(fields.week.as_deref(), Some("*/2"));
    }

    #[test]
    fn test_interval_wildcard_per_unit() {
        // Every supported unit routes its interval to exactly one field.
        let cases: Vec<(&str, fn(&TriggerFields) -> Option<&str>)> = vec![
            ("every day", |f| f.day_of_week.as_deref()),
            ("every week", |f| f.week.as_deref()),
            ("every month", |f| f.month.as_deref()),
            ("every year", |f| f.year.as_deref()),
            ("every minute", |f| f.minute.as_deref()),
        ];
        for (phrase, get) in &cases {
            let fields = fields_for(phrase);
            assert_eq!(get(&fields), Some("*"), "{}", phrase);
        }

        let stepped: Vec<(&str, fn(&TriggerFields) -> Option<&str>, &str)> = vec![
            ("every 3 days", |f| f.day_of_week.as_deref(), "*/3"),
            ("every 2 weeks", |f| f.week.as_deref(), "*/2"),
            ("every 4 months", |f| f.month.as_deref(), "*/4"),
            ("every 2 years", |f| f.year.as_deref(), "*/2"),
            ("every 30 minutes", |f| f.minute.as_deref(), "*/30"),
        ];
        for (phrase, get, expected) in &stepped {
            let fields = fields_for(phrase);
            assert_eq!(get(&fields), Some(*expected), "{}", phrase);
        }
    }

    #[test]
    fn test_minutely_overwrites_default_minute() {
        // "every minute" still gets the default 9am hour, but the minute
        // field becomes the interval wildcard.
        let fields = fields_for("every minute");
        assert_eq!(fields.hour.as_deref(), Some("9"));
        assert_eq!(fields.minute.as_deref(), Some("*"));
    }

    #[test]
    fn test_bounds_pass_through() {
        let fields = fields_for("every day starting tomorrow until friday");
        assert_eq!(
            fields.start_date,
            NaiveDate::from_ymd_opt(2020, 4, 29).unwrap().and_hms_opt(9, 0, 0)
        );
        assert_eq!(
            fields.end_date,
            NaiveDate::from_ymd_opt(2020, 5, 1).unwrap().and_hms_opt(9, 0, 0)
        );
    }
}
