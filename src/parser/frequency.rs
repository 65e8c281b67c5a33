//! Frequency phrase parsing.
//!
//! Classifies a trailing command phrase as either a one-shot date ("tomorrow
//! at 9am", "on Friday") or a recurrence ("every other wednesday at 2pm") and
//! resolves it against an explicit "now" anchor. The vocabulary is fixed;
//! anything outside it yields `None` and the caller falls back to help.
//!
//! Ambiguous dates always resolve into the future, and phrases that carry no
//! explicit time default to 09:00.

use std::sync::LazyLock;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Weekday};
use regex::Regex;

/// Result of parsing a frequency phrase.
#[derive(Debug, Clone, PartialEq)]
pub enum Frequency {
    /// A single future timestamp.
    Once(NaiveDateTime),
    /// A structured recurrence rule.
    Recurring(Recurrence),
}

/// Repetition granularity. Hourly and month-day/year-day phrases are
/// recognized by the parser but rejected: the downstream trigger format
/// cannot express them alongside day-of-week.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Minutely,
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

/// A recurrence rule extracted from an `every …` phrase.
#[derive(Debug, Clone, PartialEq)]
pub struct Recurrence {
    pub unit: Unit,
    /// Repeat every `interval` units (`every other week` -> 2).
    pub interval: u32,
    /// Weekdays the rule fires on, empty when unconstrained.
    pub weekdays: Vec<Weekday>,
    /// Month constraint (1-12), e.g. `every january`.
    pub month: Option<u32>,
    pub hour: Option<u32>,
    pub minute: Option<u32>,
    /// Optional bounds from `starting <date>` / `until <date>` clauses.
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
}

static TIME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\bat\s+(?:(?P<h>\d{1,2})(?::(?P<min>\d{2}))?\s*(?P<mer>am|pm)?|(?P<noon>noon)|(?P<mid>midnight))\b",
    )
    .unwrap()
});

static INTERVAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?P<n>\d{1,3})(?:st|nd|rd|th)?(?:\s+(?P<rest>.*))?$").unwrap());

static MONTH_DAY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:day\s+)?of\s+(?:the\s+)?month$").unwrap()
});

static YEAR_DAY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^day\s+of\s+(?:the\s+)?year$").unwrap()
});

static DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:(?P<wd>[a-z]+)\s+)?(?P<month>[a-z]+)\s+(?P<day>\d{1,2})(?:st|nd|rd|th)?$",
    )
    .unwrap()
});

/// Parse a frequency phrase. `now` anchors relative expressions.
pub fn parse_frequency(text: &str, now: NaiveDateTime) -> Option<Frequency> {
    let text = text.trim();
    if text.starts_with("every") {
        parse_recurrence(text, now).map(Frequency::Recurring)
    } else {
        parse_date(text, now).map(Frequency::Once)
    }
}

/// Parse an absolute-date phrase, resolving ambiguity into the future.
pub fn parse_date(text: &str, now: NaiveDateTime) -> Option<NaiveDateTime> {
    let (text, time) = extract_time(text)?;
    let lower = text.trim().to_lowercase();
    let core = lower
        .strip_prefix("on ")
        .or_else(|| lower.strip_prefix("next "))
        .unwrap_or(&lower)
        .trim();

    let today = now.date();
    let date = if core == "today" {
        today
    } else if core == "tomorrow" {
        today + Duration::days(1)
    } else if let Some(wd) = weekday_from_name(core) {
        today + Duration::days(days_until(today.weekday(), wd))
    } else {
        let caps = DATE_RE.captures(core)?;
        // A leading weekday name ("on Monday May 4th") is decorative.
        if let Some(wd) = caps.name("wd") {
            weekday_from_name(wd.as_str())?;
        }
        let month = month_from_name(&caps["month"])?;
        let day: u32 = caps["day"].parse().ok()?;
        let candidate = NaiveDate::from_ymd_opt(today.year(), month, day)?;
        if candidate < today {
            NaiveDate::from_ymd_opt(today.year() + 1, month, day)?
        } else {
            candidate
        }
    };

    let (hour, minute) = time.unwrap_or((9, 0));
    date.and_hms_opt(hour, minute, 0)
}

fn parse_recurrence(text: &str, now: NaiveDateTime) -> Option<Recurrence> {
    let (text, time) = extract_time(text)?;

    let (text, until) = split_clause(&text, " until ");
    let (text, starting) = split_clause(&text, " starting ");
    let end = match until {
        Some(phrase) => Some(parse_date(&phrase, now)?),
        None => None,
    };
    let start = match starting {
        Some(phrase) => Some(parse_date(&phrase, now)?),
        None => None,
    };

    let rest = text.trim().strip_prefix("every")?.trim().to_lowercase();
    let draft = parse_every_phrase(&rest)?;
    if draft.month_day || draft.year_day || draft.hourly {
        return None;
    }

    // No explicit time means 9am.
    let (hour, minute) = match time {
        Some((h, m)) => (Some(h), Some(m)),
        None => (Some(9), Some(0)),
    };

    Some(Recurrence {
        unit: draft.unit?,
        interval: draft.interval,
        weekdays: draft.weekdays,
        month: draft.month,
        hour,
        minute,
        start,
        end,
    })
}

#[derive(Default)]
struct Draft {
    unit: Option<Unit>,
    interval: u32,
    weekdays: Vec<Weekday>,
    month: Option<u32>,
    month_day: bool,
    year_day: bool,
    hourly: bool,
}

/// Parse the body of an `every …` phrase (lead word and time clause already
/// stripped, lowercased).
fn parse_every_phrase(rest: &str) -> Option<Draft> {
    let mut draft = Draft {
        interval: 1,
        ..Draft::default()
    };

    let mut body = rest.trim();
    if let Some(r) = body.strip_prefix("other ") {
        draft.interval = 2;
        body = r.trim();
    } else if let Some(caps) = INTERVAL_RE.captures(body) {
        let n: u32 = caps["n"].parse().ok()?;
        if n == 0 {
            return None;
        }
        match caps.name("rest").map(|m| m.as_str().trim()) {
            // Bare ordinal ("every 4th") means a day of the month.
            None | Some("") => {
                draft.month_day = true;
                return Some(draft);
            }
            Some(r) if MONTH_DAY_RE.is_match(r) => {
                draft.month_day = true;
                return Some(draft);
            }
            Some(r) if YEAR_DAY_RE.is_match(r) => {
                draft.year_day = true;
                return Some(draft);
            }
            Some(r) => {
                draft.interval = n;
                body = r;
            }
        }
    }

    match body {
        "day" | "days" => draft.unit = Some(Unit::Daily),
        "month" | "months" => draft.unit = Some(Unit::Monthly),
        "year" | "years" => draft.unit = Some(Unit::Yearly),
        "minute" | "minutes" => draft.unit = Some(Unit::Minutely),
        "hour" | "hours" => draft.hourly = true,
        "weekday" | "weekdays" => {
            draft.unit = Some(Unit::Weekly);
            draft.weekdays = vec![
                Weekday::Mon,
                Weekday::Tue,
                Weekday::Wed,
                Weekday::Thu,
                Weekday::Fri,
            ];
        }
        "weekend" | "weekends" => {
            draft.unit = Some(Unit::Weekly);
            draft.weekdays = vec![Weekday::Sat, Weekday::Sun];
        }
        _ => {
            if let Some(rest) = strip_week_prefix(body) {
                draft.unit = Some(Unit::Weekly);
                if let Some(days) = rest {
                    draft.weekdays = parse_weekday_list(days)?;
                }
            } else if let Some(days) = parse_weekday_list(body) {
                draft.unit = Some(Unit::Weekly);
                draft.weekdays = days;
            } else if let Some(caps) = DATE_RE.captures(body) {
                // "every january 5th" names a day of a month.
                month_from_name(&caps["month"])?;
                draft.month_day = true;
            } else if let Some(month) = month_from_name(body) {
                draft.unit = Some(Unit::Yearly);
                draft.month = Some(month);
            } else {
                return None;
            }
        }
    }

    Some(draft)
}

/// Match `week`, `weeks`, `week on monday`, `weeks on mon and fri`.
/// Returns the optional weekday clause.
fn strip_week_prefix(body: &str) -> Option<Option<&str>> {
    let rest = body.strip_prefix("weeks").or_else(|| body.strip_prefix("week"))?;
    let rest = rest.trim();
    if rest.is_empty() {
        Some(None)
    } else {
        rest.strip_prefix("on ").map(|days| Some(days.trim()))
    }
}

fn parse_weekday_list(text: &str) -> Option<Vec<Weekday>> {
    let normalized = text.replace(" and ", ",").replace('&', ",");
    let mut days = Vec::new();
    for token in normalized.split(',') {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        let day = weekday_from_name(token)?;
        if !days.contains(&day) {
            days.push(day);
        }
    }
    if days.is_empty() {
        None
    } else {
        Some(days)
    }
}

fn weekday_from_name(name: &str) -> Option<Weekday> {
    Some(match name.to_lowercase().as_str() {
        "monday" | "mon" => Weekday::Mon,
        "tuesday" | "tue" | "tues" => Weekday::Tue,
        "wednesday" | "wed" => Weekday::Wed,
        "thursday" | "thu" | "thur" | "thurs" => Weekday::Thu,
        "friday" | "fri" => Weekday::Fri,
        "saturday" | "sat" => Weekday::Sat,
        "sunday" | "sun" => Weekday::Sun,
        _ => return None,
    })
}

fn month_from_name(name: &str) -> Option<u32> {
    Some(match name.to_lowercase().as_str() {
        "january" | "jan" => 1,
        "february" | "feb" => 2,
        "march" | "mar" => 3,
        "april" | "apr" => 4,
        "may" => 5,
        "june" | "jun" => 6,
        "july" | "jul" => 7,
        "august" | "aug" => 8,
        "september" | "sep" | "sept" => 9,
        "october" | "oct" => 10,
        "november" | "nov" => 11,
        "december" | "dec" => 12,
        _ => return None,
    })
}

/// Days until the next occurrence of `target`, strictly in the future.
fn days_until(current: Weekday, target: Weekday) -> i64 {
    let diff = (i64::from(target.num_days_from_monday())
        - i64::from(current.num_days_from_monday()))
    .rem_euclid(7);
    if diff == 0 {
        7
    } else {
        diff
    }
}

/// Pull an `at <time>` clause out of the phrase. Returns the phrase without
/// the clause plus the parsed `(hour, minute)`, or `None` when the clause is
/// present but not a valid time of day.
fn extract_time(text: &str) -> Option<(String, Option<(u32, u32)>)> {
    let caps = match TIME_RE.captures(text) {
        Some(c) => c,
        None => return Some((text.to_string(), None)),
    };

    let time = if caps.name("noon").is_some() {
        (12, 0)
    } else if caps.name("mid").is_some() {
        (0, 0)
    } else {
        let hour: u32 = caps["h"].parse().ok()?;
        let minute: u32 = match caps.name("min") {
            Some(m) => m.as_str().parse().ok()?,
            None => 0,
        };
        let hour = match caps.name("mer").map(|m| m.as_str().to_lowercase()) {
            Some(mer) if mer == "pm" => {
                if hour == 12 {
                    12
                } else {
                    hour + 12
                }
            }
            Some(_) => {
                // am
                if hour == 12 {
                    0
                } else {
                    hour
                }
            }
            None => hour,
        };
        if hour > 23 || minute > 59 {
            return None;
        }
        (hour, minute)
    };

    let span = caps.get(0)?;
    let mut without = String::new();
    without.push_str(&text[..span.start()]);
    without.push(' ');
    without.push_str(&text[span.end()..]);
    Some((without.trim().to_string(), Some(time)))
}

fn split_clause(text: &str, marker: &str) -> (String, Option<String>) {
    match text.find(marker) {
        Some(idx) => (
            text[..idx].trim().to_string(),
            Some(text[idx + marker.len()..].trim().to_string()),
        ),
        None => (text.to_string(), None),
    }
}
