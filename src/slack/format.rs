//! Message and Block Kit formatting.

use serde_json::{json, Value};

use crate::jobs::types::{Job, Trigger};
use crate::parser::trigger::TriggerFields;
use crate::slack::{mention, UnknownIdentifier};

pub const COMMAND_NAME: &str = "/pickrandom";

/// Action ids carried on interactive buttons.
pub const ACTION_REMOVE_JOB: &str = "REMOVE_JOB";
pub const ACTION_CLOSE: &str = "CLOSE";

pub const HELP: &str = concat!(
    "*Example usage:*\n\n",
    "_/pickrandom_ @group to do something\n",
    "_/pickrandom_ @group to do something every day at 9am\n",
    "_/pickrandom_ @group to do something on Monday at 9am\n",
    "_/pickrandom_ #channel to do something\n",
    "_/pickrandom_ list\n",
);

const KEY_THIS_CHANNEL: &str = "In this channel";
const KEY_OTHER_CHANNEL: &str = "Other channels";
const KEY_USER_GROUPS: &str = "User groups";

/// The announcement posted when someone is picked.
pub fn format_picked_message(user: &str, task: &str) -> Result<String, UnknownIdentifier> {
    Ok(format!("{} you have been picked to {}", mention(user)?, task))
}

/// Confirmation shown after a pick is scheduled.
pub fn format_scheduled_confirmation(
    target: &str,
    task: &str,
    trigger: &Trigger,
) -> Result<String, UnknownIdentifier> {
    Ok(format!(
        "OK, I will pick someone from {} to {} {}",
        mention(target)?,
        task,
        describe_trigger(trigger)
    ))
}

/// Block Kit rendering of a user's scheduled picks.
pub fn format_scheduled_jobs(channel: &str, jobs: &[Job]) -> Result<Value, UnknownIdentifier> {
    if jobs.is_empty() {
        return Ok(json!({
            "blocks": [
                {
                    "type": "section",
                    "text": {
                        "type": "plain_text",
                        "text": "You haven't configured any random picks.",
                    },
                },
                close_block(),
            ]
        }));
    }

    let mut blocks = Vec::new();
    for (category, job_list) in split_jobs_by_category(channel, jobs) {
        if job_list.is_empty() {
            continue;
        }
        blocks.push(json!({
            "type": "section",
            "text": { "type": "mrkdwn", "text": format!("*{}*", category) },
        }));
        for job in job_list {
            blocks.push(json!({
                "type": "section",
                "text": {
                    "type": "mrkdwn",
                    "text": format!(
                        "_{}_ {} to {} {}",
                        COMMAND_NAME,
                        mention(&job.target)?,
                        job.task,
                        describe_trigger(&job.trigger)
                    ),
                },
                "accessory": {
                    "type": "button",
                    "style": "danger",
                    "text": { "type": "plain_text", "text": "Remove" },
                    "value": job.id,
                    "action_id": ACTION_REMOVE_JOB,
                },
            }));
        }
    }
    blocks.push(close_block());

    Ok(json!({ "blocks": blocks }))
}

/// The trailing Close button on every list.
pub fn close_block() -> Value {
    json!({
        "type": "actions",
        "elements": [
            {
                "type": "button",
                "text": { "type": "plain_text", "text": "Close" },
                "action_id": ACTION_CLOSE,
            },
        ],
    })
}

/// Group jobs into this-channel / other-channels / user-groups buckets,
/// each sorted by target.
fn split_jobs_by_category<'a>(channel: &str, jobs: &'a [Job]) -> Vec<(&'static str, Vec<&'a Job>)> {
    let mut this_channel = Vec::new();
    let mut other_channels = Vec::new();
    let mut user_groups = Vec::new();

    for job in jobs {
        if job.target == channel {
            this_channel.push(job);
        } else if job.target.starts_with('C') {
            other_channels.push(job);
        } else if job.target.starts_with('S') {
            user_groups.push(job);
        }
    }
    let mut output = vec![
        (KEY_THIS_CHANNEL, this_channel),
        (KEY_OTHER_CHANNEL, other_channels),
        (KEY_USER_GROUPS, user_groups),
    ];
    for (_, list) in &mut output {
        list.sort_by(|a, b| a.target.cmp(&b.target));
    }
    output
}

/// Human-readable trigger description.
///
/// Recurring triggers read "at <time>, every <days>[, every <nth> week]";
/// one-shot triggers read "on <weekday> <month> <day> at <time>".
pub fn describe_trigger(trigger: &Trigger) -> String {
    match trigger {
        Trigger::Date { run_at } => run_at.format("on %A %B %-d at %I:%M %p").to_string(),
        Trigger::Cron { fields } => describe_cron(fields),
    }
}

fn describe_cron(fields: &TriggerFields) -> String {
    let mut description = time_clause(fields);

    let day_clause = match fields.day_of_week.as_deref() {
        None | Some("*") => "every day".to_string(),
        Some(value) => match value.strip_prefix("*/") {
            Some(n) => format!("every {} days", n),
            None => format!("every {}", join_names(value)),
        },
    };
    description.push_str(", ");
    description.push_str(&day_clause);

    if let Some(n) = step_of(&fields.week) {
        let ordinal = if n == 2 {
            "other".to_string()
        } else {
            format_ordinal(n)
        };
        description.push_str(&format!(", every {} week", ordinal));
    }
    if let Some(n) = step_of(&fields.month) {
        description.push_str(&format!(", every {} months", n));
    }
    if let Some(n) = step_of(&fields.year) {
        description.push_str(&format!(", every {} years", n));
    }

    description
}

fn time_clause(fields: &TriggerFields) -> String {
    let minute = fields.minute.as_deref().unwrap_or("0");
    if minute == "*" {
        return "every minute".to_string();
    }
    if let Some(n) = minute.strip_prefix("*/") {
        return format!("every {} minutes", n);
    }

    let hour: u32 = fields
        .hour
        .as_deref()
        .and_then(|h| h.parse().ok())
        .unwrap_or(0);
    let minute: u32 = minute.parse().unwrap_or(0);
    let (hour12, meridiem) = match hour {
        0 => (12, "AM"),
        1..=11 => (hour, "AM"),
        12 => (12, "PM"),
        _ => (hour - 12, "PM"),
    };
    format!("at {:02}:{:02} {}", hour12, minute, meridiem)
}

fn step_of(field: &Option<String>) -> Option<u32> {
    field
        .as_deref()
        .and_then(|v| v.strip_prefix("*/"))
        .and_then(|n| n.parse().ok())
}

/// "mon,wed" -> "Monday and Wednesday".
fn join_names(value: &str) -> String {
    let names: Vec<&str> = value.split(',').map(display_weekday).collect();
    match names.as_slice() {
        [] => String::new(),
        [one] => (*one).to_string(),
        [init @ .., last] => format!("{} and {}", init.join(", "), last),
    }
}

fn display_weekday(code: &str) -> &'static str {
    match code.trim() {
        "mon" => "Monday",
        "tue" => "Tuesday",
        "wed" => "Wednesday",
        "thu" => "Thursday",
        "fri" => "Friday",
        "sat" => "Saturday",
        "sun" => "Sunday",
        _ => "?",
    }
}

/// 1 -> "1st", 2 -> "2nd", 11 -> "11th", 23 -> "23rd".
pub fn format_ordinal(number: u32) -> String {
    let suffix = match (number % 10, number % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{}{}", number, suffix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn cron(day_of_week: Option<&str>, week: Option<&str>, hour: &str, minute: &str) -> Trigger {
        Trigger::Cron {
            fields: TriggerFields {
                day_of_week: day_of_week.map(|s| s.to_string()),
                week: week.map(|s| s.to_string()),
                hour: Some(hour.to_string()),
                minute: Some(minute.to_string()),
                ..TriggerFields::default()
            },
        }
    }

    fn job(id: &str, target: &str) -> Job {
        Job {
            id: id.to_string(),
            team_id: "T0007".to_string(),
            user_id: "U1337".to_string(),
            channel_id: "C1234".to_string(),
            target: target.to_string(),
            task: "play music".to_string(),
            timezone: "Europe/Berlin".to_string(),
            trigger: cron(Some("*"), None, "9", "0"),
            previous_picks: Vec::new(),
            state: Default::default(),
            created_at_ms: 0,
        }
    }

    #[test]
    fn test_describe_daily() {
        assert_eq!(
            describe_trigger(&cron(Some("*"), None, "9", "0")),
            "at 09:00 AM, every day"
        );
    }

    #[test]
    fn test_describe_weekly() {
        assert_eq!(
            describe_trigger(&cron(Some("mon"), Some("*"), "9", "0")),
            "at 09:00 AM, every Monday"
        );
    }

    #[test]
    fn test_describe_weekday_list() {
        assert_eq!(
            describe_trigger(&cron(Some("fri,sun"), Some("*"), "14", "0")),
            "at 02:00 PM, every Friday and Sunday"
        );
    }

    #[test]
    fn test_describe_biweekly() {
        assert_eq!(
            describe_trigger(&cron(Some("wed"), Some("*/2"), "14", "0")),
            "at 02:00 PM, every Wednesday, every other week"
        );
        assert_eq!(
            describe_trigger(&cron(Some("wed"), Some("*/3"), "14", "0")),
            "at 02:00 PM, every Wednesday, every 3rd week"
        );
    }

    #[test]
    fn test_describe_date() {
        let run_at = NaiveDate::from_ymd_opt(2020, 5, 4)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        assert_eq!(
            describe_trigger(&Trigger::Date { run_at }),
            "on Monday May 4 at 09:00 AM"
        );
    }

    #[test]
    fn test_picked_message() {
        assert_eq!(
            format_picked_message("U1", "play music").unwrap(),
            "<@U1> you have been picked to play music"
        );
        assert!(format_picked_message("X1", "play music").is_err());
    }

    #[test]
    fn test_format_ordinal() {
        assert_eq!(format_ordinal(1), "1st");
        assert_eq!(format_ordinal(2), "2nd");
        assert_eq!(format_ordinal(3), "3rd");
        assert_eq!(format_ordinal(4), "4th");
        assert_eq!(format_ordinal(11), "11th");
        assert_eq!(format_ordinal(12), "12th");
        assert_eq!(format_ordinal(13), "13th");
        assert_eq!(format_ordinal(21), "21st");
        assert_eq!(format_ordinal(102), "102nd");
    }

    #[test]
    fn test_empty_job_list_blocks() {
        let blocks = format_scheduled_jobs("C1234", &[]).unwrap();
        let rendered = blocks["blocks"].as_array().unwrap();
        assert_eq!(rendered.len(), 2);
        assert_eq!(
            rendered[0]["text"]["text"],
            "You haven't configured any random picks."
        );
        assert_eq!(rendered[1]["elements"][0]["action_id"], ACTION_CLOSE);
    }

    #[test]
    fn test_job_list_categories_and_buttons() {
        let jobs = vec![
            job("T0007-U1337-aaa", "S013R9HGXJ5"),
            job("T0007-U1337-bbb", "C012X7LEUSV"),
            job("T0007-U1337-ccc", "C1234"),
        ];
        let blocks = format_scheduled_jobs("C1234", &jobs).unwrap();
        let rendered = blocks["blocks"].as_array().unwrap();

        // Header + row per non-empty category, then the Close block.
        assert_eq!(rendered[0]["text"]["text"], "*In this channel*");
        assert_eq!(rendered[2]["text"]["text"], "*Other channels*");
        assert_eq!(
            rendered[3]["text"]["text"],
            "_/pickrandom_ <#C012X7LEUSV> to play music at 09:00 AM, every day"
        );
        assert_eq!(rendered[3]["accessory"]["value"], "T0007-U1337-bbb");
        assert_eq!(rendered[3]["accessory"]["action_id"], ACTION_REMOVE_JOB);
        assert_eq!(rendered[4]["text"]["text"], "*User groups*");
        assert_eq!(rendered.last().unwrap()["elements"][0]["action_id"], ACTION_CLOSE);
    }
}
