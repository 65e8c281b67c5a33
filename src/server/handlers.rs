//! Command and action dispatch.
//!
//! Pure application logic over [`AppState`]; the HTTP shells in
//! `server::mod` only verify signatures and decode bodies before calling in
//! here. Anything a user can get wrong degrades to the help reply; only
//! broken data (unknown id namespaces, Slack API failures) propagates as an
//! error.

use std::collections::HashSet;

use anyhow::Result;
use chrono::Utc;
use chrono_tz::Tz;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::jobs::types::{Job, Trigger};
use crate::jobs::make_job_id;
use crate::parser;
use crate::parser::frequency::{parse_frequency, Frequency};
use crate::parser::trigger::to_trigger_fields;
use crate::picker;
use crate::server::AppState;
use crate::slack::format::{
    format_picked_message, format_scheduled_confirmation, format_scheduled_jobs,
    ACTION_CLOSE, ACTION_REMOVE_JOB,
};

/// Decoded `/slashcommand` form body.
#[derive(Debug, Clone)]
pub struct SlashForm {
    pub text: String,
    pub user_id: String,
    pub channel_id: String,
    pub team_id: String,
}

/// What a slash command produces.
#[derive(Debug, PartialEq)]
pub enum Reply {
    /// Fixed usage text, for anything we could not understand.
    Help,
    Text(String),
    Blocks(Value),
    Empty,
}

/// Handle one slash command.
pub async fn handle_slash(state: &AppState, form: &SlashForm) -> Result<Reply> {
    let text = form.text.trim();
    info!("Incoming command {:?}", text);

    if parser::is_help_command(text) {
        return Ok(Reply::Help);
    }
    if parser::is_list_command(text) {
        let user = if parser::is_list_all_command(text) {
            None
        } else {
            Some(form.user_id.as_str())
        };
        let jobs = state.jobs.lock().await.jobs_for(&form.team_id, user);
        return Ok(Reply::Blocks(format_scheduled_jobs(&form.channel_id, &jobs)?));
    }

    let command = match parser::parse_command(text) {
        Some(command) => command,
        None => return Ok(Reply::Help),
    };

    // Resolving members up front also validates the target's namespace.
    let members = state.slack.members_of(&command.target).await?;

    let frequency_text = match &command.frequency {
        Some(frequency_text) => frequency_text,
        None => {
            // No schedule: pick right away and announce in the channel.
            let (selected, _) = picker::pick_random(&members, &HashSet::new())?;
            let message = format_picked_message(&selected, &command.task)?;
            state.slack.post_message(&form.channel_id, &message).await?;
            return Ok(Reply::Empty);
        }
    };

    let timezone = user_timezone(state, &form.user_id).await;
    let tz: Tz = timezone.parse().unwrap_or(chrono_tz::UTC);
    let now_local = Utc::now().with_timezone(&tz).naive_local();

    let frequency = match parse_frequency(frequency_text, now_local) {
        Some(frequency) => frequency,
        None => return Ok(Reply::Help),
    };

    let trigger = match &frequency {
        Frequency::Once(run_at) => Trigger::Date { run_at: *run_at },
        Frequency::Recurring(rec) => Trigger::Cron {
            fields: to_trigger_fields(rec),
        },
    };
    let confirmation = format_scheduled_confirmation(&command.target, &command.task, &trigger)?;

    let job = Job {
        id: make_job_id(
            &form.team_id,
            &form.user_id,
            &command.task,
            &command.target,
            &frequency,
        ),
        team_id: form.team_id.clone(),
        user_id: form.user_id.clone(),
        channel_id: form.channel_id.clone(),
        target: command.target.clone(),
        task: command.task.clone(),
        timezone,
        trigger,
        previous_picks: Vec::new(),
        state: Default::default(),
        created_at_ms: 0,
    };
    state.jobs.lock().await.add_job(job, Utc::now());

    Ok(Reply::Text(confirmation))
}

/// Handle a block-actions payload. The HTTP reply is always `OK`; effects
/// are delivered through the payload's `response_url`.
pub async fn handle_action(state: &AppState, payload: &Value) -> Result<()> {
    let team_id = string_at(payload, "/team/id");
    let user_id = string_at(payload, "/user/id");
    let channel_id = string_at(payload, "/channel/id");
    let response_url = string_at(payload, "/response_url");

    let actions = payload
        .get("actions")
        .and_then(|v| v.as_array())
        .map(|a| a.as_slice())
        .unwrap_or(&[]);

    for action in actions {
        let action_id = action.get("action_id").and_then(|v| v.as_str()).unwrap_or("");
        match action_id {
            ACTION_REMOVE_JOB => {
                let job_id = action.get("value").and_then(|v| v.as_str()).unwrap_or("");
                let removed = {
                    let mut jobs = state.jobs.lock().await;
                    // Only the owner's own jobs are removable.
                    let owned = jobs
                        .get_job(job_id)
                        .map(|job| job.team_id == team_id && job.user_id == user_id)
                        .unwrap_or(false);
                    owned && jobs.remove_job(job_id)
                };
                if removed {
                    let remaining = state.jobs.lock().await.jobs_for(&team_id, Some(&user_id));
                    let blocks = format_scheduled_jobs(&channel_id, &remaining)?;
                    state.slack.respond(&response_url, &blocks).await?;
                }
            }
            ACTION_CLOSE => {
                state
                    .slack
                    .respond(&response_url, &json!({ "delete_original": "true" }))
                    .await?;
            }
            other => {
                warn!("Ignoring unknown action {:?}", other);
            }
        }
    }
    Ok(())
}

async fn user_timezone(state: &AppState, user_id: &str) -> String {
    match state.slack.user_timezone(user_id).await {
        Ok(tz) => tz,
        Err(e) => {
            warn!(
                "Cannot read timezone for {}: {:#}; using default",
                user_id, e
            );
            state.config.scheduler.default_timezone.clone()
        }
    }
}

fn string_at(payload: &Value, pointer: &str) -> String {
    payload
        .pointer(pointer)
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string()
}
