//! Job types – triggers, job records, runtime state, and the persistent store.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::parser::trigger::TriggerFields;

/// When a job fires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Trigger {
    /// Fire once at a wall-clock instant in the job's timezone.
    #[serde(rename_all = "camelCase")]
    Date { run_at: NaiveDateTime },
    /// Fire on every match of the cron-style field set.
    #[serde(rename_all = "camelCase")]
    Cron { fields: TriggerFields },
}

/// Runtime state of a job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobState {
    /// Next scheduled run time in milliseconds since epoch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_run_at_ms: Option<i64>,
    /// Last completed run time in milliseconds since epoch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_run_at_ms: Option<i64>,
    /// `"ok"` or `"error"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_status: Option<String>,
    /// Error message from the last run, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// A scheduled random pick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    /// `{team}-{user}-{digest}`, see `make_job_id`.
    pub id: String,
    pub team_id: String,
    /// User who scheduled the pick.
    pub user_id: String,
    /// Channel the announcement is posted to.
    pub channel_id: String,
    /// Channel (`C…`) or user group (`S…`) the pick draws from.
    pub target: String,
    pub task: String,
    /// IANA timezone name the trigger is evaluated in.
    pub timezone: String,
    pub trigger: Trigger,
    /// Members already picked in the current rotation cycle.
    #[serde(default)]
    pub previous_picks: Vec<String>,
    #[serde(default)]
    pub state: JobState,
    #[serde(default)]
    pub created_at_ms: i64,
}

/// Persistent store for jobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStore {
    #[serde(default = "default_version")]
    pub version: i32,
    #[serde(default)]
    pub jobs: Vec<Job>,
}

fn default_version() -> i32 {
    1
}

impl Default for JobStore {
    fn default() -> Self {
        Self {
            version: 1,
            jobs: Vec::new(),
        }
    }
}
