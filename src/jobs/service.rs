//! Job service with file-based persistence.
//!
//! Owns the job store and all mutations to it. Created once at startup and
//! passed explicitly to the server and the runner; there is no process-wide
//! scheduler handle.

use std::path::PathBuf;
use std::sync::LazyLock;

use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::Tz;
use regex::Regex;
use tracing::{info, warn};

use crate::jobs::next_run::next_occurrence;
use crate::jobs::types::{Job, JobStore, Trigger};

static JOB_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?P<team>[A-Z0-9]+)-(?P<user>U[A-Z0-9]+)-[a-f0-9]{64}$").unwrap());

/// Service that manages scheduled picks with file-based persistence.
pub struct JobService {
    store_path: PathBuf,
    store: JobStore,
}

impl JobService {
    /// Create a new `JobService` backed by the given store file.
    pub fn new(store_path: PathBuf) -> Self {
        let store = if store_path.exists() {
            std::fs::read_to_string(&store_path)
                .ok()
                .and_then(|c| serde_json::from_str(&c).ok())
                .unwrap_or_default()
        } else {
            JobStore::default()
        };
        Self { store_path, store }
    }

    /// Add a job, computing its first fire time. A job with the same id is
    /// replaced – identical commands deduplicate rather than stack up.
    pub fn add_job(&mut self, mut job: Job, now: DateTime<Utc>) -> Job {
        job.created_at_ms = now.timestamp_millis();
        job.state.next_run_at_ms = compute_next_run(&job, now);
        self.store.jobs.retain(|j| j.id != job.id);
        self.store.jobs.push(job.clone());
        self.persist();
        info!("Jobs: added {} ({:?})", job.id, job.task);
        job
    }

    /// All jobs in the store.
    pub fn list_jobs(&self) -> Vec<Job> {
        self.store.jobs.clone()
    }

    /// Jobs for a team, optionally narrowed to one scheduling user. Ids that
    /// do not match the expected shape are ignored.
    pub fn jobs_for(&self, team_id: &str, user_id: Option<&str>) -> Vec<Job> {
        self.store
            .jobs
            .iter()
            .filter(|job| {
                let caps = match JOB_ID_RE.captures(&job.id) {
                    Some(c) => c,
                    None => return false,
                };
                &caps["team"] == team_id
                    && user_id.map(|u| &caps["user"] == u).unwrap_or(true)
            })
            .cloned()
            .collect()
    }

    /// Look up a job by id.
    pub fn get_job(&self, job_id: &str) -> Option<Job> {
        self.store.jobs.iter().find(|j| j.id == job_id).cloned()
    }

    /// Remove a job by id. Returns `true` if a job was removed.
    pub fn remove_job(&mut self, job_id: &str) -> bool {
        let before = self.store.jobs.len();
        self.store.jobs.retain(|j| j.id != job_id);
        let removed = self.store.jobs.len() < before;
        if removed {
            self.persist();
            info!("Jobs: removed {}", job_id);
        }
        removed
    }

    /// Jobs whose next fire time has arrived.
    pub fn due_jobs(&self, now: DateTime<Utc>) -> Vec<Job> {
        let now_ms = now.timestamp_millis();
        self.store
            .jobs
            .iter()
            .filter(|j| j.state.next_run_at_ms.map(|ms| ms <= now_ms).unwrap_or(false))
            .cloned()
            .collect()
    }

    /// Record the outcome of a fire: persist the rotation state returned by
    /// the picker and advance the trigger. One-shot date jobs are removed.
    pub fn record_run(
        &mut self,
        job_id: &str,
        picks: Option<Vec<String>>,
        now: DateTime<Utc>,
        error: Option<String>,
    ) {
        let job = match self.store.jobs.iter_mut().find(|j| j.id == job_id) {
            Some(j) => j,
            None => return,
        };

        if matches!(job.trigger, Trigger::Date { .. }) {
            let id = job.id.clone();
            self.store.jobs.retain(|j| j.id != id);
            self.persist();
            info!("Jobs: one-shot {} completed and removed", id);
            return;
        }

        if let Some(picks) = picks {
            job.previous_picks = picks;
        }
        job.state.last_run_at_ms = Some(now.timestamp_millis());
        match error {
            Some(message) => {
                job.state.last_status = Some("error".to_string());
                job.state.last_error = Some(message);
            }
            None => {
                job.state.last_status = Some("ok".to_string());
                job.state.last_error = None;
            }
        }
        job.state.next_run_at_ms = compute_next_run(job, now);
        self.persist();
    }

    /// Fill in missing next-run times, e.g. after loading an old store.
    pub fn refresh_next_runs(&mut self, now: DateTime<Utc>) {
        let mut changed = false;
        for job in &mut self.store.jobs {
            if job.state.next_run_at_ms.is_none() {
                job.state.next_run_at_ms = compute_next_run(job, now);
                changed = job.state.next_run_at_ms.is_some() || changed;
            }
        }
        if changed {
            self.persist();
        }
    }

    /// Serialize the current store to disk.
    fn persist(&self) {
        if let Some(parent) = self.store_path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        match serde_json::to_string_pretty(&self.store) {
            Ok(json) => {
                if let Err(e) = std::fs::write(&self.store_path, json) {
                    warn!("Failed to persist job store: {}", e);
                }
            }
            Err(e) => warn!("Failed to serialize job store: {}", e),
        }
    }
}

/// Next fire time for a job, in epoch milliseconds. An unparseable timezone
/// falls back to UTC with a warning; an exhausted trigger yields `None`.
fn compute_next_run(job: &Job, now: DateTime<Utc>) -> Option<i64> {
    let tz: Tz = match job.timezone.parse() {
        Ok(tz) => tz,
        Err(_) => {
            warn!("Job {}: unknown timezone {:?}, using UTC", job.id, job.timezone);
            chrono_tz::UTC
        }
    };
    match &job.trigger {
        Trigger::Date { run_at } => tz
            .from_local_datetime(run_at)
            .earliest()
            .map(|dt| dt.timestamp_millis()),
        Trigger::Cron { fields } => match next_occurrence(fields, now.with_timezone(&tz)) {
            Ok(next) => next.map(|dt| dt.timestamp_millis()),
            Err(e) => {
                warn!("Job {}: invalid trigger fields: {:#}", job.id, e);
                None
            }
        },
    }
}
