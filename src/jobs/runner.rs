//! The fire loop.
//!
//! Polls the job service on a fixed tick and executes due jobs one at a
//! time. Sequential execution is what guarantees the rotation invariant:
//! two fires of the same job can never race on its picked-set. Each fire
//! resolves the target's members, asks the picker for a selection, posts the
//! announcement, and hands the updated rotation state back to the service.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::jobs::service::JobService;
use crate::jobs::types::Job;
use crate::picker;
use crate::slack::client::SlackApi;
use crate::slack::format::format_picked_message;

pub struct JobRunner {
    jobs: Arc<Mutex<JobService>>,
    slack: Arc<dyn SlackApi>,
    tick: std::time::Duration,
}

impl JobRunner {
    pub fn new(
        jobs: Arc<Mutex<JobService>>,
        slack: Arc<dyn SlackApi>,
        tick: std::time::Duration,
    ) -> Self {
        Self { jobs, slack, tick }
    }

    /// Run forever, checking for due jobs on every tick.
    pub async fn run(&self) {
        let mut interval = tokio::time::interval(self.tick);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            self.tick_once(Utc::now()).await;
        }
    }

    /// Fire everything due at `now`.
    pub async fn tick_once(&self, now: DateTime<Utc>) {
        let due = { self.jobs.lock().await.due_jobs(now) };
        for job in due {
            match self.fire(&job).await {
                Ok(picked) => {
                    info!("Job {}: picked {}", job.id, picked.selected);
                    self.jobs
                        .lock()
                        .await
                        .record_run(&job.id, Some(picked.picks), now, None);
                }
                Err(e) => {
                    warn!("Job {} failed: {:#}", job.id, e);
                    self.jobs
                        .lock()
                        .await
                        .record_run(&job.id, None, now, Some(format!("{:#}", e)));
                }
            }
        }
    }

    async fn fire(&self, job: &Job) -> Result<FireOutcome> {
        let members = self
            .slack
            .members_of(&job.target)
            .await
            .context("membership lookup failed")?;
        let previous: HashSet<String> = job.previous_picks.iter().cloned().collect();
        let (selected, picks) = picker::pick_random(&members, &previous)?;

        let message = format_picked_message(&selected, &job.task)?;
        self.slack
            .post_message(&job.channel_id, &message)
            .await
            .context("failed to post pick announcement")?;

        Ok(FireOutcome {
            selected,
            picks: picks.into_iter().collect(),
        })
    }
}

struct FireOutcome {
    selected: String,
    picks: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::types::Trigger;
    use crate::parser::trigger::TriggerFields;
    use crate::slack::client::testing::MockSlack;
    use chrono::TimeZone;

    fn daily_job(id: &str, target: &str) -> Job {
        Job {
            id: id.to_string(),
            team_id: "T0007".to_string(),
            user_id: "U1337".to_string(),
            channel_id: "C1234".to_string(),
            target: target.to_string(),
            task: "play music".to_string(),
            timezone: "Europe/Berlin".to_string(),
            trigger: Trigger::Cron {
                fields: TriggerFields {
                    day_of_week: Some("*".to_string()),
                    hour: Some("9".to_string()),
                    minute: Some("0".to_string()),
                    ..TriggerFields::default()
                },
            },
            previous_picks: Vec::new(),
            state: Default::default(),
            created_at_ms: 0,
        }
    }

    fn runner_with(slack: Arc<MockSlack>) -> (JobRunner, Arc<Mutex<JobService>>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let jobs = Arc::new(Mutex::new(JobService::new(dir.path().join("jobs.json"))));
        let runner = JobRunner::new(jobs.clone(), slack, std::time::Duration::from_secs(30));
        (runner, jobs, dir)
    }

    fn hashed(seed: u8) -> String {
        format!("T0007-U1337-{}", hex::encode([seed; 32]))
    }

    #[tokio::test]
    async fn test_fire_posts_and_rotates() {
        let slack = Arc::new(MockSlack::new());
        let (runner, jobs, _dir) = runner_with(slack.clone());
        let id = hashed(1);
        let creation = Utc.with_ymd_and_hms(2020, 4, 28, 6, 20, 0).unwrap();
        {
            jobs.lock().await.add_job(daily_job(&id, "C012X7LEUSV"), creation);
        }

        // 07:00 UTC is 09:00 Berlin: due.
        let fire_time = Utc.with_ymd_and_hms(2020, 4, 28, 7, 0, 0).unwrap();
        runner.tick_once(fire_time).await;

        let posted = slack.posted.lock().unwrap().clone();
        assert_eq!(posted.len(), 1);
        assert_eq!(posted[0].0, "C1234");
        assert!(
            posted[0].1 == "<@U1> you have been picked to play music"
                || posted[0].1 == "<@U2> you have been picked to play music"
        );

        let job = jobs.lock().await.get_job(&id).unwrap();
        assert_eq!(job.previous_picks.len(), 1);
        assert_eq!(job.state.last_status.as_deref(), Some("ok"));
        // Next fire is the following day; not due again this tick.
        assert!(job.state.next_run_at_ms.unwrap() > fire_time.timestamp_millis());
    }

    #[tokio::test]
    async fn test_rotation_completes_across_fires() {
        let slack = Arc::new(MockSlack::new());
        let (runner, jobs, _dir) = runner_with(slack.clone());
        let id = hashed(2);
        let creation = Utc.with_ymd_and_hms(2020, 4, 28, 6, 20, 0).unwrap();
        {
            jobs.lock().await.add_job(daily_job(&id, "C012X7LEUSV"), creation);
        }

        // Fire on two consecutive days: both members get picked exactly once.
        for day in [28, 29] {
            let fire_time = Utc.with_ymd_and_hms(2020, 4, day, 7, 0, 0).unwrap();
            runner.tick_once(fire_time).await;
        }
        let posted = slack.posted.lock().unwrap().clone();
        assert_eq!(posted.len(), 2);
        assert_ne!(posted[0].1, posted[1].1);

        // The cycle reset leaves exactly the third pick in the state.
        let fire_time = Utc.with_ymd_and_hms(2020, 4, 30, 7, 0, 0).unwrap();
        runner.tick_once(fire_time).await;
        let job = jobs.lock().await.get_job(&id).unwrap();
        assert_eq!(job.previous_picks.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_fire_records_error_and_advances() {
        let slack = Arc::new(MockSlack {
            channel_members: Vec::new(), // empty pool: the pick must fail loudly
            ..MockSlack::new()
        });
        let (runner, jobs, _dir) = runner_with(slack.clone());
        let id = hashed(3);
        let creation = Utc.with_ymd_and_hms(2020, 4, 28, 6, 20, 0).unwrap();
        {
            jobs.lock().await.add_job(daily_job(&id, "C012X7LEUSV"), creation);
        }

        let fire_time = Utc.with_ymd_and_hms(2020, 4, 28, 7, 0, 0).unwrap();
        runner.tick_once(fire_time).await;

        assert!(slack.posted.lock().unwrap().is_empty());
        let job = jobs.lock().await.get_job(&id).unwrap();
        assert_eq!(job.state.last_status.as_deref(), Some("error"));
        // The trigger still advances so the job retries next fire.
        assert!(job.state.next_run_at_ms.unwrap() > fire_time.timestamp_millis());
    }
}
