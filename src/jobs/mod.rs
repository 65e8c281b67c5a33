//! Job scheduling – identifiers, persistent service, trigger evaluation,
//! and the fire loop.

pub mod next_run;
pub mod runner;
pub mod service;
pub mod types;

use sha2::{Digest, Sha256};

use crate::parser::frequency::Frequency;

/// Build a job id from team, scheduling user, and a digest of what the job
/// does. Identical commands from the same user hash to the same id, so
/// re-issuing a command replaces the job instead of duplicating it.
pub fn make_job_id(
    team_id: &str,
    user_id: &str,
    task: &str,
    target: &str,
    frequency: &Frequency,
) -> String {
    let freq_repr = format!("{:?}", frequency);
    let digest = Sha256::digest(format!("{}{}{}", task, target, freq_repr).as_bytes());
    format!("{}-{}-{}", team_id, user_id, hex::encode(digest))
}
