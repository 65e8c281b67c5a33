//! Rotation-aware random selection.
//!
//! Picks one candidate uniformly at random, excluding everyone already picked
//! in the current rotation cycle. Once the whole pool has been picked the
//! cycle resets, so the pool never stays exhausted. The caller owns the
//! picked-set: it is taken and returned by value, and nothing is remembered
//! between calls.

use std::collections::HashSet;

use rand::Rng;
use thiserror::Error;

/// Errors from a pick attempt.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PickError {
    /// The candidate pool was empty. Membership resolution must never let
    /// this happen; it is a precondition failure, not a soft no-result.
    #[error("cannot pick from an empty candidate pool")]
    EmptyPool,
}

/// Pick one candidate from `pool`, skipping ids in `previous` until every
/// pool member has been picked once.
///
/// Returns the selection together with the updated picked-set the caller
/// must supply on the next call for the same job.
pub fn pick<R: Rng + ?Sized>(
    pool: &[String],
    previous: &HashSet<String>,
    rng: &mut R,
) -> Result<(String, HashSet<String>), PickError> {
    if pool.is_empty() {
        return Err(PickError::EmptyPool);
    }

    let remaining: Vec<&String> = pool.iter().filter(|id| !previous.contains(*id)).collect();

    // Cycle complete: everyone has been picked, start over.
    let (remaining, mut picked) = if remaining.is_empty() {
        (pool.iter().collect(), HashSet::new())
    } else {
        (remaining, previous.clone())
    };

    let selected = remaining[rng.random_range(0..remaining.len())].clone();
    picked.insert(selected.clone());
    Ok((selected, picked))
}

/// Like [`pick`], using the thread-local generator.
pub fn pick_random(
    pool: &[String],
    previous: &HashSet<String>,
) -> Result<(String, HashSet<String>), PickError> {
    pick(pool, previous, &mut rand::rng())
}
