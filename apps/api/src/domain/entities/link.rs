use std::collections::HashSet;

use chrono::NaiveDateTime;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct Link {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub url: String,
    pub position: i32,
    pub is_active: bool,
    pub clicks: i64,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReorderError {
    #[error("expected {expected} link ids, got {got}")]
    LengthMismatch { expected: usize, got: usize },

    #[error("link {0} appears more than once")]
    Duplicate(Uuid),

    #[error("link {0} does not belong to this profile")]
    Unknown(Uuid),
}

/// Checks that `requested` is a permutation of `current`.
///
/// Position `i` is assigned to `requested[i]`, so anything other than an exact
/// permutation would leave gaps or duplicate positions.
pub fn validate_reorder(current: &[Uuid], requested: &[Uuid]) -> Result<(), ReorderError> {
    if current.len() != requested.len() {
        return Err(ReorderError::LengthMismatch {
            expected: current.len(),
            got: requested.len(),
        });
    }

    let known: HashSet<&Uuid> = current.iter().collect();
    let mut seen: HashSet<&Uuid> = HashSet::with_capacity(requested.len());
    for id in requested {
        if !known.contains(id) {
            return Err(ReorderError::Unknown(*id));
        }
        if !seen.insert(id) {
            return Err(ReorderError::Duplicate(*id));
        }
    }

    Ok(())
}

/// True when the positions are exactly `0..n` in some order.
pub fn is_dense(positions: &[i32]) -> bool {
    let mut sorted = positions.to_vec();
    sorted.sort_unstable();
    sorted
        .iter()
        .enumerate()
        .all(|(i, p)| i32::try_from(i).is_ok_and(|i| i == *p))
}
