use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::super::domain::CandidateId;
use super::super::repository::StoreError;
use super::MutationBatch;

/// Opaque handle returned with an undoable confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UndoToken(Uuid);

impl UndoToken {
    pub(crate) fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for UndoToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for UndoToken {
    type Err = uuid::Error;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(raw.trim()).map(Self)
    }
}

/// The single open undo affordance: one committed batch and its deadline.
#[derive(Debug, Clone)]
pub struct UndoWindow {
    pub token: UndoToken,
    pub batch: MutationBatch,
    pub expires_at: DateTime<Utc>,
}

impl UndoWindow {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug, thiserror::Error)]
pub enum UndoError {
    #[error("nothing to undo")]
    NothingToUndo,
    #[error("undo token {0} does not match the open action")]
    UnknownToken(UndoToken),
    #[error("the undo window has closed")]
    Expired,
    #[error("undo could not restore {} candidate(s)", .failed.len())]
    Store {
        failed: Vec<CandidateId>,
        #[source]
        source: StoreError,
    },
}
