use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::super::domain::{Candidate, CandidateId, CandidatePatch, ReviewerId};
use super::super::stage::Stage;

/// Prior value of whatever a command is about to overwrite.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "field", rename_all = "snake_case")]
pub enum FieldSnapshot {
    Stage {
        stage: Stage,
        stage_changed_at: DateTime<Utc>,
    },
    Tags {
        tags: BTreeSet<String>,
    },
    Reviewer {
        reviewer: Option<ReviewerId>,
    },
    Archived {
        is_archived: bool,
    },
    /// Whole record, ratings and notes included, plus where it sat in the collection.
    Record {
        candidate: Box<Candidate>,
        position: usize,
    },
}

impl FieldSnapshot {
    /// Patch that writes the prior values back; `None` for deleted records.
    pub fn restore_patch(&self) -> Option<CandidatePatch> {
        let patch = match self {
            FieldSnapshot::Stage {
                stage,
                stage_changed_at,
            } => CandidatePatch {
                stage: Some(*stage),
                stage_changed_at: Some(*stage_changed_at),
                ..CandidatePatch::default()
            },
            FieldSnapshot::Tags { tags } => CandidatePatch {
                tags: Some(tags.clone()),
                ..CandidatePatch::default()
            },
            FieldSnapshot::Reviewer { reviewer } => CandidatePatch {
                assigned_reviewer: Some(reviewer.clone()),
                ..CandidatePatch::default()
            },
            FieldSnapshot::Archived { is_archived } => CandidatePatch {
                is_archived: Some(*is_archived),
                ..CandidatePatch::default()
            },
            FieldSnapshot::Record { .. } => return None,
        };
        Some(patch)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapshotEntry {
    pub id: CandidateId,
    pub prior: FieldSnapshot,
}

/// Everything needed to reverse one committed batch exactly.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UndoSnapshot {
    entries: Vec<SnapshotEntry>,
}

impl UndoSnapshot {
    pub fn push(&mut self, id: CandidateId, prior: FieldSnapshot) {
        self.entries.push(SnapshotEntry { id, prior });
    }

    pub fn entries(&self) -> &[SnapshotEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &CandidateId> {
        self.entries.iter().map(|entry| &entry.id)
    }
}

/// Re-applies the captured values to the local collection. Deleted records go back
/// to their original positions, lowest position first.
pub(crate) fn restore_local(entries: &[&SnapshotEntry], candidates: &mut Vec<Candidate>) {
    let mut records: Vec<(&Candidate, usize)> = Vec::new();

    for entry in entries {
        match &entry.prior {
            FieldSnapshot::Record {
                candidate,
                position,
            } => records.push((candidate.as_ref(), *position)),
            prior => {
                if let (Some(patch), Some(current)) = (
                    prior.restore_patch(),
                    candidates.iter_mut().find(|candidate| candidate.id == entry.id),
                ) {
                    patch.apply_to(current);
                }
            }
        }
    }

    records.sort_by_key(|(_, position)| *position);
    for (record, position) in records {
        if candidates.iter().any(|candidate| candidate.id == record.id) {
            continue;
        }
        let index = position.min(candidates.len());
        candidates.insert(index, record.clone());
    }
}
