//! Bulk commands over the current selection.
//!
//! A mutating command runs as one two-phase batch: every store write is issued first,
//! and only when all of them succeed is the local collection updated and the batch
//! marked committed. A partial store failure compensates the writes that did land,
//! leaves the local collection untouched, and reports exactly which records failed.
//! Committed batches keep their snapshot in a single undo window.

mod export;
mod snapshot;
mod undo;

pub use export::{render as render_export, ExportError, ExportFile, ExportFormat, EXPORT_HEADERS};
pub use snapshot::{FieldSnapshot, SnapshotEntry, UndoSnapshot};
pub use undo::{UndoError, UndoToken, UndoWindow};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::domain::{Candidate, CandidateId, CandidatePatch, ReviewerId};
use super::repository::{CandidateStore, Notification, StoreError};
use super::selection::SelectionSet;
use super::stage::{self, Stage};
use crate::config::PipelineConfig;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum BulkCommand {
    MoveToStage { stage: Stage },
    AddTag { tag: String },
    RemoveTag { tag: String },
    AssignReviewer { reviewer: ReviewerId },
    Archive,
    Delete,
    Export { format: ExportFormat },
    Notify,
}

impl BulkCommand {
    /// Export and notify never touch the store and never open an undo window.
    pub fn is_read_only(&self) -> bool {
        matches!(self, Self::Export { .. } | Self::Notify)
    }

    pub fn verb(&self) -> &'static str {
        match self {
            Self::MoveToStage { .. } => "move",
            Self::AddTag { .. } => "tag",
            Self::RemoveTag { .. } => "untag",
            Self::AssignReviewer { .. } => "assign",
            Self::Archive => "archive",
            Self::Delete => "delete",
            Self::Export { .. } => "export",
            Self::Notify => "email",
        }
    }

    /// Trims free-text arguments and rejects blank ones before any store call.
    pub fn normalized(&self) -> Result<Self, BulkError> {
        match self {
            Self::AddTag { tag } | Self::RemoveTag { tag } => {
                let tag = tag.trim();
                if tag.is_empty() {
                    return Err(BulkError::BlankTag);
                }
                Ok(match self {
                    Self::AddTag { .. } => Self::AddTag {
                        tag: tag.to_string(),
                    },
                    _ => Self::RemoveTag {
                        tag: tag.to_string(),
                    },
                })
            }
            Self::AssignReviewer { reviewer } => {
                let trimmed = reviewer.0.trim();
                if trimmed.is_empty() {
                    return Err(BulkError::BlankReviewer);
                }
                Ok(Self::AssignReviewer {
                    reviewer: ReviewerId(trimmed.to_string()),
                })
            }
            other => Ok(other.clone()),
        }
    }

    /// Prompt the caller must accept before the command runs, if any.
    pub fn confirmation(&self, count: usize, undo_window: Duration) -> Option<ConfirmationRequest> {
        match self {
            Self::MoveToStage { stage } if stage.is_sensitive() => Some(ConfirmationRequest {
                kind: ConfirmationKind::SensitiveStage,
                prompt: format!(
                    "Are you sure you want to move {count} candidate(s) to \"{}\"?",
                    stage.label()
                ),
            }),
            Self::Archive => Some(ConfirmationRequest {
                kind: ConfirmationKind::Destructive,
                prompt: format!(
                    "Archive {count} candidate(s)? They will be hidden from the pipeline. \
                     You can undo this for {} seconds.",
                    undo_window.num_seconds()
                ),
            }),
            Self::Delete => Some(ConfirmationRequest {
                kind: ConfirmationKind::Destructive,
                prompt: format!(
                    "Permanently delete {count} candidate(s)? Their ratings and notes will be \
                     deleted as well. This cannot be reversed once the {}-second undo window closes.",
                    undo_window.num_seconds()
                ),
            }),
            _ => None,
        }
    }

    pub fn success_message(&self, count: usize) -> String {
        match self {
            Self::MoveToStage { stage } => {
                format!("Moved {count} candidate(s) to {}.", stage.label())
            }
            Self::AddTag { tag } => format!("Added tag \"{tag}\" to {count} candidate(s)."),
            Self::RemoveTag { tag } => {
                format!("Removed tag \"{tag}\" from {count} candidate(s).")
            }
            Self::AssignReviewer { reviewer } => {
                format!("Assigned {reviewer} to {count} candidate(s).")
            }
            Self::Archive => format!("Archived {count} candidate(s)."),
            Self::Delete => format!("Deleted {count} candidate(s)."),
            Self::Export { .. } => format!("Exported {count} candidate(s)."),
            Self::Notify => format!("Prepared an email to {count} candidate(s)."),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmationKind {
    SensitiveStage,
    Destructive,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfirmationRequest {
    pub kind: ConfirmationKind,
    pub prompt: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchPhase {
    Pending,
    Committed,
    RolledBack,
}

/// Two-phase record of one mutating command.
#[derive(Debug, Clone)]
pub struct MutationBatch {
    pub command: BulkCommand,
    pub phase: BatchPhase,
    pub snapshot: UndoSnapshot,
    pub started_at: DateTime<Utc>,
}

impl MutationBatch {
    fn pending(command: BulkCommand, started_at: DateTime<Utc>) -> Self {
        Self {
            command,
            phase: BatchPhase::Pending,
            snapshot: UndoSnapshot::default(),
            started_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BulkArtifact {
    Export(ExportFile),
    Recipients { emails: Vec<String>, mailto: String },
}

impl BulkArtifact {
    fn recipients(candidates: &[&Candidate]) -> Self {
        let emails: Vec<String> = candidates
            .iter()
            .map(|candidate| candidate.email.trim().to_string())
            .filter(|email| !email.is_empty())
            .collect();
        let mailto = format!("mailto:{}", emails.join(","));
        Self::Recipients { emails, mailto }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BulkReceipt {
    pub command: BulkCommand,
    pub affected: Vec<CandidateId>,
    pub phase: BatchPhase,
    pub notification: Notification,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub undo: Option<UndoToken>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<BulkArtifact>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BulkOutcome {
    /// The caller declined the confirmation; nothing was issued.
    Declined(ConfirmationRequest),
    Completed(BulkReceipt),
}

#[derive(Debug, thiserror::Error)]
pub enum BulkError {
    #[error("no candidates selected")]
    EmptySelection,
    #[error("tag name must not be blank")]
    BlankTag,
    #[error("reviewer id must not be blank")]
    BlankReviewer,
    #[error(
        "could not {action} {} of {attempted} candidate(s); changes were rolled back",
        .failed.len()
    )]
    Store {
        action: &'static str,
        attempted: usize,
        failed: Vec<CandidateId>,
        compensation_failed: Vec<CandidateId>,
        #[source]
        source: StoreError,
    },
    #[error(transparent)]
    Export(#[from] ExportError),
}

impl BulkError {
    /// Rejected locally before anything reached the store.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::EmptySelection | Self::BlankTag | Self::BlankReviewer
        )
    }
}

enum PlannedWrite {
    Update {
        patch: CandidatePatch,
        prior: FieldSnapshot,
    },
    Delete {
        prior: FieldSnapshot,
    },
}

/// Write needed to move `candidate` under `command`, or `None` when it is already there.
fn plan(
    command: &BulkCommand,
    candidate: &Candidate,
    position: usize,
    now: DateTime<Utc>,
) -> Option<PlannedWrite> {
    match command {
        BulkCommand::MoveToStage { stage: to } => {
            stage::can_transition(candidate.stage, *to).then(|| PlannedWrite::Update {
                patch: stage::transition_patch(*to, now),
                prior: FieldSnapshot::Stage {
                    stage: candidate.stage,
                    stage_changed_at: candidate.stage_changed_at,
                },
            })
        }
        BulkCommand::AddTag { tag } | BulkCommand::RemoveTag { tag } => {
            let adding = matches!(command, BulkCommand::AddTag { .. });
            if candidate.tags.contains(tag) == adding {
                return None;
            }
            let mut tags = candidate.tags.clone();
            if adding {
                tags.insert(tag.clone());
            } else {
                tags.remove(tag);
            }
            Some(PlannedWrite::Update {
                patch: CandidatePatch {
                    tags: Some(tags),
                    ..CandidatePatch::default()
                },
                prior: FieldSnapshot::Tags {
                    tags: candidate.tags.clone(),
                },
            })
        }
        BulkCommand::AssignReviewer { reviewer } => (candidate.assigned_reviewer.as_ref()
            != Some(reviewer))
        .then(|| PlannedWrite::Update {
            patch: CandidatePatch {
                assigned_reviewer: Some(Some(reviewer.clone())),
                ..CandidatePatch::default()
            },
            prior: FieldSnapshot::Reviewer {
                reviewer: candidate.assigned_reviewer.clone(),
            },
        }),
        BulkCommand::Archive => (!candidate.is_archived).then(|| PlannedWrite::Update {
            patch: CandidatePatch {
                is_archived: Some(true),
                ..CandidatePatch::default()
            },
            prior: FieldSnapshot::Archived { is_archived: false },
        }),
        BulkCommand::Delete => Some(PlannedWrite::Delete {
            prior: FieldSnapshot::Record {
                candidate: Box::new(candidate.clone()),
                position,
            },
        }),
        BulkCommand::Export { .. } | BulkCommand::Notify => None,
    }
}

/// Applies bulk commands and owns the single open undo window.
#[derive(Debug)]
pub struct BulkMutationEngine {
    undo_window: Duration,
    info_notice: Duration,
    open: Option<UndoWindow>,
}

impl BulkMutationEngine {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            undo_window: config.undo_window(),
            info_notice: config.info_notice(),
            open: None,
        }
    }

    pub fn open_window(&self) -> Option<&UndoWindow> {
        self.open.as_ref()
    }

    /// Runs `command` against every selected candidate still present in `candidates`.
    ///
    /// `confirm` is consulted only for commands that need it; declining returns
    /// [`BulkOutcome::Declined`] with the selection untouched.
    pub fn apply<S, C>(
        &mut self,
        store: &S,
        candidates: &mut Vec<Candidate>,
        selection: &mut SelectionSet,
        command: &BulkCommand,
        confirm: C,
        now: DateTime<Utc>,
    ) -> Result<BulkOutcome, BulkError>
    where
        S: CandidateStore + ?Sized,
        C: FnOnce(&ConfirmationRequest) -> bool,
    {
        let command = command.normalized()?;
        let targets: Vec<usize> = candidates
            .iter()
            .enumerate()
            .filter(|(_, candidate)| selection.contains(&candidate.id))
            .map(|(index, _)| index)
            .collect();
        if targets.is_empty() {
            return Err(BulkError::EmptySelection);
        }

        let count = targets.len();
        if let Some(request) = command.confirmation(count, self.undo_window) {
            if !confirm(&request) {
                info!(action = command.verb(), count, "bulk command declined");
                return Ok(BulkOutcome::Declined(request));
            }
        }

        let affected: Vec<CandidateId> = targets
            .iter()
            .map(|&index| candidates[index].id.clone())
            .collect();

        if command.is_read_only() {
            let chosen: Vec<&Candidate> = targets.iter().map(|&index| &candidates[index]).collect();
            let artifact = match &command {
                BulkCommand::Export { format } => {
                    BulkArtifact::Export(export::render(*format, &chosen)?)
                }
                _ => BulkArtifact::recipients(&chosen),
            };
            let notification =
                Notification::info(command.success_message(count), self.info_notice);
            info!(action = command.verb(), count, "read-only bulk command completed");
            return Ok(BulkOutcome::Completed(BulkReceipt {
                command,
                affected,
                phase: BatchPhase::Committed,
                notification,
                undo: None,
                artifact: Some(artifact),
            }));
        }

        let plans: Vec<(CandidateId, PlannedWrite)> = targets
            .iter()
            .filter_map(|&index| {
                let candidate = &candidates[index];
                plan(&command, candidate, index, now).map(|write| (candidate.id.clone(), write))
            })
            .collect();

        let mut batch = MutationBatch::pending(command.clone(), now);
        commit(store, candidates, &mut batch, plans)?;

        selection.clear();
        let token = UndoToken::generate();
        if let Some(previous) = self.open.take() {
            debug!(token = %previous.token, "replacing open undo window");
        }
        info!(
            action = command.verb(),
            count,
            changed = batch.snapshot.len(),
            %token,
            "bulk batch committed"
        );
        self.open = Some(UndoWindow {
            token,
            batch,
            expires_at: now + self.undo_window,
        });

        let notification =
            Notification::success(command.success_message(count), self.undo_window)
                .with_undo(token);
        Ok(BulkOutcome::Completed(BulkReceipt {
            command,
            affected,
            phase: BatchPhase::Committed,
            notification,
            undo: Some(token),
            artifact: None,
        }))
    }

    /// Reverses the open batch if `token` matches and the window has not elapsed.
    /// The window is consumed either way.
    pub fn undo<S>(
        &mut self,
        store: &S,
        candidates: &mut Vec<Candidate>,
        token: UndoToken,
        now: DateTime<Utc>,
    ) -> Result<Notification, UndoError>
    where
        S: CandidateStore + ?Sized,
    {
        let window = self.open.take().ok_or(UndoError::NothingToUndo)?;
        if window.token != token {
            self.open = Some(window);
            return Err(UndoError::UnknownToken(token));
        }
        if window.is_expired(now) {
            info!(%token, "undo requested after window closed");
            return Err(UndoError::Expired);
        }

        let mut restored: Vec<&SnapshotEntry> = Vec::new();
        let mut failed = Vec::new();
        let mut first_error = None;
        for entry in window.batch.snapshot.entries() {
            let result = match &entry.prior {
                FieldSnapshot::Record { candidate, .. } => {
                    store.insert_candidate(candidate).map(|_| ())
                }
                prior => match prior.restore_patch() {
                    Some(patch) => store.update_candidate(&entry.id, &patch).map(|_| ()),
                    None => Ok(()),
                },
            };
            match result {
                Ok(()) => restored.push(entry),
                Err(err) => {
                    warn!(candidate = %entry.id, error = %err, "store rejected undo write");
                    failed.push(entry.id.clone());
                    first_error.get_or_insert(err);
                }
            }
        }

        snapshot::restore_local(&restored, candidates);

        if let Some(source) = first_error {
            return Err(UndoError::Store { failed, source });
        }

        info!(
            %token,
            action = window.batch.command.verb(),
            restored = restored.len(),
            held_ms = (now - window.batch.started_at).num_milliseconds(),
            "bulk batch undone"
        );
        Ok(Notification::success("Action undone.", self.info_notice))
    }

    /// Closes the undo affordance early and discards its snapshot.
    pub fn dismiss(&mut self, token: UndoToken) -> bool {
        match &self.open {
            Some(window) if window.token == token => {
                self.open = None;
                true
            }
            _ => false,
        }
    }

    /// Drops the open window unconditionally, e.g. when the collection it was captured
    /// from is replaced. Returns `true` if one was open.
    pub fn discard(&mut self) -> bool {
        match self.open.take() {
            Some(window) => {
                debug!(token = %window.token, "undo window discarded");
                true
            }
            None => false,
        }
    }

    /// Drops the open window once its deadline passes. Returns `true` if one was dropped.
    pub fn expire(&mut self, now: DateTime<Utc>) -> bool {
        match &self.open {
            Some(window) if window.is_expired(now) => {
                debug!(token = %window.token, "undo window expired");
                self.open = None;
                true
            }
            _ => false,
        }
    }
}

fn commit<S>(
    store: &S,
    candidates: &mut Vec<Candidate>,
    batch: &mut MutationBatch,
    plans: Vec<(CandidateId, PlannedWrite)>,
) -> Result<(), BulkError>
where
    S: CandidateStore + ?Sized,
{
    let attempted = plans.len();
    let mut written: Vec<(CandidateId, PlannedWrite)> = Vec::with_capacity(attempted);
    let mut failed = Vec::new();
    let mut first_error = None;

    for (id, write) in plans {
        let result = match &write {
            PlannedWrite::Update { patch, .. } => store.update_candidate(&id, patch).map(|_| ()),
            PlannedWrite::Delete { .. } => store.delete_candidate(&id),
        };
        match result {
            Ok(()) => written.push((id, write)),
            Err(err) => {
                warn!(candidate = %id, error = %err, "store rejected bulk write");
                first_error.get_or_insert(err);
                failed.push(id);
            }
        }
    }

    if let Some(source) = first_error {
        let compensation_failed = compensate(store, &written);
        batch.phase = BatchPhase::RolledBack;
        warn!(
            action = batch.command.verb(),
            attempted,
            failed = failed.len(),
            uncompensated = compensation_failed.len(),
            "bulk batch rolled back"
        );
        return Err(BulkError::Store {
            action: batch.command.verb(),
            attempted,
            failed,
            compensation_failed,
            source,
        });
    }

    for (id, write) in written {
        match write {
            PlannedWrite::Update { patch, prior } => {
                if let Some(candidate) = candidates.iter_mut().find(|candidate| candidate.id == id)
                {
                    patch.apply_to(candidate);
                }
                batch.snapshot.push(id, prior);
            }
            PlannedWrite::Delete { prior } => {
                candidates.retain(|candidate| candidate.id != id);
                batch.snapshot.push(id, prior);
            }
        }
    }
    batch.phase = BatchPhase::Committed;
    Ok(())
}

/// Writes prior values back for every store write that landed before a failure.
/// Returns the ids the store refused to restore.
fn compensate<S>(store: &S, written: &[(CandidateId, PlannedWrite)]) -> Vec<CandidateId>
where
    S: CandidateStore + ?Sized,
{
    written
        .iter()
        .rev()
        .filter_map(|(id, write)| {
            let result = match write {
                PlannedWrite::Update { prior, .. } => match prior.restore_patch() {
                    Some(patch) => store.update_candidate(id, &patch).map(|_| ()),
                    None => Ok(()),
                },
                PlannedWrite::Delete {
                    prior: FieldSnapshot::Record { candidate, .. },
                } => store.insert_candidate(candidate).map(|_| ()),
                PlannedWrite::Delete { .. } => Ok(()),
            };
            match result {
                Ok(()) => None,
                Err(err) => {
                    warn!(candidate = %id, error = %err, "compensating write failed");
                    Some(id.clone())
                }
            }
        })
        .collect()
}
