use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, info};

use super::bulk::{
    BulkCommand, BulkError, BulkMutationEngine, BulkOutcome, ConfirmationKind,
    ConfirmationRequest, UndoError, UndoToken, UndoWindow,
};
use super::domain::{
    Candidate, CandidateId, CandidateView, JobId, Note, NoteId, RatingCategory, ReviewerId,
};
use super::filter::{FilterDebouncer, FilterState, RecentSearches};
use super::notes::{NoteDraft, NoteEdit, NoteError, NoteQuery, NoteView, NotesPolicy};
use super::ratings::{self, RatingError, RatingSummary};
use super::repository::{CandidateStore, Notification, NotificationSink, StoreError};
use super::selection::{SelectionScope, SelectionSet};
use super::stage::{self, Stage};
use crate::config::PipelineConfig;

/// One reviewer's working context: the loaded collection, the filter in force, the
/// selection, and the open undo window.
pub struct PipelineSession<S: ?Sized, N: ?Sized> {
    store: Arc<S>,
    notifications: Arc<N>,
    job: Option<JobId>,
    candidates: Vec<Candidate>,
    filter: FilterDebouncer,
    recent: RecentSearches,
    selection: SelectionSet,
    bulk: BulkMutationEngine,
    notes: NotesPolicy,
    notice: Duration,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("candidate {0} not found")]
    UnknownCandidate(CandidateId),
    #[error("failed to load candidates: {0}")]
    Load(#[source] StoreError),
    #[error("failed to move candidate: {0}")]
    Move(#[source] StoreError),
    #[error(transparent)]
    Rating(#[from] RatingError),
    #[error(transparent)]
    Note(#[from] NoteError),
}

/// What a single timer pass changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    pub filter_applied: bool,
    pub pruned: usize,
    pub undo_expired: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SelectionState {
    pub count: usize,
    pub all_selected: bool,
    pub partially_selected: bool,
}

/// Column header for one stage of the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StageCount {
    pub stage: Stage,
    pub label: &'static str,
    pub count: usize,
    pub terminal: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MoveOutcome {
    Declined(ConfirmationRequest),
    Unchanged,
    Moved(Box<Candidate>),
}

impl<S, N> PipelineSession<S, N>
where
    S: CandidateStore + ?Sized,
    N: NotificationSink + ?Sized,
{
    pub fn new(store: Arc<S>, notifications: Arc<N>, config: &PipelineConfig) -> Self {
        Self {
            store,
            notifications,
            job: None,
            candidates: Vec::new(),
            filter: FilterDebouncer::new(config.search_debounce()),
            recent: RecentSearches::default(),
            selection: SelectionSet::new(),
            bulk: BulkMutationEngine::new(config),
            notes: NotesPolicy::from_config(config),
            notice: config.info_notice(),
        }
    }

    /// Replaces the collection with the store's current records for `job`.
    pub fn load(&mut self, job: Option<JobId>) -> Result<usize, SessionError> {
        let candidates = self
            .store
            .list_candidates(job.as_ref())
            .map_err(SessionError::Load)?;
        info!(job = ?job.as_ref().map(|id| id.0.as_str()), count = candidates.len(), "candidates loaded");
        self.candidates = candidates;
        self.job = job;
        self.selection.clear();
        self.filter.cancel();
        if self.bulk.discard() {
            debug!("open undo window dropped on reload");
        }
        Ok(self.candidates.len())
    }

    pub fn job(&self) -> Option<&JobId> {
        self.job.as_ref()
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn candidate(&self, id: &CandidateId) -> Option<&Candidate> {
        self.candidates.iter().find(|candidate| &candidate.id == id)
    }

    pub fn visible(&self) -> Vec<&Candidate> {
        self.filter.applied().apply(&self.candidates)
    }

    pub fn visible_views(&self, now: DateTime<Utc>) -> Vec<CandidateView> {
        self.visible()
            .into_iter()
            .map(|candidate| candidate.view(now))
            .collect()
    }

    /// Visible candidates per stage, in pipeline order. Stages with no candidates
    /// are still listed.
    pub fn stage_counts(&self) -> Vec<StageCount> {
        let visible = self.visible();
        Stage::ordered()
            .into_iter()
            .map(|stage| StageCount {
                stage,
                label: stage.label(),
                count: visible.iter().filter(|candidate| candidate.stage == stage).count(),
                terminal: stage.is_default_terminal(),
            })
            .collect()
    }

    pub fn filter(&self) -> &FilterState {
        self.filter.applied()
    }

    pub fn pending_query(&self) -> Option<&str> {
        self.filter.pending_query()
    }

    pub fn recent_searches(&self) -> &[String] {
        self.recent.entries()
    }

    /// Keystroke in the search box; applied once the quiet period passes.
    pub fn set_search_query(&mut self, query: impl Into<String>, now: DateTime<Utc>) {
        self.filter.set_query(query, now);
    }

    /// Search submit: applies the pending query now and records it as recent.
    pub fn submit_search(&mut self) -> usize {
        self.filter.flush();
        let query = self.filter.applied().search_query.clone();
        self.recent.record(&query);
        self.prune()
    }

    pub fn update_filter<F>(&mut self, change: F) -> usize
    where
        F: FnOnce(&mut FilterState),
    {
        self.filter.update(change);
        self.prune()
    }

    pub fn replace_filter(&mut self, state: FilterState) -> usize {
        self.filter.replace(state);
        self.prune()
    }

    pub fn clear_filter(&mut self) -> usize {
        self.replace_filter(FilterState::default())
    }

    /// Fires whichever deadlines have passed.
    pub fn tick(&mut self, now: DateTime<Utc>) -> TickReport {
        let filter_applied = self.filter.poll(now);
        let pruned = if filter_applied { self.prune() } else { 0 };
        let undo_expired = self.bulk.expire(now);
        TickReport {
            filter_applied,
            pruned,
            undo_expired,
        }
    }

    fn prune(&mut self) -> usize {
        let visible = self.filter.applied().apply(&self.candidates);
        let removed = self.selection.prune(&visible);
        if removed > 0 {
            debug!(removed, "pruned selection to visible candidates");
        }
        removed
    }

    pub fn selection(&self) -> &SelectionSet {
        &self.selection
    }

    pub fn selection_state(&self, scope: SelectionScope) -> SelectionState {
        let visible = self.visible();
        SelectionState {
            count: self.selection.len(),
            all_selected: self.selection.is_all_selected(scope, &visible),
            partially_selected: self.selection.is_partially_selected(scope, &visible),
        }
    }

    pub fn toggle(&mut self, id: &CandidateId) -> Result<(), SessionError> {
        self.ensure_visible(id)?;
        self.selection.toggle(id);
        Ok(())
    }

    pub fn select_range(&mut self, id: &CandidateId, scope: SelectionScope) -> Result<(), SessionError> {
        self.ensure_visible(id)?;
        let visible = self.filter.applied().apply(&self.candidates);
        self.selection.select_range(id, scope, &visible);
        Ok(())
    }

    pub fn select_all(&mut self, scope: SelectionScope) {
        let visible = self.filter.applied().apply(&self.candidates);
        self.selection.select_all(scope, &visible);
    }

    pub fn toggle_all(&mut self, scope: SelectionScope) {
        let visible = self.filter.applied().apply(&self.candidates);
        self.selection.toggle_all(scope, &visible);
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    fn ensure_visible(&self, id: &CandidateId) -> Result<(), SessionError> {
        if self.visible().iter().any(|candidate| &candidate.id == id) {
            Ok(())
        } else {
            Err(SessionError::UnknownCandidate(id.clone()))
        }
    }

    /// Runs a bulk command over the selection and publishes the resulting toast.
    pub fn apply_bulk<C>(
        &mut self,
        command: &BulkCommand,
        confirm: C,
        now: DateTime<Utc>,
    ) -> Result<BulkOutcome, BulkError>
    where
        C: FnOnce(&ConfirmationRequest) -> bool,
    {
        let result = self.bulk.apply(
            self.store.as_ref(),
            &mut self.candidates,
            &mut self.selection,
            command,
            confirm,
            now,
        );
        match &result {
            Ok(BulkOutcome::Completed(receipt)) => {
                self.notifications.publish(&receipt.notification);
                self.prune();
            }
            Ok(BulkOutcome::Declined(_)) => {}
            Err(err) => {
                self.notifications
                    .publish(&Notification::error(err.to_string(), self.notice));
            }
        }
        result
    }

    pub fn open_undo(&self) -> Option<&UndoWindow> {
        self.bulk.open_window()
    }

    pub fn undo(&mut self, token: UndoToken, now: DateTime<Utc>) -> Result<Notification, UndoError> {
        let result = self
            .bulk
            .undo(self.store.as_ref(), &mut self.candidates, token, now);
        match &result {
            Ok(notification) => self.notifications.publish(notification),
            Err(err @ (UndoError::Expired | UndoError::Store { .. })) => {
                self.notifications
                    .publish(&Notification::error(err.to_string(), self.notice));
            }
            Err(_) => {}
        }
        self.prune();
        result
    }

    pub fn dismiss(&mut self, token: UndoToken) -> bool {
        self.bulk.dismiss(token)
    }

    /// Single-card drag between columns. Sensitive stages still need confirmation;
    /// no undo window is opened.
    pub fn move_candidate<C>(
        &mut self,
        id: &CandidateId,
        to: Stage,
        confirm: C,
        now: DateTime<Utc>,
    ) -> Result<MoveOutcome, SessionError>
    where
        C: FnOnce(&ConfirmationRequest) -> bool,
    {
        let index = self.index_of(id)?;
        let candidate = &self.candidates[index];
        if !stage::can_transition(candidate.stage, to) {
            return Ok(MoveOutcome::Unchanged);
        }

        if to.is_sensitive() {
            let request = ConfirmationRequest {
                kind: ConfirmationKind::SensitiveStage,
                prompt: format!(
                    "Are you sure you want to move {} to \"{}\"?",
                    candidate.name,
                    to.label()
                ),
            };
            if !confirm(&request) {
                return Ok(MoveOutcome::Declined(request));
            }
        }

        let patch = stage::transition_patch(to, now);
        if let Err(err) = self.store.update_candidate(id, &patch) {
            self.notifications
                .publish(&Notification::error(format!("Failed to move candidate: {err}"), self.notice));
            return Err(SessionError::Move(err));
        }

        let candidate = &mut self.candidates[index];
        patch.apply_to(candidate);
        let moved = candidate.clone();
        info!(candidate = %id, stage = to.id(), "candidate moved");
        self.notifications.publish(&Notification::success(
            format!("Moved {} to {}.", moved.name, to.label()),
            self.notice,
        ));
        self.prune();
        Ok(MoveOutcome::Moved(Box::new(moved)))
    }

    pub fn add_rating(
        &mut self,
        id: &CandidateId,
        reviewer: ReviewerId,
        score: f32,
        category: Option<RatingCategory>,
        now: DateTime<Utc>,
    ) -> Result<RatingSummary, SessionError> {
        let index = self.index_of(id)?;
        let candidate = &mut self.candidates[index];
        ratings::add_rating(self.store.as_ref(), candidate, reviewer, score, category, now)?;
        let summary = RatingSummary::of(candidate);
        self.prune();
        Ok(summary)
    }

    pub fn rating_summary(&self, id: &CandidateId) -> Result<RatingSummary, SessionError> {
        let candidate = self
            .candidate(id)
            .ok_or_else(|| SessionError::UnknownCandidate(id.clone()))?;
        Ok(RatingSummary::of(candidate))
    }

    pub fn notes(
        &self,
        id: &CandidateId,
        viewer: &ReviewerId,
        query: &NoteQuery,
        now: DateTime<Utc>,
    ) -> Result<Vec<NoteView>, SessionError> {
        let candidate = self
            .candidate(id)
            .ok_or_else(|| SessionError::UnknownCandidate(id.clone()))?;
        Ok(self
            .notes
            .list(&candidate.notes, viewer, query)
            .into_iter()
            .map(|note| NoteView::new(&self.notes, note, viewer, now))
            .collect())
    }

    pub fn add_note(
        &mut self,
        id: &CandidateId,
        author: ReviewerId,
        draft: NoteDraft,
        now: DateTime<Utc>,
    ) -> Result<Note, SessionError> {
        let index = self.index_of(id)?;
        let note = self
            .notes
            .add(self.store.as_ref(), &mut self.candidates[index], author, draft, now)?;
        self.prune();
        Ok(note)
    }

    pub fn update_note(
        &mut self,
        id: &CandidateId,
        note_id: &NoteId,
        editor: &ReviewerId,
        edit: NoteEdit,
        now: DateTime<Utc>,
    ) -> Result<Note, SessionError> {
        let index = self.index_of(id)?;
        Ok(self.notes.update(
            self.store.as_ref(),
            &mut self.candidates[index],
            note_id,
            editor,
            edit,
            now,
        )?)
    }

    pub fn delete_note(
        &mut self,
        id: &CandidateId,
        note_id: &NoteId,
        editor: &ReviewerId,
        now: DateTime<Utc>,
    ) -> Result<Note, SessionError> {
        let index = self.index_of(id)?;
        let removed = self.notes.delete(
            self.store.as_ref(),
            &mut self.candidates[index],
            note_id,
            editor,
            now,
        )?;
        self.prune();
        Ok(removed)
    }

    pub fn toggle_pin(
        &mut self,
        id: &CandidateId,
        note_id: &NoteId,
        viewer: &ReviewerId,
    ) -> Result<Note, SessionError> {
        let index = self.index_of(id)?;
        Ok(self.notes.toggle_pin(
            self.store.as_ref(),
            &mut self.candidates[index],
            note_id,
            viewer,
        )?)
    }

    fn index_of(&self, id: &CandidateId) -> Result<usize, SessionError> {
        self.candidates
            .iter()
            .position(|candidate| &candidate.id == id)
            .ok_or_else(|| SessionError::UnknownCandidate(id.clone()))
    }
}
