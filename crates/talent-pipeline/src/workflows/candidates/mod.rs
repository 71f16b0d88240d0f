//! Candidate pipeline: stage model, filtering, selection, and undoable bulk mutations.
//!
//! [`PipelineSession`] is the owning context for one reviewer. It loads candidates from a
//! [`CandidateStore`], keeps the selection a subset of whatever the current filter shows,
//! and routes bulk commands through [`BulkMutationEngine`] so that every mutation is
//! all-or-nothing and reversible for a short window.

pub mod bulk;
pub mod domain;
pub mod filter;
pub mod notes;
pub mod ratings;
pub mod repository;
pub mod router;
pub mod saved_filters;
pub mod selection;
pub mod session;
pub mod stage;

#[cfg(test)]
mod tests;

pub use bulk::{
    BatchPhase, BulkArtifact, BulkCommand, BulkError, BulkMutationEngine, BulkOutcome,
    BulkReceipt, ConfirmationKind, ConfirmationRequest, ExportFile, ExportFormat, UndoError,
    UndoToken,
};
pub use domain::{
    Candidate, CandidateId, CandidatePatch, CandidateView, JobId, Note, NoteId, NoteType,
    NoteVisibility, Rating, RatingCategory, RatingId, ReviewerId,
};
pub use filter::{cycle_flag, FilterDebouncer, FilterState, RecentSearches};
pub use notes::{NoteDraft, NoteEdit, NoteError, NoteQuery, NoteView, NotesPolicy};
pub use ratings::{RatingError, RatingSummary};
pub use repository::{
    CandidateStore, Notification, NotificationSink, Severity, StoreError,
    TracingNotificationSink,
};
pub use router::{pipeline_router, PipelineState, REVIEWER_HEADER};
pub use saved_filters::{
    load_shared, SavedFilter, SavedFilterError, SavedFilterId, SavedFilterRegistry,
    SavedFilterStore, ShareLink,
};
pub use selection::{SelectionScope, SelectionSet};
pub use session::{MoveOutcome, PipelineSession, SessionError, StageCount, TickReport};
pub use stage::{Stage, UnknownStage};
