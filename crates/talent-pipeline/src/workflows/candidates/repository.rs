use chrono::Duration;
use serde::{Serialize, Serializer};

use super::domain::{Candidate, CandidateId, CandidatePatch, JobId, Note, NoteId, Rating};
use super::bulk::UndoToken;

/// Storage abstraction over the hosted candidate table so the engine can be exercised
/// in isolation. Every call may fail independently; callers decide how to reconcile.
pub trait CandidateStore: Send + Sync {
    fn list_candidates(&self, job_id: Option<&JobId>) -> Result<Vec<Candidate>, StoreError>;
    fn update_candidate(
        &self,
        id: &CandidateId,
        patch: &CandidatePatch,
    ) -> Result<Candidate, StoreError>;
    fn delete_candidate(&self, id: &CandidateId) -> Result<(), StoreError>;
    fn insert_candidate(&self, candidate: &Candidate) -> Result<Candidate, StoreError>;
    fn insert_rating(&self, id: &CandidateId, rating: &Rating) -> Result<(), StoreError>;
    fn insert_note(&self, id: &CandidateId, note: &Note) -> Result<(), StoreError>;
    fn update_note(&self, id: &CandidateId, note: &Note) -> Result<(), StoreError>;
    fn delete_note(&self, id: &CandidateId, note_id: &NoteId) -> Result<(), StoreError>;
}

/// Error enumeration for store failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("store rejected write: {0}")]
    Rejected(String),
}

/// Outbound channel for confirmation and undo toasts.
pub trait NotificationSink: Send + Sync {
    fn publish(&self, notification: &Notification);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Success,
    Info,
    Error,
}

/// Toast payload: message, severity, optional undo handle, and how long to show it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub message: String,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub undo: Option<UndoToken>,
    #[serde(rename = "display_ms", serialize_with = "duration_millis")]
    pub display_for: Duration,
}

impl Notification {
    pub fn success(message: impl Into<String>, display_for: Duration) -> Self {
        Self {
            message: message.into(),
            severity: Severity::Success,
            undo: None,
            display_for,
        }
    }

    pub fn info(message: impl Into<String>, display_for: Duration) -> Self {
        Self {
            message: message.into(),
            severity: Severity::Info,
            undo: None,
            display_for,
        }
    }

    pub fn error(message: impl Into<String>, display_for: Duration) -> Self {
        Self {
            message: message.into(),
            severity: Severity::Error,
            undo: None,
            display_for,
        }
    }

    pub fn with_undo(mut self, token: UndoToken) -> Self {
        self.undo = Some(token);
        self
    }
}

fn duration_millis<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_i64(duration.num_milliseconds())
}

/// Sink that only records notifications in the trace log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotificationSink;

impl NotificationSink for TracingNotificationSink {
    fn publish(&self, notification: &Notification) {
        tracing::info!(
            severity = ?notification.severity,
            undo = notification.undo.is_some(),
            "{}",
            notification.message
        );
    }
}
