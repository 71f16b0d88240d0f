use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::domain::{Candidate, Note, NoteId, NoteType, NoteVisibility, ReviewerId};
use super::repository::{CandidateStore, StoreError};
use crate::config::PipelineConfig;

/// Payload for a new note.
#[derive(Debug, Clone, Deserialize)]
pub struct NoteDraft {
    #[serde(default = "default_note_type")]
    pub note_type: NoteType,
    pub content: String,
    #[serde(default = "default_visibility")]
    pub visibility: NoteVisibility,
    #[serde(default)]
    pub is_pinned: bool,
}

fn default_note_type() -> NoteType {
    NoteType::General
}

fn default_visibility() -> NoteVisibility {
    NoteVisibility::Team
}

#[derive(Debug, Clone, Deserialize)]
pub struct NoteEdit {
    pub content: String,
    #[serde(default)]
    pub note_type: Option<NoteType>,
    #[serde(default)]
    pub visibility: Option<NoteVisibility>,
}

/// Optional type and author filters; both must hold when both are set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct NoteQuery {
    pub note_type: Option<NoteType>,
    pub author: Option<ReviewerId>,
}

impl NoteQuery {
    fn matches(&self, note: &Note) -> bool {
        self.note_type.map_or(true, |kind| note.note_type == kind)
            && self.author.as_ref().map_or(true, |author| &note.author == author)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum NoteError {
    #[error("note content must not be blank")]
    BlankContent,
    #[error("note {0} not found")]
    NotFound(NoteId),
    #[error("only the author can change this note")]
    NotAuthor,
    #[error("notes can only be changed within {hours} hours of creation")]
    EditWindowClosed { hours: i64 },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Visibility and authorship rules around a candidate's notes.
#[derive(Debug, Clone, Copy)]
pub struct NotesPolicy {
    edit_window: Duration,
}

impl NotesPolicy {
    pub fn new(edit_window: Duration) -> Self {
        Self { edit_window }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.note_edit_window())
    }

    pub fn can_view(&self, note: &Note, viewer: &ReviewerId) -> bool {
        note.visibility == NoteVisibility::Team || &note.author == viewer
    }

    pub fn can_edit(&self, note: &Note, editor: &ReviewerId, now: DateTime<Utc>) -> bool {
        &note.author == editor && now - note.created_at < self.edit_window
    }

    /// Notes `viewer` may see, pinned first, each group newest first.
    pub fn list<'a>(&self, notes: &'a [Note], viewer: &ReviewerId, query: &NoteQuery) -> Vec<&'a Note> {
        let mut visible: Vec<&Note> = notes
            .iter()
            .filter(|note| self.can_view(note, viewer) && query.matches(note))
            .collect();
        visible.sort_by(|left, right| {
            right
                .is_pinned
                .cmp(&left.is_pinned)
                .then_with(|| right.created_at.cmp(&left.created_at))
        });
        visible
    }

    pub fn add<S>(
        &self,
        store: &S,
        candidate: &mut Candidate,
        author: ReviewerId,
        draft: NoteDraft,
        now: DateTime<Utc>,
    ) -> Result<Note, NoteError>
    where
        S: CandidateStore + ?Sized,
    {
        let content = non_blank(&draft.content)?;
        let note = Note {
            id: NoteId::generate(),
            author,
            note_type: draft.note_type,
            content,
            is_pinned: draft.is_pinned,
            visibility: draft.visibility,
            created_at: now,
            updated_at: None,
        };

        store.insert_note(&candidate.id, &note)?;
        candidate.notes.push(note.clone());
        info!(candidate = %candidate.id, note = %note.id, pinned = note.is_pinned, "note added");
        Ok(note)
    }

    pub fn update<S>(
        &self,
        store: &S,
        candidate: &mut Candidate,
        note_id: &NoteId,
        editor: &ReviewerId,
        edit: NoteEdit,
        now: DateTime<Utc>,
    ) -> Result<Note, NoteError>
    where
        S: CandidateStore + ?Sized,
    {
        let content = non_blank(&edit.content)?;
        let index = self.editable_index(candidate, note_id, editor, now)?;

        let mut updated = candidate.notes[index].clone();
        updated.content = content;
        if let Some(note_type) = edit.note_type {
            updated.note_type = note_type;
        }
        if let Some(visibility) = edit.visibility {
            updated.visibility = visibility;
        }
        updated.updated_at = Some(now);

        store.update_note(&candidate.id, &updated)?;
        candidate.notes[index] = updated.clone();
        Ok(updated)
    }

    pub fn delete<S>(
        &self,
        store: &S,
        candidate: &mut Candidate,
        note_id: &NoteId,
        editor: &ReviewerId,
        now: DateTime<Utc>,
    ) -> Result<Note, NoteError>
    where
        S: CandidateStore + ?Sized,
    {
        let index = self.editable_index(candidate, note_id, editor, now)?;
        store.delete_note(&candidate.id, note_id)?;
        let removed = candidate.notes.remove(index);
        info!(candidate = %candidate.id, note = %note_id.0, "note deleted");
        Ok(removed)
    }

    /// Any reviewer who can see the note may pin or unpin it.
    pub fn toggle_pin<S>(
        &self,
        store: &S,
        candidate: &mut Candidate,
        note_id: &NoteId,
        viewer: &ReviewerId,
    ) -> Result<Note, NoteError>
    where
        S: CandidateStore + ?Sized,
    {
        let index = candidate
            .notes
            .iter()
            .position(|note| &note.id == note_id && self.can_view(note, viewer))
            .ok_or_else(|| NoteError::NotFound(note_id.clone()))?;

        let mut updated = candidate.notes[index].clone();
        updated.is_pinned = !updated.is_pinned;

        store.update_note(&candidate.id, &updated)?;
        candidate.notes[index] = updated.clone();
        Ok(updated)
    }

    fn editable_index(
        &self,
        candidate: &Candidate,
        note_id: &NoteId,
        editor: &ReviewerId,
        now: DateTime<Utc>,
    ) -> Result<usize, NoteError> {
        let index = candidate
            .notes
            .iter()
            .position(|note| &note.id == note_id && self.can_view(note, editor))
            .ok_or_else(|| NoteError::NotFound(note_id.clone()))?;
        let note = &candidate.notes[index];
        if &note.author != editor {
            return Err(NoteError::NotAuthor);
        }
        if !self.can_edit(note, editor, now) {
            return Err(NoteError::EditWindowClosed {
                hours: self.edit_window.num_hours(),
            });
        }
        Ok(index)
    }
}

fn non_blank(content: &str) -> Result<String, NoteError> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(NoteError::BlankContent);
    }
    Ok(trimmed.to_string())
}

/// Note as returned to a particular reviewer.
#[derive(Debug, Clone, Serialize)]
pub struct NoteView {
    #[serde(flatten)]
    pub note: Note,
    pub type_label: &'static str,
    pub can_edit: bool,
}

impl NoteView {
    pub fn new(policy: &NotesPolicy, note: &Note, viewer: &ReviewerId, now: DateTime<Utc>) -> Self {
        Self {
            note: note.clone(),
            type_label: note.note_type.label(),
            can_edit: policy.can_edit(note, viewer, now),
        }
    }
}
