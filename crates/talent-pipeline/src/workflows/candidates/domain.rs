use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::stage::Stage;

/// Identifier wrapper for candidate applications.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CandidateId(pub String);

impl fmt::Display for CandidateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reference to the job posting an application belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

/// Reviewer identity used for ratings, notes, and assignment.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReviewerId(pub String);

impl fmt::Display for ReviewerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RatingId(pub String);

impl RatingId {
    pub fn generate() -> Self {
        Self(format!("rating-{}", Uuid::new_v4()))
    }
}

impl fmt::Display for RatingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteId(pub String);

impl NoteId {
    pub fn generate() -> Self {
        Self(format!("note-{}", Uuid::new_v4()))
    }
}

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Canonical application record as held by the candidate store.
///
/// Ratings and notes are owned by the record, so removing a candidate removes
/// them too and re-inserting the record restores them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: CandidateId,
    pub job_id: JobId,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub position: String,
    pub stage: Stage,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub assigned_reviewer: Option<ReviewerId>,
    #[serde(default)]
    pub is_archived: bool,
    pub applied_at: DateTime<Utc>,
    pub stage_changed_at: DateTime<Utc>,
    #[serde(default)]
    pub resume_url: Option<String>,
    #[serde(default)]
    pub linkedin: Option<String>,
    #[serde(default)]
    pub portfolio: Option<String>,
    #[serde(default)]
    pub cover_letter: Option<String>,
    #[serde(default)]
    pub ratings: Vec<Rating>,
    #[serde(default)]
    pub notes: Vec<Note>,
}

impl Candidate {
    /// Mean of every recorded score, `0.0` when nobody has rated the candidate yet.
    pub fn rating(&self) -> f32 {
        if self.ratings.is_empty() {
            return 0.0;
        }
        let total: f32 = self.ratings.iter().map(|rating| rating.score).sum();
        total / self.ratings.len() as f32
    }

    pub fn days_in_stage(&self, now: DateTime<Utc>) -> i64 {
        (now - self.stage_changed_at).num_days().max(0)
    }

    pub fn applied_on(&self) -> NaiveDate {
        self.applied_at.date_naive()
    }

    pub fn has_resume(&self) -> bool {
        present(&self.resume_url)
    }

    pub fn has_notes(&self) -> bool {
        !self.notes.is_empty()
    }

    pub fn has_linkedin(&self) -> bool {
        present(&self.linkedin)
    }

    pub fn has_portfolio(&self) -> bool {
        present(&self.portfolio)
    }

    pub fn view(&self, now: DateTime<Utc>) -> CandidateView {
        CandidateView {
            id: self.id.clone(),
            job_id: self.job_id.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
            phone: self.phone.clone(),
            position: self.position.clone(),
            stage: self.stage,
            stage_label: self.stage.label(),
            days_in_stage: self.days_in_stage(now),
            rating: self.rating(),
            rating_count: self.ratings.len(),
            note_count: self.notes.len(),
            tags: self.tags.iter().cloned().collect(),
            assigned_reviewer: self.assigned_reviewer.clone(),
            applied_on: self.applied_on(),
        }
    }
}

fn present(value: &Option<String>) -> bool {
    value
        .as_deref()
        .map(|inner| !inner.trim().is_empty())
        .unwrap_or(false)
}

/// Partial update sent to the store; only populated fields are written.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandidatePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<Stage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage_changed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<BTreeSet<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_reviewer: Option<Option<ReviewerId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_archived: Option<bool>,
}

impl CandidatePatch {
    pub fn apply_to(&self, candidate: &mut Candidate) {
        if let Some(stage) = self.stage {
            candidate.stage = stage;
        }
        if let Some(changed_at) = self.stage_changed_at {
            candidate.stage_changed_at = changed_at;
        }
        if let Some(tags) = &self.tags {
            candidate.tags = tags.clone();
        }
        if let Some(reviewer) = &self.assigned_reviewer {
            candidate.assigned_reviewer = reviewer.clone();
        }
        if let Some(archived) = self.is_archived {
            candidate.is_archived = archived;
        }
    }
}

/// Immutable score left by one reviewer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub id: RatingId,
    pub reviewer: ReviewerId,
    pub score: f32,
    #[serde(default)]
    pub category: Option<RatingCategory>,
    pub created_at: DateTime<Utc>,
}

/// Descriptive rating categories. Weights are informational unless a caller opts into
/// [`super::ratings::weighted_mean`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RatingCategory {
    Technical,
    Experience,
    Communication,
    CultureFit,
    Overall,
}

impl RatingCategory {
    pub const fn ordered() -> [Self; 5] {
        [
            Self::Technical,
            Self::Experience,
            Self::Communication,
            Self::CultureFit,
            Self::Overall,
        ]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Technical => "Technical Skills",
            Self::Experience => "Experience",
            Self::Communication => "Communication",
            Self::CultureFit => "Culture Fit",
            Self::Overall => "Overall Impression",
        }
    }

    /// Percentage weight shown next to the category.
    pub const fn weight(self) -> u8 {
        match self {
            Self::Technical => 30,
            Self::Experience => 25,
            Self::Communication => 20,
            Self::CultureFit => 15,
            Self::Overall => 10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteType {
    General,
    PhoneScreen,
    Interview,
    Reference,
    Other,
}

impl NoteType {
    pub const fn label(self) -> &'static str {
        match self {
            Self::General => "General",
            Self::PhoneScreen => "Phone Screen",
            Self::Interview => "Interview",
            Self::Reference => "Reference",
            Self::Other => "Other",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteVisibility {
    Private,
    Team,
}

/// Reviewer annotation attached to a candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: NoteId,
    pub author: ReviewerId,
    pub note_type: NoteType,
    pub content: String,
    #[serde(default)]
    pub is_pinned: bool,
    pub visibility: NoteVisibility,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Serialized projection of a candidate for list responses.
#[derive(Debug, Clone, Serialize)]
pub struct CandidateView {
    pub id: CandidateId,
    pub job_id: JobId,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub position: String,
    pub stage: Stage,
    pub stage_label: &'static str,
    pub days_in_stage: i64,
    pub rating: f32,
    pub rating_count: usize,
    pub note_count: usize,
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_reviewer: Option<ReviewerId>,
    pub applied_on: NaiveDate,
}
