use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::CandidatePatch;

/// Fixed, totally ordered pipeline stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    New,
    Screening,
    InterviewScheduled,
    InterviewComplete,
    OfferPending,
    Hired,
    Rejected,
    OnHold,
}

impl Stage {
    pub const fn ordered() -> [Self; 8] {
        [
            Self::New,
            Self::Screening,
            Self::InterviewScheduled,
            Self::InterviewComplete,
            Self::OfferPending,
            Self::Hired,
            Self::Rejected,
            Self::OnHold,
        ]
    }

    pub const fn id(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Screening => "screening",
            Self::InterviewScheduled => "interview_scheduled",
            Self::InterviewComplete => "interview_complete",
            Self::OfferPending => "offer_pending",
            Self::Hired => "hired",
            Self::Rejected => "rejected",
            Self::OnHold => "on_hold",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::New => "New",
            Self::Screening => "Screening",
            Self::InterviewScheduled => "Interview Scheduled",
            Self::InterviewComplete => "Interview Complete",
            Self::OfferPending => "Offer Pending",
            Self::Hired => "Hired",
            Self::Rejected => "Rejected",
            Self::OnHold => "On Hold",
        }
    }

    /// Moving into these stages needs an explicit confirmation from the caller.
    pub const fn is_sensitive(self) -> bool {
        matches!(self, Self::Hired | Self::Rejected)
    }

    /// Presentation hint only; candidates can still leave these stages.
    pub const fn is_default_terminal(self) -> bool {
        self.is_sensitive()
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown pipeline stage '{0}'")]
pub struct UnknownStage(pub String);

impl FromStr for Stage {
    type Err = UnknownStage;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim().to_ascii_lowercase().replace([' ', '-'], "_");
        Self::ordered()
            .into_iter()
            .find(|stage| stage.id() == normalized)
            .ok_or_else(|| UnknownStage(raw.to_string()))
    }
}

/// Every pair of distinct stages is a legal move; the pipeline has no forbidden edges.
pub fn can_transition(from: Stage, to: Stage) -> bool {
    from != to
}

/// Fields written when a candidate enters `to` at `now`; resets the days-in-stage clock.
pub fn transition_patch(to: Stage, now: DateTime<Utc>) -> CandidatePatch {
    CandidatePatch {
        stage: Some(to),
        stage_changed_at: Some(now),
        ..CandidatePatch::default()
    }
}
