use chrono::{DateTime, Duration, Utc};
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use talent_pipeline::workflows::candidates::{
    Candidate, CandidateId, CandidatePatch, CandidateStore, JobId, Note, NoteId, NoteType,
    NoteVisibility, Rating, RatingCategory, RatingId, ReviewerId, SavedFilter, SavedFilterId,
    SavedFilterStore, Stage, StoreError,
};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Candidate table kept in insertion order so restored records reappear where they were.
#[derive(Default, Clone)]
pub(crate) struct InMemoryCandidateStore {
    records: Arc<Mutex<Vec<Candidate>>>,
}

impl InMemoryCandidateStore {
    pub(crate) fn seeded(records: Vec<Candidate>) -> Self {
        Self {
            records: Arc::new(Mutex::new(records)),
        }
    }

    fn modify<T>(
        &self,
        id: &CandidateId,
        change: impl FnOnce(&mut Candidate) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut guard = self.records.lock().expect("candidate mutex poisoned");
        let record = guard
            .iter_mut()
            .find(|record| &record.id == id)
            .ok_or(StoreError::NotFound)?;
        change(record)
    }
}

impl CandidateStore for InMemoryCandidateStore {
    fn list_candidates(&self, job_id: Option<&JobId>) -> Result<Vec<Candidate>, StoreError> {
        let guard = self.records.lock().expect("candidate mutex poisoned");
        Ok(guard
            .iter()
            .filter(|record| job_id.map_or(true, |job| &record.job_id == job))
            .cloned()
            .collect())
    }

    fn update_candidate(
        &self,
        id: &CandidateId,
        patch: &CandidatePatch,
    ) -> Result<Candidate, StoreError> {
        self.modify(id, |record| {
            patch.apply_to(record);
            Ok(record.clone())
        })
    }

    fn delete_candidate(&self, id: &CandidateId) -> Result<(), StoreError> {
        let mut guard = self.records.lock().expect("candidate mutex poisoned");
        let before = guard.len();
        guard.retain(|record| &record.id != id);
        if guard.len() == before {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    fn insert_candidate(&self, candidate: &Candidate) -> Result<Candidate, StoreError> {
        let mut guard = self.records.lock().expect("candidate mutex poisoned");
        if guard.iter().any(|record| record.id == candidate.id) {
            return Err(StoreError::Conflict);
        }
        guard.push(candidate.clone());
        Ok(candidate.clone())
    }

    fn insert_rating(&self, id: &CandidateId, rating: &Rating) -> Result<(), StoreError> {
        self.modify(id, |record| {
            record.ratings.push(rating.clone());
            Ok(())
        })
    }

    fn insert_note(&self, id: &CandidateId, note: &Note) -> Result<(), StoreError> {
        self.modify(id, |record| {
            if record.notes.iter().any(|existing| existing.id == note.id) {
                return Err(StoreError::Conflict);
            }
            record.notes.push(note.clone());
            Ok(())
        })
    }

    fn update_note(&self, id: &CandidateId, note: &Note) -> Result<(), StoreError> {
        self.modify(id, |record| {
            let existing = record
                .notes
                .iter_mut()
                .find(|existing| existing.id == note.id)
                .ok_or(StoreError::NotFound)?;
            *existing = note.clone();
            Ok(())
        })
    }

    fn delete_note(&self, id: &CandidateId, note_id: &NoteId) -> Result<(), StoreError> {
        self.modify(id, |record| {
            let before = record.notes.len();
            record.notes.retain(|note| &note.id != note_id);
            if record.notes.len() == before {
                return Err(StoreError::NotFound);
            }
            Ok(())
        })
    }
}

#[derive(Default, Clone)]
pub(crate) struct InMemorySavedFilterStore {
    entries: Arc<Mutex<HashMap<SavedFilterId, SavedFilter>>>,
}

impl SavedFilterStore for InMemorySavedFilterStore {
    fn list_saved(&self) -> Result<Vec<SavedFilter>, StoreError> {
        let guard = self.entries.lock().expect("saved filter mutex poisoned");
        Ok(guard.values().cloned().collect())
    }

    fn fetch_saved(&self, id: &SavedFilterId) -> Result<Option<SavedFilter>, StoreError> {
        let guard = self.entries.lock().expect("saved filter mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn insert_saved(&self, filter: &SavedFilter) -> Result<(), StoreError> {
        let mut guard = self.entries.lock().expect("saved filter mutex poisoned");
        if guard.contains_key(&filter.id) {
            return Err(StoreError::Conflict);
        }
        guard.insert(filter.id, filter.clone());
        Ok(())
    }

    fn update_saved(&self, filter: &SavedFilter) -> Result<(), StoreError> {
        let mut guard = self.entries.lock().expect("saved filter mutex poisoned");
        match guard.get_mut(&filter.id) {
            Some(existing) => {
                *existing = filter.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound),
        }
    }

    fn delete_saved(&self, id: &SavedFilterId) -> Result<(), StoreError> {
        let mut guard = self.entries.lock().expect("saved filter mutex poisoned");
        guard.remove(id).map(|_| ()).ok_or(StoreError::NotFound)
    }
}

pub(crate) fn demo_job() -> JobId {
    JobId("job-platform-eng".to_string())
}

struct Seed {
    id: &'static str,
    name: &'static str,
    position: &'static str,
    stage: Stage,
    applied_days_ago: i64,
    in_stage_days: i64,
    scores: &'static [(f32, Option<RatingCategory>)],
    tags: &'static [&'static str],
    linkedin: bool,
    portfolio: bool,
}

const SEEDS: [Seed; 8] = [
    Seed {
        id: "cand-001",
        name: "Priya Raman",
        position: "Platform Engineer",
        stage: Stage::New,
        applied_days_ago: 2,
        in_stage_days: 2,
        scores: &[],
        tags: &["referral"],
        linkedin: true,
        portfolio: false,
    },
    Seed {
        id: "cand-002",
        name: "Marcus Bell",
        position: "Platform Engineer",
        stage: Stage::New,
        applied_days_ago: 3,
        in_stage_days: 3,
        scores: &[(3.5, None)],
        tags: &[],
        linkedin: false,
        portfolio: false,
    },
    Seed {
        id: "cand-003",
        name: "Sofia Lindqvist",
        position: "Site Reliability Engineer",
        stage: Stage::New,
        applied_days_ago: 1,
        in_stage_days: 1,
        scores: &[(4.5, Some(RatingCategory::Technical))],
        tags: &[],
        linkedin: true,
        portfolio: true,
    },
    Seed {
        id: "cand-004",
        name: "Daniel Osei",
        position: "Platform Engineer",
        stage: Stage::Screening,
        applied_days_ago: 9,
        in_stage_days: 4,
        scores: &[(4.0, None), (3.0, Some(RatingCategory::Communication))],
        tags: &["relocation"],
        linkedin: true,
        portfolio: false,
    },
    Seed {
        id: "cand-005",
        name: "Hana Kobayashi",
        position: "Site Reliability Engineer",
        stage: Stage::InterviewScheduled,
        applied_days_ago: 15,
        in_stage_days: 2,
        scores: &[(5.0, Some(RatingCategory::Technical)), (4.5, None)],
        tags: &[],
        linkedin: true,
        portfolio: true,
    },
    Seed {
        id: "cand-006",
        name: "Tomás Herrera",
        position: "Engineering Manager",
        stage: Stage::InterviewComplete,
        applied_days_ago: 21,
        in_stage_days: 1,
        scores: &[(4.0, Some(RatingCategory::Experience))],
        tags: &["leadership"],
        linkedin: true,
        portfolio: false,
    },
    Seed {
        id: "cand-007",
        name: "Amara Nwosu",
        position: "Engineering Manager",
        stage: Stage::OfferPending,
        applied_days_ago: 30,
        in_stage_days: 3,
        scores: &[(4.5, None), (5.0, Some(RatingCategory::CultureFit))],
        tags: &[],
        linkedin: false,
        portfolio: false,
    },
    Seed {
        id: "cand-008",
        name: "Felix Wagner",
        position: "Platform Engineer",
        stage: Stage::OnHold,
        applied_days_ago: 25,
        in_stage_days: 12,
        scores: &[(2.5, None)],
        tags: &[],
        linkedin: false,
        portfolio: false,
    },
];

/// Fixed roster used by `serve` and `demo` until a hosted store is wired in.
pub(crate) fn seed_candidates(now: DateTime<Utc>) -> Vec<Candidate> {
    let reviewers = ["morgan", "riley"];
    SEEDS
        .iter()
        .map(|seed| {
            let slug = seed.name.to_ascii_lowercase().replace(' ', ".");
            let ratings = seed
                .scores
                .iter()
                .enumerate()
                .map(|(index, (score, category))| Rating {
                    id: RatingId(format!("{}-r{}", seed.id, index + 1)),
                    reviewer: ReviewerId(reviewers[index % reviewers.len()].to_string()),
                    score: *score,
                    category: *category,
                    created_at: now - Duration::days(seed.in_stage_days),
                })
                .collect();
            let notes = if seed.stage == Stage::InterviewScheduled {
                vec![Note {
                    id: NoteId(format!("{}-n1", seed.id)),
                    author: ReviewerId("morgan".to_string()),
                    note_type: NoteType::PhoneScreen,
                    content: "Strong on incident response; probe capacity planning onsite."
                        .to_string(),
                    is_pinned: true,
                    visibility: NoteVisibility::Team,
                    created_at: now - Duration::days(3),
                    updated_at: None,
                }]
            } else {
                Vec::new()
            };

            Candidate {
                id: CandidateId(seed.id.to_string()),
                job_id: demo_job(),
                name: seed.name.to_string(),
                email: format!("{slug}@example.com"),
                phone: "555-0142".to_string(),
                position: seed.position.to_string(),
                stage: seed.stage,
                tags: seed.tags.iter().map(|tag| tag.to_string()).collect::<BTreeSet<_>>(),
                assigned_reviewer: None,
                is_archived: false,
                applied_at: now - Duration::days(seed.applied_days_ago),
                stage_changed_at: now - Duration::days(seed.in_stage_days),
                resume_url: Some(format!("https://files.example.com/resumes/{}.pdf", seed.id)),
                linkedin: seed
                    .linkedin
                    .then(|| format!("https://www.linkedin.com/in/{slug}")),
                portfolio: seed.portfolio.then(|| format!("https://{slug}.dev")),
                cover_letter: None,
                ratings,
                notes,
            }
        })
        .collect()
}
