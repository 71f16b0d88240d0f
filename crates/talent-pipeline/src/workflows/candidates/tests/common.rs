use std::collections::{BTreeSet, HashSet};
use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::Value;

use crate::config::PipelineConfig;
use crate::workflows::candidates::domain::{
    Candidate, CandidateId, CandidatePatch, JobId, Note, NoteId, NoteType, NoteVisibility,
    Rating, RatingCategory, RatingId, ReviewerId,
};
use crate::workflows::candidates::repository::{
    CandidateStore, Notification, NotificationSink, StoreError,
};
use crate::workflows::candidates::saved_filters::{
    SavedFilter, SavedFilterId, SavedFilterRegistry, SavedFilterStore,
};
use crate::workflows::candidates::session::PipelineSession;
use crate::workflows::candidates::stage::Stage;
use crate::workflows::candidates::PipelineState;

pub(super) fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 10, 1, 12, 0, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn job() -> JobId {
    JobId("job-eng-01".to_string())
}

pub(super) fn reviewer(name: &str) -> ReviewerId {
    ReviewerId(name.to_string())
}

pub(super) fn id(raw: &str) -> CandidateId {
    CandidateId(raw.to_string())
}

pub(super) fn candidate(raw_id: &str, name: &str, position: &str, stage: Stage) -> Candidate {
    let slug = name.to_lowercase().replace(' ', ".");
    Candidate {
        id: id(raw_id),
        job_id: job(),
        name: name.to_string(),
        email: format!("{slug}@example.com"),
        phone: "555-0100".to_string(),
        position: position.to_string(),
        stage,
        tags: BTreeSet::new(),
        assigned_reviewer: None,
        is_archived: false,
        applied_at: now() - Duration::days(20),
        stage_changed_at: now() - Duration::days(5),
        resume_url: None,
        linkedin: None,
        portfolio: None,
        cover_letter: None,
        ratings: Vec::new(),
        notes: Vec::new(),
    }
}

pub(super) fn rating(reviewer_name: &str, score: f32) -> Rating {
    Rating {
        id: RatingId(format!("seed-{reviewer_name}-{score}")),
        reviewer: reviewer(reviewer_name),
        score,
        category: None,
        created_at: now() - Duration::days(3),
    }
}

pub(super) fn categorized(reviewer_name: &str, score: f32, category: RatingCategory) -> Rating {
    Rating {
        category: Some(category),
        ..rating(reviewer_name, score)
    }
}

pub(super) fn note(
    raw_id: &str,
    author: &str,
    content: &str,
    visibility: NoteVisibility,
    age: Duration,
) -> Note {
    Note {
        id: NoteId(raw_id.to_string()),
        author: reviewer(author),
        note_type: NoteType::General,
        content: content.to_string(),
        is_pinned: false,
        visibility,
        created_at: now() - age,
        updated_at: None,
    }
}

/// Eight candidates, three of them in `New`.
pub(super) fn roster() -> Vec<Candidate> {
    let mut ada = candidate("cand-1", "Ada Lovelace", "Software Engineer", Stage::New);
    ada.ratings.push(rating("riley", 4.5));
    ada.resume_url = Some("https://files.example.com/ada.pdf".to_string());
    ada.tags.insert("referral".to_string());

    let grace = candidate("cand-2", "Grace Hopper", "Software Engineer", Stage::New);

    let mut alan = candidate("cand-3", "Alan Turing", "Data Scientist", Stage::New);
    alan.ratings.push(rating("riley", 5.0));
    alan.linkedin = Some("https://linkedin.example.com/alan".to_string());

    let mut katherine = candidate(
        "cand-4",
        "Katherine Johnson",
        "Data Scientist",
        Stage::Screening,
    );
    katherine.ratings.push(rating("morgan", 3.0));
    katherine.notes.push(note(
        "note-k1",
        "morgan",
        "Strong phone screen",
        NoteVisibility::Team,
        Duration::hours(2),
    ));
    katherine.applied_at = now() - Duration::days(40);

    let mut margaret = candidate(
        "cand-5",
        "Margaret Hamilton",
        "Product Manager",
        Stage::InterviewScheduled,
    );
    margaret.ratings.push(rating("riley", 4.0));
    margaret.assigned_reviewer = Some(reviewer("morgan"));

    let mut edsger = candidate(
        "cand-6",
        "Edsger Dijkstra",
        "Software Engineer",
        Stage::OfferPending,
    );
    edsger.ratings.push(rating("morgan", 3.5));
    edsger.portfolio = Some("https://portfolio.example.com/edsger".to_string());

    let barbara = candidate("cand-7", "Barbara Liskov", "Product Manager", Stage::OnHold);

    let mut linus = candidate("cand-8", "Linus Pauling", "Software Engineer", Stage::Rejected);
    linus.ratings.push(rating("morgan", 2.0));

    vec![ada, grace, alan, katherine, margaret, edsger, barbara, linus]
}

pub(super) fn config() -> PipelineConfig {
    PipelineConfig::default()
}

pub(super) fn names<'a>(candidates: impl IntoIterator<Item = &'a Candidate>) -> Vec<&'a str> {
    candidates
        .into_iter()
        .map(|candidate| candidate.name.as_str())
        .collect()
}

/// In-memory candidate table that can be told to reject writes for specific ids.
#[derive(Default, Clone)]
pub(super) struct MemoryStore {
    records: Arc<Mutex<Vec<Candidate>>>,
    failing: Arc<Mutex<HashSet<CandidateId>>>,
    writes: Arc<Mutex<usize>>,
}

impl MemoryStore {
    pub(super) fn seeded(candidates: Vec<Candidate>) -> Self {
        let store = Self::default();
        *store.records.lock().expect("store mutex poisoned") = candidates;
        store
    }

    pub(super) fn fail_writes_for(&self, ids: &[&str]) {
        let mut guard = self.failing.lock().expect("store mutex poisoned");
        guard.clear();
        guard.extend(ids.iter().map(|raw| id(raw)));
    }

    pub(super) fn records(&self) -> Vec<Candidate> {
        self.records.lock().expect("store mutex poisoned").clone()
    }

    pub(super) fn record(&self, raw_id: &str) -> Option<Candidate> {
        self.records()
            .into_iter()
            .find(|candidate| candidate.id.0 == raw_id)
    }

    pub(super) fn writes(&self) -> usize {
        *self.writes.lock().expect("store mutex poisoned")
    }

    fn check(&self, candidate: &CandidateId) -> Result<(), StoreError> {
        if self
            .failing
            .lock()
            .expect("store mutex poisoned")
            .contains(candidate)
        {
            return Err(StoreError::Unavailable("injected failure".to_string()));
        }
        *self.writes.lock().expect("store mutex poisoned") += 1;
        Ok(())
    }

    fn with_record<T>(
        &self,
        candidate: &CandidateId,
        change: impl FnOnce(&mut Candidate) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut guard = self.records.lock().expect("store mutex poisoned");
        let record = guard
            .iter_mut()
            .find(|record| &record.id == candidate)
            .ok_or(StoreError::NotFound)?;
        change(record)
    }
}

impl CandidateStore for MemoryStore {
    fn list_candidates(&self, job_id: Option<&JobId>) -> Result<Vec<Candidate>, StoreError> {
        Ok(self
            .records()
            .into_iter()
            .filter(|candidate| job_id.map_or(true, |job| &candidate.job_id == job))
            .collect())
    }

    fn update_candidate(
        &self,
        candidate: &CandidateId,
        patch: &CandidatePatch,
    ) -> Result<Candidate, StoreError> {
        self.check(candidate)?;
        self.with_record(candidate, |record| {
            patch.apply_to(record);
            Ok(record.clone())
        })
    }

    fn delete_candidate(&self, candidate: &CandidateId) -> Result<(), StoreError> {
        self.check(candidate)?;
        let mut guard = self.records.lock().expect("store mutex poisoned");
        let before = guard.len();
        guard.retain(|record| &record.id != candidate);
        if guard.len() == before {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    fn insert_candidate(&self, candidate: &Candidate) -> Result<Candidate, StoreError> {
        let mut guard = self.records.lock().expect("store mutex poisoned");
        if guard.iter().any(|record| record.id == candidate.id) {
            return Err(StoreError::Conflict);
        }
        guard.push(candidate.clone());
        Ok(candidate.clone())
    }

    fn insert_rating(&self, candidate: &CandidateId, rating: &Rating) -> Result<(), StoreError> {
        self.check(candidate)?;
        self.with_record(candidate, |record| {
            record.ratings.push(rating.clone());
            Ok(())
        })
    }

    fn insert_note(&self, candidate: &CandidateId, note: &Note) -> Result<(), StoreError> {
        self.check(candidate)?;
        self.with_record(candidate, |record| {
            record.notes.push(note.clone());
            Ok(())
        })
    }

    fn update_note(&self, candidate: &CandidateId, note: &Note) -> Result<(), StoreError> {
        self.check(candidate)?;
        self.with_record(candidate, |record| {
            let existing = record
                .notes
                .iter_mut()
                .find(|existing| existing.id == note.id)
                .ok_or(StoreError::NotFound)?;
            *existing = note.clone();
            Ok(())
        })
    }

    fn delete_note(&self, candidate: &CandidateId, note_id: &NoteId) -> Result<(), StoreError> {
        self.check(candidate)?;
        self.with_record(candidate, |record| {
            record.notes.retain(|note| &note.id != note_id);
            Ok(())
        })
    }
}

#[derive(Default, Clone)]
pub(super) struct MemoryNotifications {
    events: Arc<Mutex<Vec<Notification>>>,
}

impl NotificationSink for MemoryNotifications {
    fn publish(&self, notification: &Notification) {
        self.events
            .lock()
            .expect("notification mutex poisoned")
            .push(notification.clone());
    }
}

impl MemoryNotifications {
    pub(super) fn events(&self) -> Vec<Notification> {
        self.events
            .lock()
            .expect("notification mutex poisoned")
            .clone()
    }

    pub(super) fn last(&self) -> Option<Notification> {
        self.events().pop()
    }
}

#[derive(Default, Clone)]
pub(super) struct MemorySavedFilters {
    entries: Arc<Mutex<Vec<SavedFilter>>>,
}

impl SavedFilterStore for MemorySavedFilters {
    fn list_saved(&self) -> Result<Vec<SavedFilter>, StoreError> {
        Ok(self.entries.lock().expect("filter mutex poisoned").clone())
    }

    fn fetch_saved(&self, id: &SavedFilterId) -> Result<Option<SavedFilter>, StoreError> {
        Ok(self
            .entries
            .lock()
            .expect("filter mutex poisoned")
            .iter()
            .find(|entry| &entry.id == id)
            .cloned())
    }

    fn insert_saved(&self, filter: &SavedFilter) -> Result<(), StoreError> {
        self.entries
            .lock()
            .expect("filter mutex poisoned")
            .push(filter.clone());
        Ok(())
    }

    fn update_saved(&self, filter: &SavedFilter) -> Result<(), StoreError> {
        let mut guard = self.entries.lock().expect("filter mutex poisoned");
        let existing = guard
            .iter_mut()
            .find(|entry| entry.id == filter.id)
            .ok_or(StoreError::NotFound)?;
        *existing = filter.clone();
        Ok(())
    }

    fn delete_saved(&self, id: &SavedFilterId) -> Result<(), StoreError> {
        self.entries
            .lock()
            .expect("filter mutex poisoned")
            .retain(|entry| &entry.id != id);
        Ok(())
    }
}

pub(super) type TestSession = PipelineSession<MemoryStore, MemoryNotifications>;

pub(super) fn build_session() -> (TestSession, Arc<MemoryStore>, Arc<MemoryNotifications>) {
    let store = Arc::new(MemoryStore::seeded(roster()));
    let notifications = Arc::new(MemoryNotifications::default());
    let mut session = PipelineSession::new(store.clone(), notifications.clone(), &config());
    session.load(Some(job())).expect("roster loads");
    (session, store, notifications)
}

pub(super) fn build_state() -> (PipelineState, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::seeded(roster()));
    let candidates: Arc<dyn CandidateStore> = store.clone();
    let notifications: Arc<dyn NotificationSink> = Arc::new(MemoryNotifications::default());
    let mut session = PipelineSession::new(candidates, notifications, &config());
    session.load(None).expect("roster loads");

    let saved: Arc<dyn SavedFilterStore> = Arc::new(MemorySavedFilters::default());
    let registry = SavedFilterRegistry::new(saved, config().share_base_url);
    (PipelineState::new(session, registry), store)
}

pub(super) fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(axum::http::header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(&body).expect("serializable body")))
        .expect("valid request")
}

pub(super) async fn json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body readable");
    serde_json::from_slice(&bytes).expect("json body")
}

pub(super) async fn expect_status(response: Response, status: StatusCode) -> Value {
    assert_eq!(response.status(), status);
    json_body(response).await
}
