use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::bulk::{BulkCommand, BulkError, BulkOutcome, UndoError, UndoToken};
use super::domain::{CandidateId, CandidateView, JobId, NoteId, RatingCategory, ReviewerId};
use super::filter::FilterState;
use super::notes::{NoteDraft, NoteEdit, NoteError, NoteQuery};
use super::ratings::RatingError;
use super::repository::{CandidateStore, NotificationSink};
use super::saved_filters::{
    load_shared, SavedFilterError, SavedFilterId, SavedFilterRegistry, SavedFilterStore,
};
use super::selection::SelectionScope;
use super::session::{MoveOutcome, PipelineSession, SessionError, StageCount};
use super::stage::Stage;

pub const REVIEWER_HEADER: &str = "x-reviewer-id";

pub type SharedSession = Arc<Mutex<PipelineSession<dyn CandidateStore, dyn NotificationSink>>>;

/// State shared by every pipeline handler.
#[derive(Clone)]
pub struct PipelineState {
    pub session: SharedSession,
    pub saved_filters: Arc<SavedFilterRegistry<dyn SavedFilterStore>>,
}

impl PipelineState {
    pub fn new(
        session: PipelineSession<dyn CandidateStore, dyn NotificationSink>,
        saved_filters: SavedFilterRegistry<dyn SavedFilterStore>,
    ) -> Self {
        Self {
            session: Arc::new(Mutex::new(session)),
            saved_filters: Arc::new(saved_filters),
        }
    }

    /// A panicked handler leaves the session as it was before the failed call.
    pub fn lock(&self) -> MutexGuard<'_, PipelineSession<dyn CandidateStore, dyn NotificationSink>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Router builder exposing the candidate pipeline over JSON.
pub fn pipeline_router(state: PipelineState) -> Router {
    Router::new()
        .route("/api/v1/pipeline/candidates", get(list_handler))
        .route("/api/v1/pipeline/candidates/load", post(load_handler))
        .route(
            "/api/v1/pipeline/filter",
            put(replace_filter_handler).delete(clear_filter_handler),
        )
        .route("/api/v1/pipeline/filter/search", post(search_handler))
        .route("/api/v1/pipeline/selection", post(selection_handler))
        .route("/api/v1/pipeline/bulk", post(bulk_handler))
        .route("/api/v1/pipeline/undo", post(undo_handler))
        .route("/api/v1/pipeline/undo/dismiss", post(dismiss_handler))
        .route(
            "/api/v1/pipeline/candidates/:candidate_id/stage",
            post(move_handler),
        )
        .route(
            "/api/v1/pipeline/candidates/:candidate_id/ratings",
            get(rating_summary_handler).post(add_rating_handler),
        )
        .route(
            "/api/v1/pipeline/candidates/:candidate_id/notes",
            get(list_notes_handler).post(add_note_handler),
        )
        .route(
            "/api/v1/pipeline/candidates/:candidate_id/notes/:note_id",
            put(update_note_handler).delete(delete_note_handler),
        )
        .route(
            "/api/v1/pipeline/candidates/:candidate_id/notes/:note_id/pin",
            post(toggle_pin_handler),
        )
        .route(
            "/api/v1/pipeline/saved-filters",
            get(list_saved_handler).post(save_filter_handler),
        )
        .route(
            "/api/v1/pipeline/saved-filters/shared",
            post(load_shared_handler),
        )
        .route(
            "/api/v1/pipeline/saved-filters/:filter_id",
            delete(delete_saved_handler),
        )
        .route(
            "/api/v1/pipeline/saved-filters/:filter_id/load",
            post(load_saved_handler),
        )
        .route(
            "/api/v1/pipeline/saved-filters/:filter_id/share",
            post(share_saved_handler),
        )
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct PipelineSnapshot {
    total: usize,
    visible: usize,
    active_filters: usize,
    stages: Vec<StageCount>,
    filter: FilterState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pending_query: Option<String>,
    recent_searches: Vec<String>,
    selected: Vec<CandidateId>,
    candidates: Vec<CandidateView>,
}

fn snapshot(state: &PipelineState) -> PipelineSnapshot {
    let session = state.lock();
    let candidates = session.visible_views(Utc::now());
    PipelineSnapshot {
        total: session.candidates().len(),
        visible: candidates.len(),
        active_filters: session.filter().active_filter_count(),
        stages: session.stage_counts(),
        filter: session.filter().clone(),
        pending_query: session.pending_query().map(str::to_string),
        recent_searches: session.recent_searches().to_vec(),
        selected: session.selection().ids().iter().cloned().collect(),
        candidates,
    }
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    let payload = json!({ "error": message.into() });
    (status, Json(payload)).into_response()
}

fn reviewer_from(headers: &HeaderMap) -> Result<ReviewerId, Response> {
    headers
        .get(REVIEWER_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(|value| ReviewerId(value.to_string()))
        .ok_or_else(|| {
            error_response(
                StatusCode::UNAUTHORIZED,
                format!("missing {REVIEWER_HEADER} header"),
            )
        })
}

fn session_error_response(error: SessionError) -> Response {
    let status = match &error {
        SessionError::UnknownCandidate(_) => StatusCode::NOT_FOUND,
        SessionError::Rating(RatingError::OutOfRange(_) | RatingError::NotHalfStep(_)) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        SessionError::Note(NoteError::BlankContent) => StatusCode::UNPROCESSABLE_ENTITY,
        SessionError::Note(NoteError::NotFound(_)) => StatusCode::NOT_FOUND,
        SessionError::Note(NoteError::NotAuthor | NoteError::EditWindowClosed { .. }) => {
            StatusCode::FORBIDDEN
        }
        SessionError::Load(_)
        | SessionError::Move(_)
        | SessionError::Rating(RatingError::Store(_))
        | SessionError::Note(NoteError::Store(_)) => StatusCode::BAD_GATEWAY,
    };
    error_response(status, error.to_string())
}

fn saved_filter_error_response(error: SavedFilterError) -> Response {
    let status = match &error {
        SavedFilterError::BlankName => StatusCode::UNPROCESSABLE_ENTITY,
        SavedFilterError::NotFound(_) => StatusCode::NOT_FOUND,
        SavedFilterError::MissingParameter
        | SavedFilterError::Encoding(_)
        | SavedFilterError::Payload(_) => StatusCode::BAD_REQUEST,
        SavedFilterError::Store(_) => StatusCode::BAD_GATEWAY,
    };
    error_response(status, error.to_string())
}

fn parse_saved_id(raw: &str) -> Result<SavedFilterId, Response> {
    raw.parse()
        .map_err(|_| error_response(StatusCode::BAD_REQUEST, format!("invalid filter id '{raw}'")))
}

pub(crate) async fn list_handler(State(state): State<PipelineState>) -> Response {
    (StatusCode::OK, Json(snapshot(&state))).into_response()
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct LoadRequest {
    #[serde(default)]
    job_id: Option<JobId>,
}

pub(crate) async fn load_handler(
    State(state): State<PipelineState>,
    Json(request): Json<LoadRequest>,
) -> Response {
    let loaded = state.lock().load(request.job_id);
    match loaded {
        Ok(_) => (StatusCode::OK, Json(snapshot(&state))).into_response(),
        Err(error) => session_error_response(error),
    }
}

pub(crate) async fn replace_filter_handler(
    State(state): State<PipelineState>,
    Json(filter): Json<FilterState>,
) -> Response {
    state.lock().replace_filter(filter);
    (StatusCode::OK, Json(snapshot(&state))).into_response()
}

pub(crate) async fn clear_filter_handler(State(state): State<PipelineState>) -> Response {
    state.lock().clear_filter();
    (StatusCode::OK, Json(snapshot(&state))).into_response()
}

#[derive(Debug, Deserialize)]
pub(crate) struct SearchRequest {
    query: String,
    #[serde(default)]
    submit: bool,
}

/// Typing schedules the query; `submit` applies it immediately.
pub(crate) async fn search_handler(
    State(state): State<PipelineState>,
    Json(request): Json<SearchRequest>,
) -> Response {
    let status = {
        let mut session = state.lock();
        session.set_search_query(request.query, Utc::now());
        if request.submit {
            session.submit_search();
            StatusCode::OK
        } else {
            StatusCode::ACCEPTED
        }
    };
    (status, Json(snapshot(&state))).into_response()
}

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub(crate) enum SelectionRequest {
    Toggle {
        candidate_id: CandidateId,
    },
    Range {
        candidate_id: CandidateId,
        #[serde(default = "all_visible")]
        scope: SelectionScope,
    },
    SelectAll {
        #[serde(default = "all_visible")]
        scope: SelectionScope,
    },
    ToggleAll {
        #[serde(default = "all_visible")]
        scope: SelectionScope,
    },
    Clear,
}

fn all_visible() -> SelectionScope {
    SelectionScope::AllVisible
}

pub(crate) async fn selection_handler(
    State(state): State<PipelineState>,
    Json(request): Json<SelectionRequest>,
) -> Response {
    let mut session = state.lock();
    let (result, scope) = match request {
        SelectionRequest::Toggle { candidate_id } => {
            (session.toggle(&candidate_id), SelectionScope::AllVisible)
        }
        SelectionRequest::Range {
            candidate_id,
            scope,
        } => (session.select_range(&candidate_id, scope), scope),
        SelectionRequest::SelectAll { scope } => {
            session.select_all(scope);
            (Ok(()), scope)
        }
        SelectionRequest::ToggleAll { scope } => {
            session.toggle_all(scope);
            (Ok(()), scope)
        }
        SelectionRequest::Clear => {
            session.clear_selection();
            (Ok(()), SelectionScope::AllVisible)
        }
    };

    match result {
        Ok(()) => {
            let payload = json!({
                "selected": session.selection().ids(),
                "anchor": session.selection().anchor(),
                "state": session.selection_state(scope),
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(error) => session_error_response(error),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct BulkRequest {
    #[serde(flatten)]
    command: BulkCommand,
    #[serde(default)]
    confirmed: bool,
}

/// Gated commands sent without `confirmed` answer 409 with the prompt to show.
pub(crate) async fn bulk_handler(
    State(state): State<PipelineState>,
    Json(request): Json<BulkRequest>,
) -> Response {
    let confirmed = request.confirmed;
    let outcome = state
        .lock()
        .apply_bulk(&request.command, |_| confirmed, Utc::now());

    match outcome {
        Ok(BulkOutcome::Completed(receipt)) => (StatusCode::OK, Json(receipt)).into_response(),
        Ok(BulkOutcome::Declined(request)) => {
            let payload = json!({
                "error": "confirmation required",
                "confirmation": request,
            });
            (StatusCode::CONFLICT, Json(payload)).into_response()
        }
        Err(error) if error.is_validation() => {
            error_response(StatusCode::UNPROCESSABLE_ENTITY, error.to_string())
        }
        Err(BulkError::Store {
            action,
            attempted,
            failed,
            compensation_failed,
            source,
        }) => {
            let payload = json!({
                "error": format!(
                    "could not {action} {} of {attempted} candidate(s); changes were rolled back",
                    failed.len()
                ),
                "cause": source.to_string(),
                "failed": failed,
                "uncompensated": compensation_failed,
            });
            (StatusCode::BAD_GATEWAY, Json(payload)).into_response()
        }
        Err(error) => error_response(StatusCode::INTERNAL_SERVER_ERROR, error.to_string()),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct UndoRequest {
    token: UndoToken,
}

pub(crate) async fn undo_handler(
    State(state): State<PipelineState>,
    Json(request): Json<UndoRequest>,
) -> Response {
    let result = state.lock().undo(request.token, Utc::now());
    match result {
        Ok(notification) => (StatusCode::OK, Json(notification)).into_response(),
        Err(error @ UndoError::Expired) => error_response(StatusCode::GONE, error.to_string()),
        Err(error @ (UndoError::NothingToUndo | UndoError::UnknownToken(_))) => {
            error_response(StatusCode::NOT_FOUND, error.to_string())
        }
        Err(error @ UndoError::Store { .. }) => {
            error_response(StatusCode::BAD_GATEWAY, error.to_string())
        }
    }
}

pub(crate) async fn dismiss_handler(
    State(state): State<PipelineState>,
    Json(request): Json<UndoRequest>,
) -> Response {
    if state.lock().dismiss(request.token) {
        StatusCode::NO_CONTENT.into_response()
    } else {
        error_response(StatusCode::NOT_FOUND, "no open action for that token")
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct MoveRequest {
    stage: Stage,
    #[serde(default)]
    confirmed: bool,
}

pub(crate) async fn move_handler(
    State(state): State<PipelineState>,
    Path(candidate_id): Path<String>,
    Json(request): Json<MoveRequest>,
) -> Response {
    let id = CandidateId(candidate_id);
    let confirmed = request.confirmed;
    let result = state
        .lock()
        .move_candidate(&id, request.stage, |_| confirmed, Utc::now());

    match result {
        Ok(MoveOutcome::Moved(candidate)) => {
            (StatusCode::OK, Json(candidate.view(Utc::now()))).into_response()
        }
        Ok(MoveOutcome::Unchanged) => StatusCode::NO_CONTENT.into_response(),
        Ok(MoveOutcome::Declined(request)) => {
            let payload = json!({
                "error": "confirmation required",
                "confirmation": request,
            });
            (StatusCode::CONFLICT, Json(payload)).into_response()
        }
        Err(error) => session_error_response(error),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RatingRequest {
    score: f32,
    #[serde(default)]
    category: Option<RatingCategory>,
}

pub(crate) async fn add_rating_handler(
    State(state): State<PipelineState>,
    Path(candidate_id): Path<String>,
    headers: HeaderMap,
    Json(request): Json<RatingRequest>,
) -> Response {
    let reviewer = match reviewer_from(&headers) {
        Ok(reviewer) => reviewer,
        Err(response) => return response,
    };
    let id = CandidateId(candidate_id);
    let result = state
        .lock()
        .add_rating(&id, reviewer, request.score, request.category, Utc::now());
    match result {
        Ok(summary) => (StatusCode::CREATED, Json(summary)).into_response(),
        Err(error) => session_error_response(error),
    }
}

pub(crate) async fn rating_summary_handler(
    State(state): State<PipelineState>,
    Path(candidate_id): Path<String>,
) -> Response {
    let result = state.lock().rating_summary(&CandidateId(candidate_id));
    match result {
        Ok(summary) => (StatusCode::OK, Json(summary)).into_response(),
        Err(error) => session_error_response(error),
    }
}

pub(crate) async fn list_notes_handler(
    State(state): State<PipelineState>,
    Path(candidate_id): Path<String>,
    headers: HeaderMap,
    Query(query): Query<NoteQuery>,
) -> Response {
    let viewer = match reviewer_from(&headers) {
        Ok(viewer) => viewer,
        Err(response) => return response,
    };
    let result = state
        .lock()
        .notes(&CandidateId(candidate_id), &viewer, &query, Utc::now());
    match result {
        Ok(notes) => (StatusCode::OK, Json(notes)).into_response(),
        Err(error) => session_error_response(error),
    }
}

pub(crate) async fn add_note_handler(
    State(state): State<PipelineState>,
    Path(candidate_id): Path<String>,
    headers: HeaderMap,
    Json(draft): Json<NoteDraft>,
) -> Response {
    let author = match reviewer_from(&headers) {
        Ok(author) => author,
        Err(response) => return response,
    };
    let result = state
        .lock()
        .add_note(&CandidateId(candidate_id), author, draft, Utc::now());
    match result {
        Ok(note) => (StatusCode::CREATED, Json(note)).into_response(),
        Err(error) => session_error_response(error),
    }
}

pub(crate) async fn update_note_handler(
    State(state): State<PipelineState>,
    Path((candidate_id, note_id)): Path<(String, String)>,
    headers: HeaderMap,
    Json(edit): Json<NoteEdit>,
) -> Response {
    let editor = match reviewer_from(&headers) {
        Ok(editor) => editor,
        Err(response) => return response,
    };
    let result = state.lock().update_note(
        &CandidateId(candidate_id),
        &NoteId(note_id),
        &editor,
        edit,
        Utc::now(),
    );
    match result {
        Ok(note) => (StatusCode::OK, Json(note)).into_response(),
        Err(error) => session_error_response(error),
    }
}

pub(crate) async fn delete_note_handler(
    State(state): State<PipelineState>,
    Path((candidate_id, note_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    let editor = match reviewer_from(&headers) {
        Ok(editor) => editor,
        Err(response) => return response,
    };
    let result = state.lock().delete_note(
        &CandidateId(candidate_id),
        &NoteId(note_id),
        &editor,
        Utc::now(),
    );
    match result {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(error) => session_error_response(error),
    }
}

pub(crate) async fn toggle_pin_handler(
    State(state): State<PipelineState>,
    Path((candidate_id, note_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    let viewer = match reviewer_from(&headers) {
        Ok(viewer) => viewer,
        Err(response) => return response,
    };
    let result = state
        .lock()
        .toggle_pin(&CandidateId(candidate_id), &NoteId(note_id), &viewer);
    match result {
        Ok(note) => (StatusCode::OK, Json(note)).into_response(),
        Err(error) => session_error_response(error),
    }
}

pub(crate) async fn list_saved_handler(State(state): State<PipelineState>) -> Response {
    match state.saved_filters.list() {
        Ok(saved) => (StatusCode::OK, Json(saved)).into_response(),
        Err(error) => saved_filter_error_response(error),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct SaveFilterRequest {
    name: String,
    /// Defaults to the filter currently in force.
    #[serde(default)]
    filters: Option<FilterState>,
}

pub(crate) async fn save_filter_handler(
    State(state): State<PipelineState>,
    Json(request): Json<SaveFilterRequest>,
) -> Response {
    let filters = match request.filters {
        Some(filters) => filters,
        None => state.lock().filter().clone(),
    };
    match state.saved_filters.save(&request.name, filters, Utc::now()) {
        Ok(saved) => (StatusCode::CREATED, Json(saved)).into_response(),
        Err(error) => saved_filter_error_response(error),
    }
}

pub(crate) async fn delete_saved_handler(
    State(state): State<PipelineState>,
    Path(filter_id): Path<String>,
) -> Response {
    let id = match parse_saved_id(&filter_id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    match state.saved_filters.delete(&id) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(error) => saved_filter_error_response(error),
    }
}

pub(crate) async fn load_saved_handler(
    State(state): State<PipelineState>,
    Path(filter_id): Path<String>,
) -> Response {
    let id = match parse_saved_id(&filter_id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    match state.saved_filters.load(&id) {
        Ok(filters) => {
            state.lock().replace_filter(filters);
            (StatusCode::OK, Json(snapshot(&state))).into_response()
        }
        Err(error) => saved_filter_error_response(error),
    }
}

pub(crate) async fn share_saved_handler(
    State(state): State<PipelineState>,
    Path(filter_id): Path<String>,
) -> Response {
    let id = match parse_saved_id(&filter_id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    match state.saved_filters.share(&id) {
        Ok(link) => (StatusCode::OK, Json(json!({ "link": link }))).into_response(),
        Err(error) => saved_filter_error_response(error),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct SharedLinkRequest {
    link: String,
}

pub(crate) async fn load_shared_handler(
    State(state): State<PipelineState>,
    Json(request): Json<SharedLinkRequest>,
) -> Response {
    match load_shared(&request.link) {
        Ok(filters) => {
            state.lock().replace_filter(filters);
            (StatusCode::OK, Json(snapshot(&state))).into_response()
        }
        Err(error) => saved_filter_error_response(error),
    }
}
