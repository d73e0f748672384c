use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::{get, post, put};
use axum::Json;
use axum::Router;
use serde::Deserialize;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};
use tracing::warn;
use uuid::Uuid;

use crate::engine::scoring::Candidate;
use crate::engine::store::{MissionFilter, NewMission, TransitionOutcome};
use crate::engine::transitions::Transition;
use crate::error::AppError;
use crate::models::mission::Mission;
use crate::state::AppState;

use super::extract::{AppJson, AppPath, AppQuery};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/missions", post(create_mission).get(list_missions))
        .route("/missions/:code", get(get_mission))
        .route("/missions/:code/assign", post(assign_driver))
        .route("/missions/:code/accept", post(accept_mission))
        .route("/missions/:code/start", post(start_mission))
        .route("/missions/:code/complete", post(complete_mission))
        .route("/missions/:code/cancel", post(cancel_mission))
        .route("/missions/:code/notes", put(update_notes))
        .route("/missions/:code/candidates", get(list_candidates))
        .route("/missions/:code/events", get(mission_events))
}

#[derive(Deserialize)]
pub struct AssignRequest {
    pub driver_id: Uuid,
}

#[derive(Deserialize)]
pub struct NotesRequest {
    pub notes: Option<String>,
}

async fn create_mission(
    State(state): State<Arc<AppState>>,
    AppJson(payload): AppJson<NewMission>,
) -> Result<Json<Mission>, AppError> {
    let mission = state.store.create_mission(payload)?;

    state.metrics.missions_created_total.inc();
    state.metrics.quoted_price.observe(f64::from(mission.price));

    Ok(Json(mission))
}

async fn list_missions(
    State(state): State<Arc<AppState>>,
    AppQuery(filter): AppQuery<MissionFilter>,
) -> Json<Vec<Mission>> {
    Json(state.store.list_missions(&filter))
}

async fn get_mission(
    State(state): State<Arc<AppState>>,
    AppPath(code): AppPath<String>,
) -> Result<Json<Mission>, AppError> {
    state.store.get_mission(&code).map(Json)
}

async fn assign_driver(
    State(state): State<Arc<AppState>>,
    AppPath(code): AppPath<String>,
    AppJson(payload): AppJson<AssignRequest>,
) -> Result<Json<TransitionOutcome>, AppError> {
    let result = state.store.assign(&code, payload.driver_id);
    committed(&state, Transition::Assign, result)
}

async fn accept_mission(
    State(state): State<Arc<AppState>>,
    AppPath(code): AppPath<String>,
) -> Result<Json<TransitionOutcome>, AppError> {
    let result = state.store.accept(&code);
    committed(&state, Transition::Accept, result)
}

async fn start_mission(
    State(state): State<Arc<AppState>>,
    AppPath(code): AppPath<String>,
) -> Result<Json<TransitionOutcome>, AppError> {
    let result = state.store.start(&code);
    committed(&state, Transition::Start, result)
}

async fn complete_mission(
    State(state): State<Arc<AppState>>,
    AppPath(code): AppPath<String>,
) -> Result<Json<TransitionOutcome>, AppError> {
    let result = state.store.complete(&code);
    committed(&state, Transition::Complete, result)
}

async fn cancel_mission(
    State(state): State<Arc<AppState>>,
    AppPath(code): AppPath<String>,
) -> Result<Json<TransitionOutcome>, AppError> {
    let result = state.store.cancel(&code);
    committed(&state, Transition::Cancel, result)
}

fn committed(
    state: &AppState,
    transition: Transition,
    result: Result<TransitionOutcome, AppError>,
) -> Result<Json<TransitionOutcome>, AppError> {
    state
        .metrics
        .record_transition(transition.as_str(), result.is_ok());

    if let Err(err) = &result {
        warn!(action = transition.as_str(), error = %err, "transition rejected");
    } else {
        state.refresh_driver_gauge();
    }

    result.map(Json)
}

async fn update_notes(
    State(state): State<Arc<AppState>>,
    AppPath(code): AppPath<String>,
    AppJson(payload): AppJson<NotesRequest>,
) -> Result<Json<Mission>, AppError> {
    state.store.update_notes(&code, payload.notes).map(Json)
}

async fn list_candidates(
    State(state): State<Arc<AppState>>,
    AppPath(code): AppPath<String>,
) -> Result<Json<Vec<Candidate>>, AppError> {
    state.store.candidates(&code).map(Json)
}

/// Current mission as a `snapshot` event, then one event per committed change.
async fn mission_events(
    State(state): State<Arc<AppState>>,
    AppPath(code): AppPath<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let rx = state.store.subscribe();
    let mission = state.store.get_mission(&code)?;
    let mission_id = mission.id;

    let snapshot = Event::default()
        .event("snapshot")
        .json_data(&mission)
        .map_err(|err| AppError::Internal(format!("failed to encode mission: {err}")))?;

    let updates = BroadcastStream::new(rx).filter_map(move |result| {
        let event = result.ok().filter(|event| event.mission_id == mission_id)?;
        match Event::default().event(event.action.as_str()).json_data(&event) {
            Ok(sse) => Some(Ok::<_, Infallible>(sse)),
            Err(err) => {
                warn!(error = %err, "failed to serialize mission event for sse");
                None
            }
        }
    });

    let stream = tokio_stream::once(Ok::<_, Infallible>(snapshot)).chain(updates);
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
