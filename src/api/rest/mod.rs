pub mod drivers;
pub mod extract;
pub mod missions;
pub mod quotes;
pub mod ws;

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Json;
use axum::Router;
use serde::Serialize;
use tower_http::cors::CorsLayer;

use crate::engine::store::DispatchStats;
use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(quotes::router())
        .merge(missions::router())
        .merge(drivers::router())
        .route("/stats", get(stats))
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/ws", get(ws::ws_handler))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    missions: usize,
    drivers: usize,
    drivers_available: usize,
    consistent: bool,
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        missions: state.store.mission_count(),
        drivers: state.store.driver_count(),
        drivers_available: state.store.available_driver_count(),
        consistent: state.store.consistency_violations().is_empty(),
    })
}

async fn stats(State(state): State<Arc<AppState>>) -> Json<DispatchStats> {
    Json(state.store.stats())
}

async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.refresh_driver_gauge();

    match state.metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err).into_response(),
    }
}
