use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, patch, post};
use axum::Json;
use axum::Router;
use serde::Deserialize;
use uuid::Uuid;

use crate::engine::store::{DriverUpdate, NewDriver};
use crate::error::AppError;
use crate::models::driver::Driver;
use crate::models::location::Location;
use crate::state::AppState;

use super::extract::{AppJson, AppPath, AppQuery};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/drivers", post(create_driver).get(list_drivers))
        .route(
            "/drivers/:id",
            get(get_driver).patch(update_driver).delete(delete_driver),
        )
        .route("/drivers/:id/location", patch(update_driver_location))
        .route("/drivers/:id/availability", patch(update_driver_availability))
}

#[derive(Deserialize)]
pub struct ListDriversQuery {
    #[serde(default)]
    pub available: bool,
}

#[derive(Deserialize)]
pub struct UpdateLocationRequest {
    pub location: Location,
}

#[derive(Deserialize)]
pub struct UpdateAvailabilityRequest {
    pub is_available: bool,
}

async fn create_driver(
    State(state): State<Arc<AppState>>,
    AppJson(payload): AppJson<NewDriver>,
) -> Result<Json<Driver>, AppError> {
    let driver = state.store.create_driver(payload)?;
    state.refresh_driver_gauge();
    Ok(Json(driver))
}

async fn list_drivers(
    State(state): State<Arc<AppState>>,
    AppQuery(query): AppQuery<ListDriversQuery>,
) -> Json<Vec<Driver>> {
    Json(state.store.list_drivers(query.available))
}

async fn get_driver(
    State(state): State<Arc<AppState>>,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<Driver>, AppError> {
    state.store.get_driver(id).map(Json)
}

async fn update_driver(
    State(state): State<Arc<AppState>>,
    AppPath(id): AppPath<Uuid>,
    AppJson(payload): AppJson<DriverUpdate>,
) -> Result<Json<Driver>, AppError> {
    state.store.update_driver(id, payload).map(Json)
}

async fn update_driver_location(
    State(state): State<Arc<AppState>>,
    AppPath(id): AppPath<Uuid>,
    AppJson(payload): AppJson<UpdateLocationRequest>,
) -> Result<Json<Driver>, AppError> {
    state
        .store
        .update_driver_location(id, payload.location)
        .map(Json)
}

async fn update_driver_availability(
    State(state): State<Arc<AppState>>,
    AppPath(id): AppPath<Uuid>,
    AppJson(payload): AppJson<UpdateAvailabilityRequest>,
) -> Result<Json<Driver>, AppError> {
    let driver = state.store.set_availability(id, payload.is_available)?;
    state.refresh_driver_gauge();
    Ok(Json(driver))
}

async fn delete_driver(
    State(state): State<Arc<AppState>>,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<Driver>, AppError> {
    let driver = state.store.delete_driver(id)?;
    state.refresh_driver_gauge();
    Ok(Json(driver))
}
