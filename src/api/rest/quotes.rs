use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::Json;
use axum::Router;
use serde::Deserialize;

use crate::error::AppError;
use crate::models::location::Location;
use crate::pricing::{self, Quote};
use crate::state::AppState;

use super::extract::AppJson;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/quotes", post(create_quote))
}

#[derive(Deserialize)]
pub struct QuoteRequest {
    pub pickup: Location,
    pub destination: Location,
    pub weight: f64,
    #[serde(default)]
    pub urgent: bool,
}

async fn create_quote(
    State(state): State<Arc<AppState>>,
    AppJson(payload): AppJson<QuoteRequest>,
) -> Result<Json<Quote>, AppError> {
    if !payload.pickup.is_valid() || !payload.destination.is_valid() {
        return Err(AppError::BadRequest(
            "coordinates must have lat in [-90, 90] and lng in [-180, 180]".to_string(),
        ));
    }

    if !payload.weight.is_finite() || payload.weight < 0.0 {
        return Err(AppError::BadRequest("weight must be >= 0".to_string()));
    }

    let quote = pricing::quote(
        &payload.pickup,
        &payload.destination,
        payload.weight,
        payload.urgent,
        state.store.pricing(),
    );
    state.metrics.quoted_price.observe(f64::from(quote.price));

    Ok(Json(quote))
}
