use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::location::Location;

pub const MAX_RATING: f64 = 5.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Driver {
    pub id: Uuid,
    pub name: String,
    pub phone: String,
    pub vehicle_type: String,
    pub license_plate: String,
    pub is_available: bool,
    pub current_location: Option<Location>,
    pub rating: f64,
    pub completed_missions: u32,
    pub updated_at: DateTime<Utc>,
}
