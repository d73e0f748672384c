use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::driver::Driver;
use crate::models::location::Location;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MissionStatus {
    Pending,
    Assigned,
    Accepted,
    InProgress,
    Completed,
    Cancelled,
}

impl MissionStatus {
    pub const ALL: [MissionStatus; 6] = [
        MissionStatus::Pending,
        MissionStatus::Assigned,
        MissionStatus::Accepted,
        MissionStatus::InProgress,
        MissionStatus::Completed,
        MissionStatus::Cancelled,
    ];

    pub fn is_terminal(self) -> bool {
        matches!(self, MissionStatus::Completed | MissionStatus::Cancelled)
    }

    pub fn is_active(self) -> bool {
        matches!(
            self,
            MissionStatus::Assigned | MissionStatus::Accepted | MissionStatus::InProgress
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MissionStatus::Pending => "pending",
            MissionStatus::Assigned => "assigned",
            MissionStatus::Accepted => "accepted",
            MissionStatus::InProgress => "in_progress",
            MissionStatus::Completed => "completed",
            MissionStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for MissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignedDriver {
    pub id: Uuid,
    pub name: String,
    pub phone: String,
}

impl From<&Driver> for AssignedDriver {
    fn from(driver: &Driver) -> Self {
        Self {
            id: driver.id,
            name: driver.name.clone(),
            phone: driver.phone.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mission {
    pub id: Uuid,
    pub command_number: String,
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_email: Option<String>,
    pub pickup: Location,
    pub destination: Location,
    pub weight: f64,
    pub urgent: bool,
    pub price: u32,
    pub distance_km: f64,
    pub status: MissionStatus,
    pub driver: Option<AssignedDriver>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub estimated_pickup_time: Option<DateTime<Utc>>,
    pub estimated_delivery_time: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

impl Mission {
    pub fn driver_id(&self) -> Option<Uuid> {
        self.driver.as_ref().map(|driver| driver.id)
    }

    pub fn matches_search(&self, term: &str) -> bool {
        let term = term.trim().to_lowercase();
        if term.is_empty() {
            return true;
        }

        self.command_number.to_lowercase().contains(&term)
            || self.customer_name.to_lowercase().contains(&term)
    }
}
