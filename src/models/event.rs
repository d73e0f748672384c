use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::mission::MissionStatus;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MissionAction {
    Created,
    Assigned,
    Accepted,
    Started,
    Completed,
    Cancelled,
    NotesUpdated,
}

impl MissionAction {
    pub fn as_str(self) -> &'static str {
        match self {
            MissionAction::Created => "created",
            MissionAction::Assigned => "assigned",
            MissionAction::Accepted => "accepted",
            MissionAction::Started => "started",
            MissionAction::Completed => "completed",
            MissionAction::Cancelled => "cancelled",
            MissionAction::NotesUpdated => "notes_updated",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissionEvent {
    pub mission_id: Uuid,
    pub command_number: String,
    pub action: MissionAction,
    pub status: MissionStatus,
    pub driver_id: Option<Uuid>,
    pub at: DateTime<Utc>,
}
