use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{HallpassError, Result};

pub const DEFAULT_ROOM_CAPACITY: i64 = 10;

/// A bookable meeting room.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub capacity: i64,
    pub created_at: DateTime<Utc>,
}

/// Input for creating or replacing a room. Name is trimmed; description and
/// capacity fall back to defaults when absent.
#[derive(Debug, Clone)]
pub struct RoomInput {
    pub name: String,
    pub description: String,
    pub capacity: i64,
}

impl RoomInput {
    pub fn new(name: &str, description: Option<String>, capacity: Option<i64>) -> Result<Self> {
        let name = name.trim();
        if name.is_empty() {
            return Err(HallpassError::InvalidInput("room name is required".into()));
        }
        Ok(Self {
            name: name.to_string(),
            description: description.unwrap_or_default(),
            capacity: capacity.unwrap_or(DEFAULT_ROOM_CAPACITY),
        })
    }
}
