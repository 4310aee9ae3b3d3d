use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{HallpassError, Result};

pub const MIN_USERNAME_LENGTH: usize = 3;
pub const MIN_PASSWORD_LENGTH: usize = 4;

/// A registered account. The password hash lives only in storage and is never
/// part of this struct, so it cannot leak through serialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

/// Validate credentials for registration.
pub fn validate_registration(username: &str, password: &str) -> Result<()> {
    if username.trim().is_empty() || password.is_empty() {
        return Err(HallpassError::InvalidInput(
            "username and password are required".into(),
        ));
    }
    if username.trim().len() < MIN_USERNAME_LENGTH {
        return Err(HallpassError::InvalidInput(format!(
            "username must be at least {MIN_USERNAME_LENGTH} characters"
        )));
    }
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(HallpassError::InvalidInput(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}
