use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use hallpass_core::HallpassError;

/// JSON API error rendered as `{"error": message}` with the mapped status.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.into(),
        }
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            message: msg.into(),
        }
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::FORBIDDEN,
            message: msg.into(),
        }
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: msg.into(),
        }
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::CONFLICT,
            message: msg.into(),
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: msg.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.message });
        (self.status, Json(body)).into_response()
    }
}

impl From<HallpassError> for ApiError {
    fn from(err: HallpassError) -> Self {
        match &err {
            HallpassError::InvalidInput(_) | HallpassError::InvalidTimeSlot(_) => {
                Self::bad_request(err.to_string())
            }
            HallpassError::NotFound(_) => Self::not_found(err.to_string()),
            HallpassError::Conflict(_) => Self::conflict(err.to_string()),
            HallpassError::Forbidden(_) => Self::forbidden(err.to_string()),
            HallpassError::Unauthorized(_) => Self::unauthorized(err.to_string()),
            // Storage, LLM, and the rest stay server-side; clients get a
            // generic message.
            _ => {
                tracing::error!("api error: {err}");
                Self::internal("something went wrong, please try again")
            }
        }
    }
}
