pub mod auth;
pub mod chatbot;
pub mod reservations;
pub mod rooms;

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use hallpass_core::storage::ReservationStore;

use crate::error::ApiError;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health))
        .merge(auth::routes())
        .merge(rooms::routes())
        .merge(reservations::routes())
        .merge(chatbot::routes())
        .fallback(not_found)
}

async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<serde_json::Value>) {
    let db_ok = state.service.store().ping().await.is_ok();

    let status = if db_ok {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (
        status,
        Json(serde_json::json!({
            "status": if db_ok { "ok" } else { "degraded" },
            "database": if db_ok { "connected" } else { "unavailable" },
        })),
    )
}

async fn not_found() -> ApiError {
    ApiError::not_found("no such endpoint")
}
