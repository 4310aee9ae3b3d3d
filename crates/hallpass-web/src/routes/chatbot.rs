use std::sync::Arc;

use axum::extract::State;
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use chrono::Utc;
use serde::Deserialize;

use hallpass_core::chat::{self, DialogueOrchestrator, HistoryTurn};
use hallpass_core::storage::ReservationStore;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/chatbot", post(chat))
        .route("/chatbot/quick-info", get(quick_info))
}

#[derive(Debug, Deserialize)]
struct ChatRequest {
    #[serde(default)]
    message: String,
    #[serde(default, rename = "conversationHistory")]
    conversation_history: Vec<HistoryTurn>,
}

async fn chat(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<ChatRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let message = req.message.trim();
    if message.is_empty() {
        return Err(ApiError::bad_request("message is required"));
    }

    let Some(llm) = &state.llm else {
        tracing::error!("chatbot request received but no LLM is configured");
        return Err(ApiError::internal("the assistant is unavailable right now"));
    };

    let reply = DialogueOrchestrator::new(&state.service, llm)
        .run(
            user.id,
            &user.username,
            message,
            &req.conversation_history,
            Utc::now().date_naive(),
        )
        .await?;

    Ok(Json(serde_json::json!({
        "success": true,
        "reply": reply,
    })))
}

async fn quick_info(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
) -> Result<Json<serde_json::Value>, ApiError> {
    let week = chat::week_info(Utc::now().date_naive());
    let rooms = state.service.store().list_rooms().await?;
    let this_week = state
        .service
        .list_for_week(week.week_start, week.week_end)
        .await?;

    Ok(Json(serde_json::json!({
        "success": true,
        "weekInfo": week,
        "rooms": rooms,
        "thisWeekReservations": this_week,
    })))
}
