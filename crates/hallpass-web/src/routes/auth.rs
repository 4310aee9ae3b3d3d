use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;

use hallpass_core::model::validate_registration;
use hallpass_core::storage::ReservationStore;

use crate::auth::{self, AuthUser};
use crate::error::ApiError;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/me", get(me))
}

#[derive(Debug, Deserialize)]
struct CredentialsRequest {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CredentialsRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    validate_registration(&req.username, &req.password)?;

    let hash = auth::hash_password(&req.password)?;
    let user = state
        .service
        .store()
        .create_user(&req.username, &hash)
        .await?;
    let token = auth::issue_token(&user, &state.jwt_secret, state.config.auth.token_ttl_days)?;

    tracing::info!(user = user.id, "account created");
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "message": "account created",
            "user": user,
            "token": token,
        })),
    ))
}

async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CredentialsRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    // Same message for unknown user and bad password.
    let rejected = || ApiError::unauthorized("invalid username or password");

    let (user, hash) = state
        .service
        .store()
        .get_user_with_password(&req.username)
        .await?
        .ok_or_else(rejected)?;

    if !auth::verify_password(&req.password, &hash) {
        return Err(rejected());
    }

    let token = auth::issue_token(&user, &state.jwt_secret, state.config.auth.token_ttl_days)?;
    Ok(Json(serde_json::json!({
        "message": "login successful",
        "user": user,
        "token": token,
    })))
}

async fn me(user: AuthUser) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "user": { "id": user.id, "username": user.username },
    }))
}
