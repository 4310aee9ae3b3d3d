use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use serde::Deserialize;

use hallpass_core::model::{Room, RoomInput};
use hallpass_core::storage::ReservationStore;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/rooms", get(list_rooms).post(create_room))
        .route(
            "/rooms/{id}",
            get(get_room).put(update_room).delete(delete_room),
        )
}

#[derive(Debug, Deserialize)]
struct RoomRequest {
    #[serde(default)]
    name: String,
    description: Option<String>,
    capacity: Option<i64>,
}

impl RoomRequest {
    fn into_input(self) -> Result<RoomInput, ApiError> {
        Ok(RoomInput::new(&self.name, self.description, self.capacity)?)
    }
}

async fn list_rooms(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Room>>, ApiError> {
    Ok(Json(state.service.store().list_rooms().await?))
}

async fn get_room(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Room>, ApiError> {
    Ok(Json(state.service.store().get_room(id).await?))
}

async fn create_room(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Json(req): Json<RoomRequest>,
) -> Result<(StatusCode, Json<Room>), ApiError> {
    let room = state
        .service
        .store()
        .create_room(&req.into_input()?)
        .await?;
    Ok((StatusCode::CREATED, Json(room)))
}

async fn update_room(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(id): Path<i64>,
    Json(req): Json<RoomRequest>,
) -> Result<Json<Room>, ApiError> {
    let room = state
        .service
        .store()
        .update_room(id, &req.into_input()?)
        .await?;
    Ok(Json(room))
}

async fn delete_room(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.service.store().delete_room(id).await?;
    Ok(Json(serde_json::json!({ "message": "room deleted" })))
}
