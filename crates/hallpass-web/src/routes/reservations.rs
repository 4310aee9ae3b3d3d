use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use serde::Deserialize;

use hallpass_core::model::{Reservation, ReservationFilter};
use hallpass_core::storage::ReservationStore;
use hallpass_core::timeslot;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/reservations", get(list_reservations).post(create_reservation))
        .route("/reservations/my", get(my_reservations))
        .route("/reservations/{id}", axum::routing::delete(cancel_reservation))
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    room_id: Option<i64>,
    user_id: Option<i64>,
    date: Option<String>,
}

async fn list_reservations(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Reservation>>, ApiError> {
    let date = query.date.as_deref().map(timeslot::parse_date).transpose()?;
    let filter = ReservationFilter {
        room_id: query.room_id,
        user_id: query.user_id,
        date,
        ..Default::default()
    };
    Ok(Json(state.service.store().list_reservations(&filter).await?))
}

#[derive(Debug, Deserialize)]
struct CreateReservationRequest {
    room_id: Option<i64>,
    reservation_date: Option<String>,
    start_time: Option<String>,
    end_time: Option<String>,
}

async fn create_reservation(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<CreateReservationRequest>,
) -> Result<(StatusCode, Json<Reservation>), ApiError> {
    let room_id = req
        .room_id
        .ok_or_else(|| ApiError::bad_request("room_id is required"))?;
    let date = req
        .reservation_date
        .as_deref()
        .ok_or_else(|| ApiError::bad_request("reservation_date is required"))
        .and_then(|s| Ok(timeslot::parse_date(s)?))?;
    let start = req
        .start_time
        .as_deref()
        .ok_or_else(|| ApiError::bad_request("start_time is required"))
        .and_then(|s| Ok(timeslot::parse_time(s)?))?;
    let end = req
        .end_time
        .as_deref()
        .ok_or_else(|| ApiError::bad_request("end_time is required"))
        .and_then(|s| Ok(timeslot::parse_time(s)?))?;

    let reservation = state.service.create(user.id, room_id, date, start, end).await?;
    Ok((StatusCode::CREATED, Json(reservation)))
}

async fn cancel_reservation(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.service.cancel(user.id, id).await?;
    Ok(Json(serde_json::json!({ "message": "reservation cancelled" })))
}

async fn my_reservations(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<Vec<Reservation>>, ApiError> {
    Ok(Json(state.service.list_all_for_user(user.id).await?))
}

#[cfg(test)]
mod tests {
    use crate::routes::test_support::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn authed_json(method: &str, uri: &str, token: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .header("authorization", format!("Bearer {token}"))
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn create_room(state: &Arc<crate::AppState>, token: &str, name: &str) -> i64 {
        let resp = test_router_with(state.clone())
            .oneshot(authed_json(
                "POST",
                "/rooms",
                token,
                serde_json::json!({"name": name}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        body_json(resp.into_body()).await["id"].as_i64().unwrap()
    }

    fn booking(room_id: i64, date: &str, start: &str, end: &str) -> serde_json::Value {
        serde_json::json!({
            "room_id": room_id,
            "reservation_date": date,
            "start_time": start,
            "end_time": end,
        })
    }

    #[tokio::test]
    async fn test_booking_conflict_scenario() {
        let state = test_state();
        let token = register_user(&state, "alice").await;
        let room = create_room(&state, &token, "Alpha").await;

        // 09:00-10:00 succeeds.
        let resp = test_router_with(state.clone())
            .oneshot(authed_json(
                "POST",
                "/reservations",
                &token,
                booking(room, "2024-03-04", "09:00", "10:00"),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        let json = body_json(resp.into_body()).await;
        assert_eq!(json["start_time"], "09:00");

        // 09:30-10:30 conflicts.
        let resp = test_router_with(state.clone())
            .oneshot(authed_json(
                "POST",
                "/reservations",
                &token,
                booking(room, "2024-03-04", "09:30", "10:30"),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CONFLICT);

        // 10:00-11:00 is adjacent and succeeds.
        let resp = test_router_with(state)
            .oneshot(authed_json(
                "POST",
                "/reservations",
                &token,
                booking(room, "2024-03-04", "10:00", "11:00"),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
    }

    #[tokio::test]
    async fn test_validation_and_missing_room_statuses() {
        let state = test_state();
        let token = register_user(&state, "alice").await;
        let room = create_room(&state, &token, "Alpha").await;

        // Off-grid time.
        let resp = test_router_with(state.clone())
            .oneshot(authed_json(
                "POST",
                "/reservations",
                &token,
                booking(room, "2024-03-04", "09:15", "10:00"),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        // Missing field.
        let resp = test_router_with(state.clone())
            .oneshot(authed_json(
                "POST",
                "/reservations",
                &token,
                serde_json::json!({"room_id": room}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        // Unknown room.
        let resp = test_router_with(state)
            .oneshot(authed_json(
                "POST",
                "/reservations",
                &token,
                booking(999, "2024-03-04", "09:00", "10:00"),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_create_requires_auth() {
        let resp = test_router()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/reservations")
                    .header("content-type", "application/json")
                    .body(Body::from(booking(1, "2024-03-04", "09:00", "10:00").to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_cancel_ownership_and_missing() {
        let state = test_state();
        let alice = register_user(&state, "alice").await;
        let bob = register_user(&state, "bob").await;
        let room = create_room(&state, &alice, "Alpha").await;

        let resp = test_router_with(state.clone())
            .oneshot(authed_json(
                "POST",
                "/reservations",
                &alice,
                booking(room, "2024-03-04", "09:00", "10:00"),
            ))
            .await
            .unwrap();
        let id = body_json(resp.into_body()).await["id"].as_i64().unwrap();

        // Bob cannot cancel Alice's booking.
        let resp = test_router_with(state.clone())
            .oneshot(authed_json(
                "DELETE",
                &format!("/reservations/{id}"),
                &bob,
                serde_json::json!({}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        // Alice can; a second attempt is 404.
        let resp = test_router_with(state.clone())
            .oneshot(authed_json(
                "DELETE",
                &format!("/reservations/{id}"),
                &alice,
                serde_json::json!({}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = test_router_with(state)
            .oneshot(authed_json(
                "DELETE",
                &format!("/reservations/{id}"),
                &alice,
                serde_json::json!({}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_list_filters_and_my_reservations() {
        let state = test_state();
        let alice = register_user(&state, "alice").await;
        let bob = register_user(&state, "bob").await;
        let room = create_room(&state, &alice, "Alpha").await;

        for (token, date, start, end) in [
            (&alice, "2024-03-04", "09:00", "10:00"),
            (&alice, "2024-03-05", "09:00", "10:00"),
            (&bob, "2024-03-04", "11:00", "12:00"),
        ] {
            let resp = test_router_with(state.clone())
                .oneshot(authed_json(
                    "POST",
                    "/reservations",
                    token,
                    booking(room, date, start, end),
                ))
                .await
                .unwrap();
            assert_eq!(resp.status(), StatusCode::CREATED);
        }

        // Public listing with a date filter, joined fields included.
        let resp = test_router_with(state.clone())
            .oneshot(
                Request::builder()
                    .uri("/reservations?date=2024-03-04")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp.into_body()).await;
        let list = json.as_array().unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0]["username"], "alice");
        assert_eq!(list[0]["room_name"], "Alpha");

        // Bad date filter.
        let resp = test_router_with(state.clone())
            .oneshot(
                Request::builder()
                    .uri("/reservations?date=tomorrow")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        // /reservations/my only shows the caller's, newest date first.
        let resp = test_router_with(state)
            .oneshot(
                Request::builder()
                    .uri("/reservations/my")
                    .header("authorization", format!("Bearer {alice}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp.into_body()).await;
        let list = json.as_array().unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0]["reservation_date"], "2024-03-05");
    }
}
