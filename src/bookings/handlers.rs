use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::{header, HeaderMap, HeaderValue, StatusCode},
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use super::dto::{
    AvailabilityResponse, CreateBookingRequest, DateQuery, DeleteQuery, ListQuery, MessageResponse,
    UpdateBookingRequest,
};
use super::repo_types::Booking;
use super::services;
use crate::{
    auth::AuthUser, error::ApiError, state::AppState, users::services::get_or_create_user,
};

pub fn read_router() -> Router<AppState> {
    Router::new()
        .route("/bookings", get(list_bookings))
        .route("/bookings/availability", get(get_availability))
}

pub fn write_router() -> Router<AppState> {
    Router::new().route(
        "/bookings",
        post(create_booking).put(update_booking).delete(delete_booking),
    )
}

/// GET /bookings?date=&user_id=
#[instrument(skip(state))]
pub async fn list_bookings(
    State(state): State<AppState>,
    q: Result<Query<ListQuery>, QueryRejection>,
) -> Result<Json<Vec<Booking>>, ApiError> {
    let Query(q) = q?;
    let bookings = services::list_bookings(&state, q.date.as_deref(), q.user_id).await?;
    Ok(Json(bookings))
}

/// GET /bookings/availability?date=
#[instrument(skip(state))]
pub async fn get_availability(
    State(state): State<AppState>,
    q: Result<Query<DateQuery>, QueryRejection>,
) -> Result<Json<AvailabilityResponse>, ApiError> {
    let Query(q) = q?;
    Ok(Json(services::availability(&state, q.date.as_deref()).await?))
}

/// POST /bookings
#[instrument(skip(state, identity, body))]
pub async fn create_booking(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    body: Result<Json<CreateBookingRequest>, JsonRejection>,
) -> Result<(StatusCode, HeaderMap, Json<Booking>), ApiError> {
    let Json(body) = body?;
    let caller = get_or_create_user(state.users.as_ref(), &identity, &state.config.booking).await?;
    let booking = services::create_booking(&state, &caller, body).await?;

    let mut headers = HeaderMap::new();
    if let Ok(location) = HeaderValue::from_str(&format!("/api/v1/bookings/{}", booking.id)) {
        headers.insert(header::LOCATION, location);
    }
    Ok((StatusCode::CREATED, headers, Json(booking)))
}

/// PUT /bookings { bookingId, status }
#[instrument(skip(state, identity, body))]
pub async fn update_booking(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    body: Result<Json<UpdateBookingRequest>, JsonRejection>,
) -> Result<Json<Booking>, ApiError> {
    let Json(body) = body?;
    let caller = get_or_create_user(state.users.as_ref(), &identity, &state.config.booking).await?;
    Ok(Json(services::change_status(&state, &caller, body).await?))
}

/// DELETE /bookings?id=
#[instrument(skip(state, identity))]
pub async fn delete_booking(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    q: Result<Query<DeleteQuery>, QueryRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Query(q) = q?;
    let caller = get_or_create_user(state.users.as_ref(), &identity, &state.config.booking).await?;
    services::delete_booking(&state, &caller, q.id.as_deref()).await?;
    Ok(Json(MessageResponse {
        message: "Booking deleted successfully".into(),
    }))
}
