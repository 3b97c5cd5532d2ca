use tracing::{info, warn};
use uuid::Uuid;

use super::availability::slot_grid;
use super::dto::{AvailabilityResponse, CreateBookingRequest, UpdateBookingRequest};
use super::lifecycle::{transition, BookingStatus};
use super::repo_types::{Booking, BookingFilter, Insertion};
use super::time::iso_date;
use crate::{error::ApiError, state::AppState, users::repo_types::User};

fn parse_date(raw: Option<&str>) -> Result<Option<time::Date>, ApiError> {
    raw.map(str::trim)
        .filter(|d| !d.is_empty())
        .map(iso_date::parse)
        .transpose()
        .map_err(|_| ApiError::Validation("date must be in YYYY-MM-DD form".into()))
}

fn parse_id(raw: Option<&str>) -> Result<Uuid, ApiError> {
    let raw = raw
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::Validation("Booking ID is required".into()))?;
    Uuid::parse_str(raw).map_err(|_| ApiError::Validation("Booking ID is not a valid id".into()))
}

/// Owners and admins may change a booking; anyone else is refused.
fn ensure_can_modify(caller: &User, booking: &Booking) -> Result<(), ApiError> {
    if booking.user_id == caller.id || caller.is_admin() {
        Ok(())
    } else {
        warn!(user_id = %caller.id, booking_id = %booking.id, "not owner or admin");
        Err(ApiError::Forbidden("Not authorized to modify this booking".into()))
    }
}

/// Listing with the completion overlay applied, ordered by operating-day start.
pub async fn list_bookings(
    state: &AppState,
    date: Option<&str>,
    user_id: Option<Uuid>,
) -> Result<Vec<Booking>, ApiError> {
    let filter = BookingFilter {
        date: parse_date(date)?,
        user_id,
    };
    observed_bookings(state, &filter).await
}

async fn observed_bookings(state: &AppState, filter: &BookingFilter) -> Result<Vec<Booking>, ApiError> {
    let now = state.clock.now();
    let mut bookings: Vec<Booking> = state
        .bookings
        .list(filter)
        .await?
        .into_iter()
        .map(|b| b.observed(now))
        .collect();
    bookings.sort_by_key(|b| (b.date, b.start_time.axis()));
    Ok(bookings)
}

pub async fn availability(state: &AppState, date: Option<&str>) -> Result<AvailabilityResponse, ApiError> {
    let date = parse_date(date)?
        .ok_or_else(|| ApiError::Validation("date is required".into()))?;
    let filter = BookingFilter {
        date: Some(date),
        user_id: None,
    };
    let reservations = observed_bookings(state, &filter).await?;
    let slots = slot_grid(date, &reservations, state.clock.now(), state.config.booking.boundary);
    Ok(AvailabilityResponse { date, slots })
}

pub async fn create_booking(
    state: &AppState,
    caller: &User,
    req: CreateBookingRequest,
) -> Result<Booking, ApiError> {
    let now = state.clock.now();
    let new = req.validate(caller.id, now).map_err(|e| {
        warn!(user_id = %caller.id, reason = %e, "booking rejected");
        ApiError::Validation(e.to_string())
    })?;

    match state
        .bookings
        .insert_if_free(new, now, state.config.booking.boundary)
        .await?
    {
        Insertion::Created(booking) => {
            let overnight = booking.occupancy(state.config.booking.boundary).wraps_midnight();
            info!(booking_id = %booking.id, user_id = %caller.id, date = %booking.date,
                  start = %booking.start_time, end = %booking.end_time, overnight, "booking created");
            Ok(booking)
        }
        Insertion::Conflict(conflicts) => {
            warn!(user_id = %caller.id, conflicts = conflicts.len(), "time slot already booked");
            Err(ApiError::Conflict(conflicts))
        }
    }
}

pub async fn change_status(
    state: &AppState,
    caller: &User,
    req: UpdateBookingRequest,
) -> Result<Booking, ApiError> {
    let id = parse_id(req.booking_id.as_deref())?;
    let requested = req
        .status
        .ok_or_else(|| ApiError::Validation("status is required".into()))?;

    let now = state.clock.now();
    let booking = state
        .bookings
        .find(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Booking not found".into()))?
        .observed(now);
    ensure_can_modify(caller, &booking)?;

    let next = transition(
        booking.status,
        requested,
        booking.starts_at(),
        now,
        state.config.booking.cancel_lead,
    )
    .map_err(|e| {
        warn!(booking_id = %id, reason = %e, "status change rejected");
        ApiError::Rejected(e.to_string())
    })?;

    let updated = state
        .bookings
        .set_status(id, BookingStatus::Active, next)
        .await?
        .ok_or_else(|| ApiError::Rejected("booking is no longer active".into()))?;
    info!(booking_id = %id, user_id = %caller.id, status = %next, "booking status changed");
    Ok(updated.observed(now))
}

pub async fn delete_booking(state: &AppState, caller: &User, id: Option<&str>) -> Result<(), ApiError> {
    let id = parse_id(id)?;
    let booking = state
        .bookings
        .find(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Booking not found".into()))?;
    ensure_can_modify(caller, &booking)?;

    if !state.bookings.delete(id).await? {
        return Err(ApiError::NotFound("Booking not found".into()));
    }
    info!(booking_id = %id, user_id = %caller.id, "booking deleted");
    Ok(())
}
