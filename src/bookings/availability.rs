use serde::Serialize;
use time::{Date, PrimitiveDateTime};
use uuid::Uuid;

use super::lifecycle::BookingStatus;
use super::repo_types::Booking;
use super::time::{Boundary, SlotTime, SLOT_TIMES};

/// The first active reservation on `date` that occupies `time`.
pub fn blocking_reservation<'a>(
    date: Date,
    time: SlotTime,
    reservations: &'a [Booking],
    boundary: Boundary,
) -> Option<&'a Booking> {
    reservations
        .iter()
        .filter(|b| b.date == date && b.status == BookingStatus::Active)
        .find(|b| b.occupancy(boundary).contains(time))
}

pub fn is_available(
    date: Date,
    time: SlotTime,
    reservations: &[Booking],
    boundary: Boundary,
) -> bool {
    blocking_reservation(date, time, reservations, boundary).is_none()
}

/// A slot whose instant is not after `now` can no longer be booked.
pub fn is_past(date: Date, time: SlotTime, now: PrimitiveDateTime) -> bool {
    time.on(date) <= now
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotState {
    Available,
    Booked,
    Past,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Slot {
    pub time: SlotTime,
    pub state: SlotState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub booking_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub booked_by: Option<String>,
}

/// Slot grid for one operating day. `reservations` must already carry observed statuses.
pub fn slot_grid(
    date: Date,
    reservations: &[Booking],
    now: PrimitiveDateTime,
    boundary: Boundary,
) -> Vec<Slot> {
    SLOT_TIMES
        .iter()
        .map(|&time| {
            let blocker = blocking_reservation(date, time, reservations, boundary);
            let state = if is_past(date, time, now) {
                SlotState::Past
            } else if is_available(date, time, reservations, boundary) {
                SlotState::Available
            } else {
                SlotState::Booked
            };
            Slot {
                time,
                state,
                booking_id: blocker.map(|b| b.id),
                booked_by: blocker.map(|b| b.owner_name.clone()),
            }
        })
        .collect()
}
