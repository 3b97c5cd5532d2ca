use serde::Serialize;
use sqlx::FromRow;
use time::{Date, OffsetDateTime, PrimitiveDateTime, Time};
use uuid::Uuid;

use super::lifecycle::BookingStatus;
use super::time::{iso_date, Boundary, Occupancy, SlotTime};

/// `room_bookings` row as stored.
#[derive(Debug, FromRow)]
pub struct BookingRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub user_name: String,
    pub user_email: String,
    pub booking_date: Date,
    pub start_time: Time,
    pub end_time: Time,
    pub purpose: Option<String>,
    pub status: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// A room reservation. Owner name and email are a snapshot taken at creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: Uuid,
    pub user_id: Uuid,
    pub owner_name: String,
    pub owner_email: String,
    #[serde(with = "iso_date")]
    pub date: Date,
    pub start_time: SlotTime,
    pub end_time: SlotTime,
    pub purpose: Option<String>,
    pub status: BookingStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl TryFrom<BookingRow> for Booking {
    type Error = anyhow::Error;

    fn try_from(r: BookingRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: r.id,
            user_id: r.user_id,
            owner_name: r.user_name,
            owner_email: r.user_email,
            date: r.booking_date,
            start_time: r.start_time.into(),
            end_time: r.end_time.into(),
            purpose: r.purpose,
            status: r.status.parse()?,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

impl Booking {
    pub fn occupancy(&self, boundary: Boundary) -> Occupancy {
        Occupancy::new(self.start_time, self.end_time, boundary)
    }

    pub fn starts_at(&self) -> PrimitiveDateTime {
        self.start_time.on(self.date)
    }

    /// End instant; a legacy end that is not after the start rolls into the next day.
    pub fn ends_at(&self) -> PrimitiveDateTime {
        let end = self.end_time.on(self.date);
        if end > self.starts_at() {
            end
        } else {
            end + time::Duration::days(1)
        }
    }

    /// Status as every reader must report it at `now`.
    pub fn observed(mut self, now: PrimitiveDateTime) -> Self {
        self.status = self.status.observed(self.ends_at(), now);
        self
    }
}

/// Validated request for a new reservation, ready for the overlap check.
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub user_id: Uuid,
    pub owner_name: String,
    pub owner_email: String,
    pub date: Date,
    pub start_time: SlotTime,
    pub end_time: SlotTime,
    pub purpose: Option<String>,
}

#[derive(Debug, Default, Clone)]
pub struct BookingFilter {
    pub date: Option<Date>,
    pub user_id: Option<Uuid>,
}

/// Outcome of an atomic check-and-insert.
#[derive(Debug)]
pub enum Insertion {
    Created(Booking),
    Conflict(Vec<Booking>),
}
