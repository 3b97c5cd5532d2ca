use thiserror::Error;
use time::{Date, PrimitiveDateTime};

use super::lifecycle::BookingStatus;
use super::repo_types::{Booking, NewBooking};
use super::time::{operating_day, Boundary, Occupancy, SlotTime};

/// Why a create request was refused before any conflict check.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Missing required fields: {}", .0.join(", "))]
    Missing(Vec<&'static str>),
    #[error("{0} must be a valid HH:MM time")]
    InvalidTime(&'static str),
    #[error("date must be in YYYY-MM-DD form")]
    InvalidDate,
    #[error("ownerEmail is not a valid email address")]
    InvalidEmail,
    #[error("Start and end time must differ")]
    ZeroLength,
    #[error("End time must be after start time")]
    EndBeforeStart,
    #[error("Cannot book for past dates")]
    PastDate,
    #[error("Cannot book a time that has already passed")]
    PastTime,
}

/// The time window a new reservation asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub date: Date,
    pub start_time: SlotTime,
    pub end_time: SlotTime,
}

impl From<&NewBooking> for Candidate {
    fn from(b: &NewBooking) -> Self {
        Self {
            date: b.date,
            start_time: b.start_time,
            end_time: b.end_time,
        }
    }
}

impl Candidate {
    /// Ordering and date rules checked before the datastore is touched.
    /// A window may cross midnight only into the early hours of the same
    /// operating day, e.g. 23:00 to 01:00.
    pub fn check(&self, now: PrimitiveDateTime) -> Result<(), ValidationError> {
        if self.start_time == self.end_time {
            return Err(ValidationError::ZeroLength);
        }
        if self.start_time.axis() > self.end_time.axis() {
            return Err(ValidationError::EndBeforeStart);
        }
        if self.date < operating_day(now) {
            return Err(ValidationError::PastDate);
        }
        if self.start_time.on(self.date) <= now {
            return Err(ValidationError::PastTime);
        }
        Ok(())
    }

    fn occupancy(&self, boundary: Boundary) -> Occupancy {
        Occupancy::new(self.start_time, self.end_time, boundary)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub accepted: bool,
    pub conflicts: Vec<Booking>,
}

/// Decides whether `candidate` may be created alongside `existing`.
/// `existing` must already carry observed statuses.
pub fn can_create(candidate: &Candidate, existing: &[Booking], boundary: Boundary) -> Verdict {
    let wanted = candidate.occupancy(boundary);
    let conflicts: Vec<Booking> = existing
        .iter()
        .filter(|b| b.date == candidate.date && b.status == BookingStatus::Active)
        .filter(|b| b.occupancy(boundary).overlaps(&wanted))
        .cloned()
        .collect();
    Verdict {
        accepted: conflicts.is_empty(),
        conflicts,
    }
}
