use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use time::{Date, PrimitiveDateTime};
use uuid::Uuid;

use super::availability::Slot;
use super::lifecycle::BookingStatus;
use super::overlap::{Candidate, ValidationError};
use super::repo_types::NewBooking;
use super::time::{iso_date, SlotTime};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Body of `POST /bookings`. Fields are optional so missing ones can be reported by name.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingRequest {
    #[serde(alias = "booking_date")]
    pub date: Option<String>,
    #[serde(alias = "start_time")]
    pub start_time: Option<String>,
    #[serde(alias = "end_time")]
    pub end_time: Option<String>,
    pub purpose: Option<String>,
    #[serde(alias = "user_name")]
    pub owner_name: Option<String>,
    #[serde(alias = "user_email")]
    pub owner_email: Option<String>,
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl CreateBookingRequest {
    /// Turns the raw body into a [`NewBooking`] owned by `user_id`, or the first rule it breaks.
    pub fn validate(self, user_id: Uuid, now: PrimitiveDateTime) -> Result<NewBooking, ValidationError> {
        let required = [
            ("date", present(&self.date)),
            ("startTime", present(&self.start_time)),
            ("endTime", present(&self.end_time)),
            ("ownerName", present(&self.owner_name)),
            ("ownerEmail", present(&self.owner_email)),
        ];
        let missing: Vec<&'static str> = required
            .iter()
            .filter(|(_, v)| v.is_none())
            .map(|(name, _)| *name)
            .collect();
        if !missing.is_empty() {
            return Err(ValidationError::Missing(missing));
        }
        let [date, start, end, name, email] = required.map(|(_, v)| v.unwrap_or_default());

        let date = iso_date::parse(date).map_err(|_| ValidationError::InvalidDate)?;
        let start_time: SlotTime = start.parse().map_err(|_| ValidationError::InvalidTime("startTime"))?;
        let end_time: SlotTime = end.parse().map_err(|_| ValidationError::InvalidTime("endTime"))?;
        if !is_valid_email(email) {
            return Err(ValidationError::InvalidEmail);
        }

        Candidate { date, start_time, end_time }.check(now)?;

        Ok(NewBooking {
            user_id,
            owner_name: name.to_string(),
            owner_email: email.to_lowercase(),
            date,
            start_time,
            end_time,
            purpose: present(&self.purpose).map(str::to_string),
        })
    }
}

/// Body of `PUT /bookings`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBookingRequest {
    #[serde(alias = "booking_id")]
    pub booking_id: Option<String>,
    pub status: Option<BookingStatus>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub date: Option<String>,
    #[serde(alias = "userId")]
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct DateQuery {
    pub date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteQuery {
    pub id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AvailabilityResponse {
    #[serde(with = "iso_date")]
    pub date: Date,
    pub slots: Vec<Slot>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}
