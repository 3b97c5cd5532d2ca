use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::{Duration, PrimitiveDateTime};

/// Reservation status. `Cancelled` and `Completed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    #[serde(alias = "Active")]
    Active,
    #[serde(alias = "Cancelled", alias = "canceled")]
    Cancelled,
    #[serde(alias = "Completed")]
    Completed,
}

impl BookingStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Cancelled => "cancelled",
            Self::Completed => "completed",
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Active)
    }

    /// Lazy completion: an active booking whose end has passed reads as completed.
    pub fn observed(self, ends_at: PrimitiveDateTime, now: PrimitiveDateTime) -> Self {
        match self {
            Self::Active if now > ends_at => Self::Completed,
            other => other,
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "cancelled" => Ok(Self::Cancelled),
            "completed" => Ok(Self::Completed),
            other => anyhow::bail!("unknown booking status {other:?}"),
        }
    }
}

/// A refused status change. Reported to the caller, not treated as a failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionRejected {
    #[error("booking is already {0}")]
    Terminal(BookingStatus),
    #[error("too close to start time: bookings can only be cancelled more than {0} minutes before they start")]
    TooCloseToStart(i64),
    #[error("booking is already active")]
    AlreadyActive,
    #[error("bookings complete automatically once they end")]
    CompletionIsAutomatic,
}

/// Applies a requested status to a booking whose observed status is `current`.
pub fn transition(
    current: BookingStatus,
    requested: BookingStatus,
    starts_at: PrimitiveDateTime,
    now: PrimitiveDateTime,
    lead: Duration,
) -> Result<BookingStatus, TransitionRejected> {
    if current.is_terminal() {
        return Err(TransitionRejected::Terminal(current));
    }
    match requested {
        BookingStatus::Active => Err(TransitionRejected::AlreadyActive),
        BookingStatus::Completed => Err(TransitionRejected::CompletionIsAutomatic),
        BookingStatus::Cancelled if now < starts_at - lead => Ok(BookingStatus::Cancelled),
        BookingStatus::Cancelled => Err(TransitionRejected::TooCloseToStart(lead.whole_minutes())),
    }
}
