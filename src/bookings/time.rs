use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use time::{Date, Duration, PrimitiveDateTime, Time};

pub const MINUTES_PER_DAY: u16 = 1440;
const LAST_MINUTE: u16 = MINUTES_PER_DAY - 1;

/// Times before this mark belong to the night that follows the booking date.
pub const DAY_ROLLOVER: SlotTime = SlotTime(3 * 60);

/// Bookable marks shown for one operating day (09:00 through 02:00 next day).
pub const SLOT_TIMES: [SlotTime; 18] = [
    SlotTime(9 * 60),
    SlotTime(10 * 60),
    SlotTime(11 * 60),
    SlotTime(12 * 60),
    SlotTime(13 * 60),
    SlotTime(14 * 60),
    SlotTime(15 * 60),
    SlotTime(16 * 60),
    SlotTime(17 * 60),
    SlotTime(18 * 60),
    SlotTime(19 * 60),
    SlotTime(20 * 60),
    SlotTime(21 * 60),
    SlotTime(22 * 60),
    SlotTime(23 * 60),
    SlotTime(0),
    SlotTime(60),
    SlotTime(2 * 60),
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimeParseError {
    #[error("time must be in HH:MM form")]
    Format,
    #[error("time is out of range")]
    Range,
}

/// Wall-clock time of day with minute precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotTime(u16);

impl SlotTime {
    pub fn from_hm(hour: u8, minute: u8) -> Option<Self> {
        if hour > 23 || minute > 59 {
            return None;
        }
        Some(Self(u16::from(hour) * 60 + u16::from(minute)))
    }

    /// Minutes since local midnight, `0..=1439`.
    pub fn minutes(self) -> u16 {
        self.0
    }

    /// Minutes since midnight of the operating day this time belongs to.
    pub fn axis(self) -> u16 {
        if self < DAY_ROLLOVER {
            self.0 + MINUTES_PER_DAY
        } else {
            self.0
        }
    }

    /// Wall-clock instant of this time within the operating day `date`.
    pub fn on(self, date: Date) -> PrimitiveDateTime {
        date.midnight() + Duration::minutes(i64::from(self.axis()))
    }
}

/// Operating day an instant belongs to. Before the rollover mark that is
/// the previous calendar date.
pub fn operating_day(at: PrimitiveDateTime) -> Date {
    if SlotTime::from(at.time()) < DAY_ROLLOVER {
        at.date().previous_day().unwrap_or(at.date())
    } else {
        at.date()
    }
}

fn parse_field(part: &str) -> Result<u8, TimeParseError> {
    if part.is_empty() || part.len() > 2 || !part.bytes().all(|b| b.is_ascii_digit()) {
        return Err(TimeParseError::Format);
    }
    part.parse().map_err(|_| TimeParseError::Format)
}

impl FromStr for SlotTime {
    type Err = TimeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.trim().split(':');
        let hour = parts.next().ok_or(TimeParseError::Format).and_then(parse_field)?;
        let minute = parts.next().ok_or(TimeParseError::Format).and_then(parse_field)?;
        // Postgres renders TIME values with seconds.
        if let Some(seconds) = parts.next() {
            if parse_field(seconds)? != 0 {
                return Err(TimeParseError::Range);
            }
        }
        if parts.next().is_some() {
            return Err(TimeParseError::Format);
        }
        SlotTime::from_hm(hour, minute).ok_or(TimeParseError::Range)
    }
}

impl fmt::Display for SlotTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.0 / 60, self.0 % 60)
    }
}

impl Serialize for SlotTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SlotTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

impl From<Time> for SlotTime {
    fn from(t: Time) -> Self {
        Self(u16::from(t.hour()) * 60 + u16::from(t.minute()))
    }
}

impl From<SlotTime> for Time {
    fn from(t: SlotTime) -> Self {
        // hour < 24 and minute < 60 by construction
        Time::from_hms((t.0 / 60) as u8, (t.0 % 60) as u8, 0).unwrap_or(Time::MIDNIGHT)
    }
}

/// Whether a reservation's end minute counts as occupied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Boundary {
    /// `[start, end]`: a booking ending at 14:00 blocks 14:00.
    #[default]
    Closed,
    /// `[start, end)`
    HalfOpen,
}

impl FromStr for Boundary {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "closed" => Ok(Self::Closed),
            "half_open" | "half-open" => Ok(Self::HalfOpen),
            other => anyhow::bail!("unknown boundary policy {other:?}"),
        }
    }
}

/// Closed range of minutes within one local day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub start: u16,
    pub end: u16,
}

impl Segment {
    /// Leading edge, trailing edge, or nested.
    pub fn overlaps(self, other: Segment) -> bool {
        (self.start <= other.start && self.end >= other.start)
            || (self.start <= other.end && self.end >= other.end)
            || (self.start >= other.start && self.end <= other.end)
    }
}

/// Minutes of the local day a reservation occupies. Cross-midnight
/// reservations occupy `[start, 23:59] ∪ [00:00, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Occupancy {
    head: Option<Segment>,
    tail: Option<Segment>,
    wraps: bool,
}

impl Occupancy {
    pub fn new(start: SlotTime, end: SlotTime, boundary: Boundary) -> Self {
        let (s, e) = (start.minutes(), end.minutes());
        let last = |e: u16| match boundary {
            Boundary::Closed => Some(e),
            Boundary::HalfOpen => e.checked_sub(1),
        };
        if e > s {
            Self {
                head: last(e).filter(|&l| l >= s).map(|end| Segment { start: s, end }),
                tail: None,
                wraps: false,
            }
        } else {
            Self {
                head: Some(Segment { start: s, end: LAST_MINUTE }),
                tail: last(e).map(|end| Segment { start: 0, end }),
                wraps: true,
            }
        }
    }

    pub fn wraps_midnight(&self) -> bool {
        self.wraps
    }

    pub fn segments(&self) -> impl Iterator<Item = Segment> + '_ {
        self.head.iter().chain(self.tail.iter()).copied()
    }

    pub fn contains(&self, t: SlotTime) -> bool {
        let m = t.minutes();
        self.segments().any(|seg| seg.start <= m && m <= seg.end)
    }

    pub fn overlaps(&self, other: &Occupancy) -> bool {
        self.segments()
            .any(|mine| other.segments().any(|theirs| mine.overlaps(theirs)))
    }
}

/// `YYYY-MM-DD` serde for `time::Date`.
pub mod iso_date {
    use serde::Serializer;
    use time::{format_description::FormatItem, macros::format_description, Date};

    pub const FORMAT: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]");

    pub fn parse(value: &str) -> Result<Date, time::error::Parse> {
        Date::parse(value.trim(), FORMAT)
    }

    pub fn serialize<S: Serializer>(date: &Date, serializer: S) -> Result<S::Ok, S::Error> {
        let s = date.format(FORMAT).map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{date, datetime};

    fn t(s: &str) -> SlotTime {
        s.parse().unwrap()
    }

    fn to_minutes(s: &str) -> Result<u16, TimeParseError> {
        s.parse::<SlotTime>().map(SlotTime::minutes)
    }

    #[test]
    fn every_minute_round_trips_and_is_monotonic() {
        let mut previous = None;
        for m in 0..MINUTES_PER_DAY {
            let slot = SlotTime(m);
            let text = slot.to_string();
            assert_eq!(text.len(), 5);
            assert_eq!(to_minutes(&text), Ok(m));
            assert_eq!(text.parse::<SlotTime>().unwrap(), slot);
            if let Some(p) = previous {
                assert!(slot > p);
            }
            previous = Some(slot);
        }
    }

    #[test]
    fn rejects_malformed_times() {
        assert_eq!(to_minutes("24:00"), Err(TimeParseError::Range));
        assert_eq!(to_minutes("12:60"), Err(TimeParseError::Range));
        assert_eq!(to_minutes("12"), Err(TimeParseError::Format));
        assert_eq!(to_minutes("ab:cd"), Err(TimeParseError::Format));
        assert_eq!(to_minutes("-1:00"), Err(TimeParseError::Format));
        assert_eq!(to_minutes("12:00:00:00"), Err(TimeParseError::Format));
        assert_eq!(to_minutes(""), Err(TimeParseError::Format));
        assert_eq!(to_minutes("12:00:30"), Err(TimeParseError::Range));
    }

    #[test]
    fn accepts_database_rendering() {
        assert_eq!(to_minutes("10:00:00"), Ok(600));
        assert_eq!(to_minutes("9:05"), Ok(545));
    }

    #[test]
    fn early_hours_belong_to_following_night() {
        assert_eq!(t("09:00").axis(), 540);
        assert_eq!(t("23:00").axis(), 1380);
        assert_eq!(t("00:30").axis(), 1470);
        assert_eq!(t("02:00").axis(), 1560);
        assert_eq!(t("03:00").axis(), 180);
        assert_eq!(t("00:30").on(date!(2024-06-01)), datetime!(2024-06-02 00:30));
        assert_eq!(t("10:00").on(date!(2024-06-01)), datetime!(2024-06-01 10:00));
    }

    #[test]
    fn slot_grid_is_ordered_on_operating_day() {
        assert!(SLOT_TIMES.windows(2).all(|w| w[0].axis() < w[1].axis()));
    }

    #[test]
    fn wrapped_occupancy_covers_both_sides_of_midnight() {
        let occ = Occupancy::new(t("23:00"), t("01:00"), Boundary::Closed);
        assert!(occ.wraps_midnight());
        for blocked in ["23:00", "23:30", "00:00", "00:30", "01:00"] {
            assert!(occ.contains(t(blocked)), "{blocked} should be occupied");
        }
        for free in ["01:01", "12:00", "22:00", "22:59"] {
            assert!(!occ.contains(t(free)), "{free} should be free");
        }
    }

    #[test]
    fn half_open_frees_end_minute() {
        let occ = Occupancy::new(t("09:00"), t("10:00"), Boundary::HalfOpen);
        assert!(occ.contains(t("09:59")));
        assert!(!occ.contains(t("10:00")));

        let ends_at_midnight = Occupancy::new(t("23:00"), t("00:00"), Boundary::HalfOpen);
        assert!(ends_at_midnight.contains(t("23:59")));
        assert!(!ends_at_midnight.contains(t("00:00")));
    }

    #[test]
    fn segment_overlap_clauses() {
        let a = Segment { start: 600, end: 660 };
        assert!(a.overlaps(Segment { start: 630, end: 690 }));
        assert!(a.overlaps(Segment { start: 570, end: 630 }));
        assert!(a.overlaps(Segment { start: 610, end: 620 }));
        assert!(a.overlaps(Segment { start: 500, end: 700 }));
        assert!(a.overlaps(Segment { start: 660, end: 720 }));
        assert!(!a.overlaps(Segment { start: 661, end: 720 }));
    }

    #[test]
    fn boundary_policy_parses() {
        assert_eq!("closed".parse::<Boundary>().unwrap(), Boundary::Closed);
        assert_eq!("HALF_OPEN".parse::<Boundary>().unwrap(), Boundary::HalfOpen);
        assert!("sideways".parse::<Boundary>().is_err());
    }

    #[test]
    fn iso_date_parses() {
        assert_eq!(iso_date::parse("2024-06-01").unwrap(), date!(2024-06-01));
        assert!(iso_date::parse("01/06/2024").is_err());
    }

    #[test]
    fn early_hours_belong_to_previous_operating_day() {
        assert_eq!(operating_day(datetime!(2024-06-02 01:00)), date!(2024-06-01));
        assert_eq!(operating_day(datetime!(2024-06-02 02:59)), date!(2024-06-01));
        assert_eq!(operating_day(datetime!(2024-06-02 03:00)), date!(2024-06-02));
        assert_eq!(operating_day(datetime!(2024-06-01 23:59)), date!(2024-06-01));
    }
}
