use time::{OffsetDateTime, PrimitiveDateTime, UtcOffset};

/// Source of the room's local wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> PrimitiveDateTime;
}

pub struct SystemClock {
    offset: UtcOffset,
}

impl SystemClock {
    pub fn new(offset: UtcOffset) -> Self {
        Self { offset }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> PrimitiveDateTime {
        let local = OffsetDateTime::now_utc().to_offset(self.offset);
        PrimitiveDateTime::new(local.date(), local.time())
    }
}

#[cfg(test)]
pub(crate) use fixed::FixedClock;
