use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use time::{Date, PrimitiveDateTime};
use uuid::Uuid;

use super::lifecycle::BookingStatus;
use super::overlap::{can_create, Candidate};
use super::repo_types::{Booking, BookingFilter, BookingRow, Insertion, NewBooking};
use super::time::Boundary;

#[async_trait]
pub trait BookingRepo: Send + Sync {
    /// Bookings matching `filter`, with persisted statuses.
    async fn list(&self, filter: &BookingFilter) -> anyhow::Result<Vec<Booking>>;

    async fn find(&self, id: Uuid) -> anyhow::Result<Option<Booking>>;

    /// Checks `new` against the active bookings on its date and inserts it if
    /// nothing conflicts. Concurrent calls for one date are serialised.
    async fn insert_if_free(
        &self,
        new: NewBooking,
        now: PrimitiveDateTime,
        boundary: Boundary,
    ) -> anyhow::Result<Insertion>;

    /// Moves a booking from `from` to `to`; `None` when it is no longer in `from`.
    async fn set_status(
        &self,
        id: Uuid,
        from: BookingStatus,
        to: BookingStatus,
    ) -> anyhow::Result<Option<Booking>>;

    async fn delete(&self, id: Uuid) -> anyhow::Result<bool>;
}

const COLUMNS: &str = "id, user_id, user_name, user_email, booking_date, start_time, end_time, \
                       purpose, status, created_at, updated_at";

/// Advisory lock namespace for per-date booking creation.
const BOOKING_LOCK_CLASS: i32 = 0x524d;

fn lock_key(date: Date) -> i32 {
    date.to_julian_day()
}

fn into_bookings(rows: Vec<BookingRow>) -> anyhow::Result<Vec<Booking>> {
    rows.into_iter().map(Booking::try_from).collect()
}

#[derive(Clone)]
pub struct PgBookingRepo {
    db: PgPool,
}

impl PgBookingRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl BookingRepo for PgBookingRepo {
    async fn list(&self, filter: &BookingFilter) -> anyhow::Result<Vec<Booking>> {
        let rows = sqlx::query_as::<_, BookingRow>(&format!(
            r#"
            SELECT {COLUMNS}
              FROM room_bookings
             WHERE ($1::date IS NULL OR booking_date = $1)
               AND ($2::uuid IS NULL OR user_id = $2)
             ORDER BY booking_date ASC, start_time ASC
            "#
        ))
        .bind(filter.date)
        .bind(filter.user_id)
        .fetch_all(&self.db)
        .await
        .context("list bookings")?;
        into_bookings(rows)
    }

    async fn find(&self, id: Uuid) -> anyhow::Result<Option<Booking>> {
        let row = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {COLUMNS} FROM room_bookings WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("find booking")?;
        row.map(Booking::try_from).transpose()
    }

    async fn insert_if_free(
        &self,
        new: NewBooking,
        now: PrimitiveDateTime,
        boundary: Boundary,
    ) -> anyhow::Result<Insertion> {
        let mut tx = self.db.begin().await.context("begin tx")?;

        sqlx::query("SELECT pg_advisory_xact_lock($1, $2)")
            .bind(BOOKING_LOCK_CLASS)
            .bind(lock_key(new.date))
            .execute(&mut *tx)
            .await
            .context("lock booking date")?;

        let rows = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {COLUMNS} FROM room_bookings WHERE booking_date = $1 AND status = 'active'"
        ))
        .bind(new.date)
        .fetch_all(&mut *tx)
        .await
        .context("load active bookings")?;
        let existing: Vec<Booking> = into_bookings(rows)?
            .into_iter()
            .map(|b| b.observed(now))
            .collect();

        let verdict = can_create(&Candidate::from(&new), &existing, boundary);
        if !verdict.accepted {
            // dropping the transaction rolls it back and releases the lock
            return Ok(Insertion::Conflict(verdict.conflicts));
        }

        let row = sqlx::query_as::<_, BookingRow>(&format!(
            r#"
            INSERT INTO room_bookings
                (id, user_id, user_name, user_email, booking_date, start_time, end_time, purpose, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'active')
            RETURNING {COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(new.user_id)
        .bind(&new.owner_name)
        .bind(&new.owner_email)
        .bind(new.date)
        .bind(time::Time::from(new.start_time))
        .bind(time::Time::from(new.end_time))
        .bind(&new.purpose)
        .fetch_one(&mut *tx)
        .await
        .context("insert booking")?;

        tx.commit().await.context("commit tx")?;
        Ok(Insertion::Created(row.try_into()?))
    }

    async fn set_status(
        &self,
        id: Uuid,
        from: BookingStatus,
        to: BookingStatus,
    ) -> anyhow::Result<Option<Booking>> {
        let row = sqlx::query_as::<_, BookingRow>(&format!(
            r#"
            UPDATE room_bookings
               SET status = $3, updated_at = now()
             WHERE id = $1 AND status = $2
            RETURNING {COLUMNS}
            "#
        ))
        .bind(id)
        .bind(from.as_str())
        .bind(to.as_str())
        .fetch_optional(&self.db)
        .await
        .context("update booking status")?;
        row.map(Booking::try_from).transpose()
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM room_bookings WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .context("delete booking")?;
        Ok(res.rows_affected() > 0)
    }
}

#[cfg(test)]
pub(crate) use memory::MemoryBookingRepo;

#[cfg(test)]
mod memory {
    use super::*;
    use time::OffsetDateTime;
    use tokio::sync::Mutex;

    /// In-process stand-in for tests; the mutex plays the part of the date lock.
    #[derive(Default)]
    pub(crate) struct MemoryBookingRepo {
        rows: Mutex<Vec<Booking>>,
    }

    #[async_trait]
    impl BookingRepo for MemoryBookingRepo {
        async fn list(&self, filter: &BookingFilter) -> anyhow::Result<Vec<Booking>> {
            let mut out: Vec<Booking> = self
                .rows
                .lock()
                .await
                .iter()
                .filter(|b| filter.date.map_or(true, |d| b.date == d))
                .filter(|b| filter.user_id.map_or(true, |u| b.user_id == u))
                .cloned()
                .collect();
            out.sort_by_key(|b| (b.date, b.start_time));
            Ok(out)
        }

        async fn find(&self, id: Uuid) -> anyhow::Result<Option<Booking>> {
            Ok(self.rows.lock().await.iter().find(|b| b.id == id).cloned())
        }

        async fn insert_if_free(
            &self,
            new: NewBooking,
            now: PrimitiveDateTime,
            boundary: Boundary,
        ) -> anyhow::Result<Insertion> {
            let mut rows = self.rows.lock().await;
            let existing: Vec<Booking> = rows
                .iter()
                .filter(|b| b.date == new.date && b.status == BookingStatus::Active)
                .cloned()
                .map(|b| b.observed(now))
                .collect();
            let verdict = can_create(&Candidate::from(&new), &existing, boundary);
            if !verdict.accepted {
                return Ok(Insertion::Conflict(verdict.conflicts));
            }
            let stamp = OffsetDateTime::now_utc();
            let booking = Booking {
                id: Uuid::new_v4(),
                user_id: new.user_id,
                owner_name: new.owner_name,
                owner_email: new.owner_email,
                date: new.date,
                start_time: new.start_time,
                end_time: new.end_time,
                purpose: new.purpose,
                status: BookingStatus::Active,
                created_at: stamp,
                updated_at: stamp,
            };
            rows.push(booking.clone());
            Ok(Insertion::Created(booking))
        }

        async fn set_status(
            &self,
            id: Uuid,
            from: BookingStatus,
            to: BookingStatus,
        ) -> anyhow::Result<Option<Booking>> {
            let mut rows = self.rows.lock().await;
            let Some(b) = rows.iter_mut().find(|b| b.id == id && b.status == from) else {
                return Ok(None);
            };
            b.status = to;
            b.updated_at = OffsetDateTime::now_utc();
            Ok(Some(b.clone()))
        }

        async fn delete(&self, id: Uuid) -> anyhow::Result<bool> {
            let mut rows = self.rows.lock().await;
            let before = rows.len();
            rows.retain(|b| b.id != id);
            Ok(rows.len() < before)
        }
    }

    mod tests {
        use super::*;
        use std::sync::Arc;
        use time::macros::{date, datetime};

        fn new_booking(start: &str, end: &str) -> NewBooking {
            NewBooking {
                user_id: Uuid::new_v4(),
                owner_name: "Ploy".into(),
                owner_email: "ploy@example.com".into(),
                date: date!(2024-06-01),
                start_time: start.parse().unwrap(),
                end_time: end.parse().unwrap(),
                purpose: None,
            }
        }

        #[tokio::test]
        async fn concurrent_creates_for_one_slot_yield_one_booking() {
            let repo = Arc::new(MemoryBookingRepo::default());
            let now = datetime!(2024-05-31 12:00);
            let tasks: Vec<_> = (0..8)
                .map(|_| {
                    let repo = repo.clone();
                    tokio::spawn(async move {
                        repo.insert_if_free(new_booking("10:00", "11:00"), now, Boundary::Closed)
                            .await
                            .unwrap()
                    })
                })
                .collect();
            let mut created = 0;
            for t in tasks {
                if let Insertion::Created(_) = t.await.unwrap() {
                    created += 1;
                }
            }
            assert_eq!(created, 1);
            assert_eq!(repo.list(&BookingFilter::default()).await.unwrap().len(), 1);
        }

        #[tokio::test]
        async fn set_status_requires_expected_state() {
            let repo = MemoryBookingRepo::default();
            let now = datetime!(2024-05-31 12:00);
            let Insertion::Created(b) = repo
                .insert_if_free(new_booking("10:00", "11:00"), now, Boundary::Closed)
                .await
                .unwrap()
            else {
                panic!("expected insert");
            };
            let cancelled = repo
                .set_status(b.id, BookingStatus::Active, BookingStatus::Cancelled)
                .await
                .unwrap();
            assert_eq!(cancelled.map(|b| b.status), Some(BookingStatus::Cancelled));
            let again = repo
                .set_status(b.id, BookingStatus::Active, BookingStatus::Cancelled)
                .await
                .unwrap();
            assert!(again.is_none());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn lock_key_is_stable_per_date() {
        assert_eq!(lock_key(date!(2024-06-01)), lock_key(date!(2024-06-01)));
        assert_ne!(lock_key(date!(2024-06-01)), lock_key(date!(2024-06-02)));
    }
}
