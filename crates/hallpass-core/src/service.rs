//! Reservation workflows on top of a [`ReservationStore`].
//!
//! Handlers and the chatbot tools both go through this service so the
//! validation pipeline is identical no matter where a booking originates.

use chrono::{NaiveDate, NaiveTime};

use crate::error::{HallpassError, Result};
use crate::model::{NewReservation, Reservation, ReservationFilter};
use crate::storage::ReservationStore;
use crate::timeslot;

/// Orchestrates reservation operations against a store.
#[derive(Clone)]
pub struct ReservationService<S> {
    store: S,
}

impl<S: ReservationStore> ReservationService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Create a reservation for `user_id`.
    ///
    /// Checks run in a fixed order and short-circuit on the first failure:
    /// slot validity, room existence, then overlap. The overlap check here is
    /// a fast path; the store re-checks atomically on insert, so a concurrent
    /// booking of the same slot still yields exactly one winner.
    pub async fn create(
        &self,
        user_id: i64,
        room_id: i64,
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
    ) -> Result<Reservation> {
        timeslot::validate_slot(start, end)?;
        self.store.get_room(room_id).await?;

        if self.store.has_overlap(room_id, date, start, end).await? {
            return Err(HallpassError::Conflict(
                "the room is already reserved for that time".into(),
            ));
        }

        self.store
            .insert_reservation(&NewReservation {
                room_id,
                user_id,
                reservation_date: date,
                start_time: start,
                end_time: end,
            })
            .await
    }

    /// Cancel a reservation owned by `user_id`.
    ///
    /// Missing reservations are `NotFound` (so a repeated cancel fails rather
    /// than silently succeeding); someone else's reservation is `Forbidden`.
    pub async fn cancel(&self, user_id: i64, reservation_id: i64) -> Result<()> {
        let reservation = self.store.get_reservation(reservation_id).await?;
        if reservation.user_id != user_id {
            return Err(HallpassError::Forbidden(
                "you can only cancel your own reservations".into(),
            ));
        }
        self.store.delete_reservation(reservation_id).await
    }

    /// All reservations with dates in `[week_start, week_end]`, ordered by
    /// `(reservation_date, start_time)`.
    pub async fn list_for_week(
        &self,
        week_start: NaiveDate,
        week_end: NaiveDate,
    ) -> Result<Vec<Reservation>> {
        self.store
            .list_reservations(&ReservationFilter {
                date_from: Some(week_start),
                date_to: Some(week_end),
                ..Default::default()
            })
            .await
    }

    /// One user's reservations on or after `from_date`, soonest first.
    pub async fn list_for_user(
        &self,
        user_id: i64,
        from_date: NaiveDate,
    ) -> Result<Vec<Reservation>> {
        self.store
            .list_reservations(&ReservationFilter {
                user_id: Some(user_id),
                date_from: Some(from_date),
                ..Default::default()
            })
            .await
    }

    /// One user's full booking history, most recent date first.
    pub async fn list_all_for_user(&self, user_id: i64) -> Result<Vec<Reservation>> {
        self.store
            .list_reservations(&ReservationFilter {
                user_id: Some(user_id),
                newest_first: true,
                ..Default::default()
            })
            .await
    }
}
