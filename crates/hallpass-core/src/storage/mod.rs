mod sqlite;

pub use sqlite::SqliteStorage;

use chrono::{NaiveDate, NaiveTime};

use crate::error::Result;
use crate::model::*;

/// Abstract reservation store. SQLite is the shipped implementation, but this
/// trait is the seam for test doubles and other backends.
pub trait ReservationStore: Send + Sync {
    // -- Users --

    /// Insert a new account. Fails with `Conflict` if the username is taken.
    fn create_user(
        &self,
        username: &str,
        password_hash: &str,
    ) -> impl std::future::Future<Output = Result<User>> + Send;

    /// Fetch a user together with their stored password hash, if present.
    fn get_user_with_password(
        &self,
        username: &str,
    ) -> impl std::future::Future<Output = Result<Option<(User, String)>>> + Send;

    // -- Rooms --

    fn create_room(
        &self,
        input: &RoomInput,
    ) -> impl std::future::Future<Output = Result<Room>> + Send;

    fn update_room(
        &self,
        id: i64,
        input: &RoomInput,
    ) -> impl std::future::Future<Output = Result<Room>> + Send;

    fn delete_room(&self, id: i64) -> impl std::future::Future<Output = Result<()>> + Send;

    fn get_room(&self, id: i64) -> impl std::future::Future<Output = Result<Room>> + Send;

    /// All rooms, newest first.
    fn list_rooms(&self) -> impl std::future::Future<Output = Result<Vec<Room>>> + Send;

    // -- Reservations --

    /// Insert a reservation, atomically re-checking the slot for overlap.
    /// This transactional re-check is the authoritative conflict guard;
    /// callers may (and should) run `has_overlap` first as a fast path.
    fn insert_reservation(
        &self,
        new: &NewReservation,
    ) -> impl std::future::Future<Output = Result<Reservation>> + Send;

    fn get_reservation(
        &self,
        id: i64,
    ) -> impl std::future::Future<Output = Result<Reservation>> + Send;

    fn delete_reservation(&self, id: i64) -> impl std::future::Future<Output = Result<()>> + Send;

    /// True if any existing reservation for `(room_id, date)` intersects the
    /// half-open interval `[start, end)`.
    fn has_overlap(
        &self,
        room_id: i64,
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
    ) -> impl std::future::Future<Output = Result<bool>> + Send;

    fn list_reservations(
        &self,
        filter: &ReservationFilter,
    ) -> impl std::future::Future<Output = Result<Vec<Reservation>>> + Send;

    // -- Health --

    /// Cheap connectivity probe.
    fn ping(&self) -> impl std::future::Future<Output = Result<()>> + Send;
}
