use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row};

use crate::error::{HallpassError, Result};
use crate::model::*;
use crate::storage::ReservationStore;

const DATE_FMT: &str = "%Y-%m-%d";
const TIME_FMT: &str = "%H:%M";

/// SQLite-backed store for Hallpass.
///
/// Uses a single `Connection` behind `Arc<Mutex<>>` so it can be shared across
/// async tasks. All blocking SQLite calls go through
/// [`with_conn`](Self::with_conn) which runs them on the Tokio blocking
/// thread-pool. Because every access serializes on that one connection, the
/// overlap re-check inside [`insert_reservation`](ReservationStore::insert_reservation)
/// and the insert itself form a single critical section.
#[derive(Clone)]
pub struct SqliteStorage {
    conn: Arc<Mutex<Connection>>,
    path: PathBuf,
}

impl SqliteStorage {
    /// Open (or create) a file-backed SQLite database at `path`.
    ///
    /// Sets WAL journal mode and enables foreign keys, then creates all tables
    /// and indexes if they don't already exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open(&path)
            .map_err(|e| HallpassError::Storage(format!("failed to open SQLite database: {e}")))?;

        Self::configure_and_init(conn, path)
    }

    /// Open an in-memory SQLite database (useful for tests).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| {
            HallpassError::Storage(format!("failed to open in-memory SQLite database: {e}"))
        })?;

        Self::configure_and_init(conn, PathBuf::from(":memory:"))
    }

    /// Return the path this database was opened with (`:memory:` for in-memory).
    pub fn path(&self) -> &Path {
        &self.path
    }

    // ── helpers ────────────────────────────────────────────────────────

    fn configure_and_init(conn: Connection, path: PathBuf) -> Result<Self> {
        conn.execute_batch("PRAGMA journal_mode = WAL;")
            .map_err(|e| HallpassError::Storage(format!("failed to set WAL mode: {e}")))?;

        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(|e| HallpassError::Storage(format!("failed to enable foreign keys: {e}")))?;

        let storage = Self {
            conn: Arc::new(Mutex::new(conn)),
            path,
        };

        storage.create_tables()?;
        Ok(storage)
    }

    /// Create all tables and indexes (idempotent).
    fn create_tables(&self) -> Result<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| HallpassError::Storage(format!("failed to acquire database lock: {e}")))?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS rooms (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                capacity INTEGER NOT NULL DEFAULT 10,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS reservations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                room_id INTEGER NOT NULL REFERENCES rooms(id) ON DELETE CASCADE,
                user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                reservation_date TEXT NOT NULL,
                start_time TEXT NOT NULL,
                end_time TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_reservations_room_date
                ON reservations(room_id, reservation_date);
            CREATE INDEX IF NOT EXISTS idx_reservations_user
                ON reservations(user_id, reservation_date);
            ",
        )
        .map_err(|e| HallpassError::Storage(format!("failed to create tables: {e}")))?;

        Ok(())
    }

    /// Run a blocking closure against the SQLite connection on the Tokio
    /// blocking thread-pool. This is the primary way trait methods interact
    /// with the database.
    async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock().map_err(|e| {
                HallpassError::Storage(format!("failed to acquire database lock: {e}"))
            })?;
            f(&mut conn)
        })
        .await
        .map_err(|e| HallpassError::Storage(format!("task join error: {e}")))?
    }
}

// ── row mapping ────────────────────────────────────────────────────────

fn parse_timestamp(s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })
}

fn parse_stored_date(s: &str) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FMT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn parse_stored_time(s: &str) -> rusqlite::Result<NaiveTime> {
    NaiveTime::parse_from_str(s, TIME_FMT)
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })
}

fn room_from_row(row: &Row<'_>) -> rusqlite::Result<Room> {
    Ok(Room {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        capacity: row.get(3)?,
        created_at: parse_timestamp(&row.get::<_, String>(4)?)?,
    })
}

/// Maps the standard reservation projection:
/// `id, room_id, user_id, reservation_date, start_time, end_time, created_at, room_name, username`.
fn reservation_from_row(row: &Row<'_>) -> rusqlite::Result<Reservation> {
    Ok(Reservation {
        id: row.get(0)?,
        room_id: row.get(1)?,
        user_id: row.get(2)?,
        reservation_date: parse_stored_date(&row.get::<_, String>(3)?)?,
        start_time: parse_stored_time(&row.get::<_, String>(4)?)?,
        end_time: parse_stored_time(&row.get::<_, String>(5)?)?,
        created_at: parse_timestamp(&row.get::<_, String>(6)?)?,
        room_name: row.get(7)?,
        username: row.get(8)?,
    })
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

fn storage_err(e: rusqlite::Error) -> HallpassError {
    HallpassError::Storage(e.to_string())
}

const RESERVATION_SELECT: &str = "
    SELECT r.id, r.room_id, r.user_id, r.reservation_date, r.start_time, r.end_time,
           r.created_at, rooms.name, users.username
    FROM reservations r
    JOIN rooms ON r.room_id = rooms.id
    JOIN users ON r.user_id = users.id";

/// Overlap predicate for half-open intervals: existing.start < candidate.end
/// AND existing.end > candidate.start. `HH:MM` strings compare correctly as
/// text because they are zero-padded and fixed-width.
const OVERLAP_WHERE: &str =
    "room_id = ?1 AND reservation_date = ?2 AND start_time < ?3 AND end_time > ?4";

impl ReservationStore for SqliteStorage {
    async fn create_user(&self, username: &str, password_hash: &str) -> Result<User> {
        let username = username.trim().to_string();
        let password_hash = password_hash.to_string();
        self.with_conn(move |conn| {
            let now = Utc::now();
            let inserted = conn.execute(
                "INSERT INTO users (username, password_hash, created_at) VALUES (?1, ?2, ?3)",
                (&username, &password_hash, now.to_rfc3339()),
            );
            match inserted {
                Ok(_) => Ok(User {
                    id: conn.last_insert_rowid(),
                    username,
                    created_at: now,
                }),
                Err(e) if is_unique_violation(&e) => Err(HallpassError::Conflict(format!(
                    "username '{username}' is already taken"
                ))),
                Err(e) => Err(storage_err(e)),
            }
        })
        .await
    }

    async fn get_user_with_password(&self, username: &str) -> Result<Option<(User, String)>> {
        let username = username.trim().to_string();
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT id, username, password_hash, created_at FROM users WHERE username = ?1",
                [&username],
                |row| {
                    let user = User {
                        id: row.get(0)?,
                        username: row.get(1)?,
                        created_at: parse_timestamp(&row.get::<_, String>(3)?)?,
                    };
                    Ok((user, row.get::<_, String>(2)?))
                },
            )
            .optional()
            .map_err(storage_err)
        })
        .await
    }

    async fn create_room(&self, input: &RoomInput) -> Result<Room> {
        let input = input.clone();
        self.with_conn(move |conn| {
            let now = Utc::now();
            conn.execute(
                "INSERT INTO rooms (name, description, capacity, created_at) VALUES (?1, ?2, ?3, ?4)",
                (&input.name, &input.description, input.capacity, now.to_rfc3339()),
            )
            .map_err(storage_err)?;
            Ok(Room {
                id: conn.last_insert_rowid(),
                name: input.name,
                description: input.description,
                capacity: input.capacity,
                created_at: now,
            })
        })
        .await
    }

    async fn update_room(&self, id: i64, input: &RoomInput) -> Result<Room> {
        let input = input.clone();
        self.with_conn(move |conn| {
            let changed = conn
                .execute(
                    "UPDATE rooms SET name = ?1, description = ?2, capacity = ?3 WHERE id = ?4",
                    (&input.name, &input.description, input.capacity, id),
                )
                .map_err(storage_err)?;
            if changed == 0 {
                return Err(HallpassError::NotFound(format!("room {id}")));
            }
            conn.query_row(
                "SELECT id, name, description, capacity, created_at FROM rooms WHERE id = ?1",
                [id],
                room_from_row,
            )
            .map_err(storage_err)
        })
        .await
    }

    async fn delete_room(&self, id: i64) -> Result<()> {
        self.with_conn(move |conn| {
            let deleted = conn
                .execute("DELETE FROM rooms WHERE id = ?1", [id])
                .map_err(storage_err)?;
            if deleted == 0 {
                return Err(HallpassError::NotFound(format!("room {id}")));
            }
            Ok(())
        })
        .await
    }

    async fn get_room(&self, id: i64) -> Result<Room> {
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT id, name, description, capacity, created_at FROM rooms WHERE id = ?1",
                [id],
                room_from_row,
            )
            .optional()
            .map_err(storage_err)?
            .ok_or_else(|| HallpassError::NotFound(format!("room {id}")))
        })
        .await
    }

    async fn list_rooms(&self) -> Result<Vec<Room>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, name, description, capacity, created_at
                     FROM rooms ORDER BY created_at DESC, id DESC",
                )
                .map_err(storage_err)?;
            let rooms = stmt
                .query_map([], room_from_row)
                .map_err(storage_err)?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(storage_err)?;
            Ok(rooms)
        })
        .await
    }

    async fn insert_reservation(&self, new: &NewReservation) -> Result<Reservation> {
        let new = new.clone();
        self.with_conn(move |conn| {
            let tx = conn.transaction().map_err(storage_err)?;

            let date = new.reservation_date.format(DATE_FMT).to_string();
            let start = new.start_time.format(TIME_FMT).to_string();
            let end = new.end_time.format(TIME_FMT).to_string();

            let room_name: Option<String> = tx
                .query_row(
                    "SELECT name FROM rooms WHERE id = ?1",
                    [new.room_id],
                    |row| row.get(0),
                )
                .optional()
                .map_err(storage_err)?;
            let Some(room_name) = room_name else {
                return Err(HallpassError::NotFound(format!("room {}", new.room_id)));
            };

            // Authoritative conflict guard: re-check inside the transaction so
            // the check and the insert cannot be interleaved.
            let conflicts: i64 = tx
                .query_row(
                    &format!("SELECT COUNT(*) FROM reservations WHERE {OVERLAP_WHERE}"),
                    (new.room_id, &date, &end, &start),
                    |row| row.get(0),
                )
                .map_err(storage_err)?;
            if conflicts > 0 {
                return Err(HallpassError::Conflict(
                    "the room is already reserved for that time".into(),
                ));
            }

            let now = Utc::now();
            tx.execute(
                "INSERT INTO reservations
                    (room_id, user_id, reservation_date, start_time, end_time, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                (new.room_id, new.user_id, &date, &start, &end, now.to_rfc3339()),
            )
            .map_err(storage_err)?;
            let id = tx.last_insert_rowid();

            tx.commit().map_err(storage_err)?;

            Ok(Reservation {
                id,
                room_id: new.room_id,
                user_id: new.user_id,
                reservation_date: new.reservation_date,
                start_time: new.start_time,
                end_time: new.end_time,
                created_at: now,
                room_name: Some(room_name),
                username: None,
            })
        })
        .await
    }

    async fn get_reservation(&self, id: i64) -> Result<Reservation> {
        self.with_conn(move |conn| {
            conn.query_row(
                &format!("{RESERVATION_SELECT} WHERE r.id = ?1"),
                [id],
                reservation_from_row,
            )
            .optional()
            .map_err(storage_err)?
            .ok_or_else(|| HallpassError::NotFound(format!("reservation {id}")))
        })
        .await
    }

    async fn delete_reservation(&self, id: i64) -> Result<()> {
        self.with_conn(move |conn| {
            let deleted = conn
                .execute("DELETE FROM reservations WHERE id = ?1", [id])
                .map_err(storage_err)?;
            if deleted == 0 {
                return Err(HallpassError::NotFound(format!("reservation {id}")));
            }
            Ok(())
        })
        .await
    }

    async fn has_overlap(
        &self,
        room_id: i64,
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
    ) -> Result<bool> {
        self.with_conn(move |conn| {
            let count: i64 = conn
                .query_row(
                    &format!("SELECT COUNT(*) FROM reservations WHERE {OVERLAP_WHERE}"),
                    (
                        room_id,
                        date.format(DATE_FMT).to_string(),
                        end.format(TIME_FMT).to_string(),
                        start.format(TIME_FMT).to_string(),
                    ),
                    |row| row.get(0),
                )
                .map_err(storage_err)?;
            Ok(count > 0)
        })
        .await
    }

    async fn list_reservations(&self, filter: &ReservationFilter) -> Result<Vec<Reservation>> {
        let filter = filter.clone();
        self.with_conn(move |conn| {
            let mut sql = format!("{RESERVATION_SELECT} WHERE 1=1");
            let mut params: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

            if let Some(room_id) = filter.room_id {
                params.push(Box::new(room_id));
                sql.push_str(&format!(" AND r.room_id = ?{}", params.len()));
            }
            if let Some(user_id) = filter.user_id {
                params.push(Box::new(user_id));
                sql.push_str(&format!(" AND r.user_id = ?{}", params.len()));
            }
            if let Some(date) = filter.date {
                params.push(Box::new(date.format(DATE_FMT).to_string()));
                sql.push_str(&format!(" AND r.reservation_date = ?{}", params.len()));
            }
            if let Some(from) = filter.date_from {
                params.push(Box::new(from.format(DATE_FMT).to_string()));
                sql.push_str(&format!(" AND r.reservation_date >= ?{}", params.len()));
            }
            if let Some(to) = filter.date_to {
                params.push(Box::new(to.format(DATE_FMT).to_string()));
                sql.push_str(&format!(" AND r.reservation_date <= ?{}", params.len()));
            }

            if filter.newest_first {
                sql.push_str(" ORDER BY r.reservation_date DESC, r.start_time");
            } else {
                sql.push_str(" ORDER BY r.reservation_date, r.start_time");
            }

            let mut stmt = conn.prepare(&sql).map_err(storage_err)?;
            let param_refs: Vec<&dyn rusqlite::types::ToSql> =
                params.iter().map(|p| p.as_ref()).collect();
            let reservations = stmt
                .query_map(&param_refs[..], reservation_from_row)
                .map_err(storage_err)?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(storage_err)?;
            Ok(reservations)
        })
        .await
    }

    async fn ping(&self) -> Result<()> {
        self.with_conn(|conn| {
            conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
                .map_err(storage_err)?;
            Ok(())
        })
        .await
    }
}
