//! Time-slot rules for reservations.
//!
//! Reservations run on a 30-minute grid within a single day and occupy the
//! half-open interval `[start, end)` — a booking ending at 10:00 does not
//! collide with one starting at 10:00.

use chrono::{NaiveDate, NaiveTime, Timelike};

use crate::error::{HallpassError, Result};

/// True iff the time sits on the 30-minute grid.
pub fn is_aligned(time: NaiveTime) -> bool {
    matches!(time.minute(), 0 | 30) && time.second() == 0
}

/// Deterministic conversion for ordering and comparison.
pub fn minutes_since_midnight(time: NaiveTime) -> u32 {
    time.hour() * 60 + time.minute()
}

/// True iff `start` is strictly before `end`.
pub fn is_ordered(start: NaiveTime, end: NaiveTime) -> bool {
    minutes_since_midnight(start) < minutes_since_midnight(end)
}

/// Validate a candidate slot: both endpoints aligned, start strictly before end.
pub fn validate_slot(start: NaiveTime, end: NaiveTime) -> Result<()> {
    if !is_aligned(start) || !is_aligned(end) {
        return Err(HallpassError::InvalidTimeSlot(
            "times must be on a 30-minute boundary (e.g. 09:00, 09:30)".into(),
        ));
    }
    if !is_ordered(start, end) {
        return Err(HallpassError::InvalidTimeSlot(
            "end time must be after start time".into(),
        ));
    }
    Ok(())
}

/// Half-open interval overlap test: `[s1, e1)` intersects `[s2, e2)`.
pub fn overlaps(s1: NaiveTime, e1: NaiveTime, s2: NaiveTime, e2: NaiveTime) -> bool {
    s1 < e2 && e1 > s2
}

/// Parse a wire time string, accepting both `HH:MM` and `HH:MM:SS`.
pub fn parse_time(s: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .map_err(|_| HallpassError::InvalidInput(format!("invalid time '{s}', expected HH:MM")))
}

/// Parse a wire date string in `YYYY-MM-DD` form.
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| HallpassError::InvalidInput(format!("invalid date '{s}', expected YYYY-MM-DD")))
}
