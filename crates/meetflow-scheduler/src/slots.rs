//! Availability-slot resolution.
//!
//! Pure interval arithmetic: given a search window, a minimum duration,
//! a daily working-hours constraint, and the calendar's busy intervals,
//! produce the ordered free slots a meeting could go into.
//!
//! The algorithm walks the window day by day, intersects each day's
//! working interval with the window, subtracts the merged busy intervals,
//! and keeps the fragments long enough for the requested duration.  An
//! empty result is a normal answer, not an error — callers branch on
//! emptiness.
//!
//! All instants are UTC; working hours are wall-clock hours in the
//! calendar's reference zone, which this deployment pins to UTC.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use tracing::debug;

use crate::error::{Result, SchedulerError};
use crate::meeting::TimeSlot;

/// Daily working window, `[start_hour, end_hour)` in whole hours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct WorkingHours {
    start_hour: u32,
    end_hour: u32,
}

impl WorkingHours {
    /// Create a working-hours window.  `end_hour` may be 24 to run to
    /// midnight; the window must be non-empty.
    pub fn new(start_hour: u32, end_hour: u32) -> Result<Self> {
        if start_hour >= end_hour || end_hour > 24 {
            return Err(SchedulerError::Config {
                reason: format!("invalid working hours {start_hour}..{end_hour}"),
            });
        }
        Ok(Self {
            start_hour,
            end_hour,
        })
    }

    /// First working hour of the day.
    #[must_use]
    pub fn start_hour(&self) -> u32 {
        self.start_hour
    }

    /// Exclusive end hour of the day.
    #[must_use]
    pub fn end_hour(&self) -> u32 {
        self.end_hour
    }
}

/// The instant `hour` hours after midnight UTC on `day`.  Hour 24 is the
/// next day's midnight.
fn day_at_hour(day: NaiveDate, hour: u32) -> DateTime<Utc> {
    day.and_time(NaiveTime::MIN).and_utc() + Duration::hours(i64::from(hour))
}

/// Merge overlapping or touching busy intervals into a sorted,
/// well-formed sequence.
#[must_use]
pub fn merge_busy(busy: &[TimeSlot]) -> Vec<TimeSlot> {
    let mut sorted = busy.to_vec();
    sorted.sort_by_key(|slot| slot.start);

    let mut merged: Vec<TimeSlot> = Vec::new();
    for slot in sorted {
        match merged.last_mut() {
            Some(last) if slot.start <= last.end => {
                if slot.end > last.end {
                    last.end = slot.end;
                }
            }
            _ => merged.push(slot),
        }
    }
    merged
}

/// Subtract `merged` (sorted, non-overlapping) from `[open, close)` and
/// append every remaining fragment of at least `min_duration` to `out`.
fn subtract_into(
    open: DateTime<Utc>,
    close: DateTime<Utc>,
    merged: &[TimeSlot],
    min_duration: Duration,
    out: &mut Vec<TimeSlot>,
) {
    let mut push = |start: DateTime<Utc>, end: DateTime<Utc>| {
        if end - start >= min_duration {
            out.push(TimeSlot { start, end });
        }
    };

    let mut cursor = open;
    for busy in merged {
        if busy.end <= cursor {
            continue;
        }
        if busy.start >= close {
            break;
        }
        if busy.start > cursor {
            push(cursor, busy.start.min(close));
        }
        cursor = cursor.max(busy.end);
        if cursor >= close {
            return;
        }
    }
    push(cursor, close);
}

/// Resolve the free slots of at least `min_duration` inside
/// `[window_start, window_end)`, within daily `hours`, avoiding `busy`.
///
/// A degenerate window (`window_start >= window_end`) is rejected.  The
/// result is well-formed: sorted ascending by start, pairwise
/// non-overlapping.  Re-running with identical inputs yields an identical
/// result.
pub fn resolve_free_slots(
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
    min_duration: Duration,
    hours: WorkingHours,
    busy: &[TimeSlot],
) -> Result<Vec<TimeSlot>> {
    let window = TimeSlot::new(window_start, window_end)?;
    let merged = merge_busy(busy);
    let mut free = Vec::new();

    let mut day = window.start.date_naive();
    let last_day = window.end.date_naive();
    while day <= last_day {
        let open = day_at_hour(day, hours.start_hour).max(window.start);
        let close = day_at_hour(day, hours.end_hour).min(window.end);
        if open < close {
            subtract_into(open, close, &merged, min_duration, &mut free);
        }
        day = match day.succ_opt() {
            Some(next) => next,
            None => break,
        };
    }

    debug!(
        window = %window,
        busy = busy.len(),
        free = free.len(),
        "resolved availability"
    );
    Ok(free)
}
