//! Process-wide monotonic wall clock

use std::sync::{Mutex, PoisonError};

use time::{Duration, OffsetDateTime};

/// Hands out strictly increasing UTC timestamps at microsecond precision,
/// the resolution Postgres `TIMESTAMPTZ` keeps. A wall clock that steps
/// backwards or repeats is nudged forward by one microsecond.
#[derive(Debug)]
pub struct MonotonicClock {
    last: Mutex<OffsetDateTime>,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            last: Mutex::new(OffsetDateTime::UNIX_EPOCH),
        }
    }

    pub fn now(&self) -> OffsetDateTime {
        let wall = truncate_to_micros(OffsetDateTime::now_utc());
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        let next = if wall > *last {
            wall
        } else {
            *last + Duration::microseconds(1)
        };
        *last = next;
        next
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

fn truncate_to_micros(at: OffsetDateTime) -> OffsetDateTime {
    let micros = at.microsecond();
    at.replace_microsecond(micros).unwrap_or(at)
}
