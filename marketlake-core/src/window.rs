//! Window alignment — truncate event timestamps to a fixed granularity.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Window granularity in whole minutes.
///
/// Granularity is a parameter of the downstream consumer, not a global: two
/// aggregations over the same silver set may use different specs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSpec {
    minutes: u32,
}

impl WindowSpec {
    /// Five-minute windows, the default downstream granularity.
    pub const FIVE_MINUTES: WindowSpec = WindowSpec { minutes: 5 };

    /// `None` for a zero-minute window, which has no well-defined floor.
    pub fn from_minutes(minutes: u32) -> Option<Self> {
        if minutes == 0 {
            None
        } else {
            Some(Self { minutes })
        }
    }

    pub fn as_minutes(&self) -> u32 {
        self.minutes
    }

    pub fn as_seconds(&self) -> i64 {
        i64::from(self.minutes) * 60
    }
}

/// Truncate `ts` down to the start of its window.
///
/// Integer division on epoch seconds, so a timestamp already on a window
/// boundary maps to itself.
pub fn floor_to_window(ts: DateTime<Utc>, window: WindowSpec) -> DateTime<Utc> {
    let step = window.as_seconds();
    let floored = ts.timestamp().div_euclid(step) * step;
    Utc.timestamp_opt(floored, 0).unwrap()
}
