pub mod format;

use anyhow::{Context, Result};
use chrono::{Duration, NaiveTime};
use serde::{Serialize, Serializer};

use crate::timesheet::{minutes_of_time, parse_hhmm, SessionTimes};

pub use format::{display_percent, format_status};

pub const DEFAULT_TARGET_MINUTES: i64 = 8 * 60;

/// Progress of the workday at one instant. Recomputed on every tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    pub worked_minutes: i64,
    /// Unclamped; negative once the target has been exceeded.
    pub remaining_minutes: i64,
    #[serde(serialize_with = "serialize_hhmm")]
    pub projected_end_time: NaiveTime,
    pub percent_complete: f64,
    pub is_complete: bool,
    /// `now` was earlier than `start2`, so the second period counted as zero.
    #[serde(skip)]
    pub before_second_period: bool,
}

impl ProgressSnapshot {
    /// Remaining minutes as shown to the user, never negative.
    pub fn display_remaining_minutes(&self) -> i64 {
        self.remaining_minutes.max(0)
    }

    pub fn projected_end_hhmm(&self) -> String {
        self.projected_end_time.format("%H:%M").to_string()
    }
}

fn serialize_hhmm<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&time.format("%H:%M").to_string())
}

/// Derives worked/remaining time for `now`.
///
/// All three times and `now` are taken to be on the same calendar day; a
/// session spanning midnight is not supported.
pub fn compute_progress(
    times: &SessionTimes,
    now: NaiveTime,
    target_minutes: i64,
) -> Result<ProgressSnapshot> {
    let start1 = parse_hhmm(&times.start1).context("start1")?;
    let end1 = parse_hhmm(&times.end1).context("end1")?;
    let start2 = parse_hhmm(&times.start2).context("start2")?;

    let first_period = (minutes_of_time(end1) - minutes_of_time(start1)).max(0);
    let since_start2 = minutes_of_time(now) - minutes_of_time(start2);
    let second_period = since_start2.max(0);

    let worked_minutes = first_period + second_period;
    let remaining_minutes = target_minutes - worked_minutes;
    let (projected_end_time, _) =
        start2.overflowing_add_signed(Duration::minutes(target_minutes - first_period));

    let percent_complete = if worked_minutes >= target_minutes || target_minutes <= 0 {
        100.0
    } else {
        worked_minutes as f64 / target_minutes as f64 * 100.0
    };

    Ok(ProgressSnapshot {
        worked_minutes,
        remaining_minutes,
        projected_end_time,
        percent_complete,
        is_complete: remaining_minutes <= 0,
        before_second_period: since_start2 < 0,
    })
}
