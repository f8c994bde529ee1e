pub mod normalize;
pub mod validate;

use anyhow::{anyhow, Result};
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

pub use normalize::normalize;
pub use validate::{validate_sequence, SequenceValidation};

/// The three wall-clock points of one workday, as typed by the user.
///
/// Each field is either empty, a partial entry (`"0"`, `"08"`, `"08:3"`) or a
/// full `HH:MM`. The desktop frontend stored these as `inicio1`/`fim1`/`inicio2`,
/// so those names are accepted when reading.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionTimes {
    #[serde(default, alias = "inicio1")]
    pub start1: String,
    #[serde(default, alias = "fim1")]
    pub end1: String,
    #[serde(default, alias = "inicio2")]
    pub start2: String,
}

impl SessionTimes {
    pub fn new(start1: impl Into<String>, end1: impl Into<String>, start2: impl Into<String>) -> Self {
        Self {
            start1: start1.into(),
            end1: end1.into(),
            start2: start2.into(),
        }
    }

    pub fn field(&self, field: TimeField) -> &str {
        match field {
            TimeField::Start1 => &self.start1,
            TimeField::End1 => &self.end1,
            TimeField::Start2 => &self.start2,
        }
    }

    pub fn field_mut(&mut self, field: TimeField) -> &mut String {
        match field {
            TimeField::Start1 => &mut self.start1,
            TimeField::End1 => &mut self.end1,
            TimeField::Start2 => &mut self.start2,
        }
    }

    /// Re-applies [`normalize`] to every field.
    pub fn normalized(&self) -> Self {
        Self {
            start1: normalize(&self.start1),
            end1: normalize(&self.end1),
            start2: normalize(&self.start2),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TimeField {
    Start1,
    End1,
    Start2,
}

impl TimeField {
    pub const ALL: [TimeField; 3] = [TimeField::Start1, TimeField::End1, TimeField::Start2];

    pub fn as_str(&self) -> &'static str {
        match self {
            TimeField::Start1 => "start1",
            TimeField::End1 => "end1",
            TimeField::Start2 => "start2",
        }
    }
}

impl std::fmt::Display for TimeField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TimeField {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "start1" | "inicio1" => Ok(TimeField::Start1),
            "end1" | "fim1" => Ok(TimeField::End1),
            "start2" | "inicio2" => Ok(TimeField::Start2),
            other => Err(anyhow!("unknown time field: {other}")),
        }
    }
}

/// A field is complete only once it holds a fully formed `HH:MM`.
pub fn is_complete(value: &str) -> bool {
    value.len() == 5 && value.contains(':')
}

/// Parses a complete `HH:MM` (00:00 to 23:59).
pub fn parse_hhmm(value: &str) -> Result<NaiveTime> {
    if !is_complete(value) {
        return Err(anyhow!("incomplete time value: {value:?}"));
    }
    NaiveTime::parse_from_str(value, "%H:%M").map_err(|err| anyhow!("invalid time {value:?}: {err}"))
}

/// Minutes since midnight for a complete `HH:MM`.
pub fn minutes_of(value: &str) -> Result<i64> {
    let time = parse_hhmm(value)?;
    Ok(minutes_of_time(time))
}

pub fn minutes_of_time(time: NaiveTime) -> i64 {
    use chrono::Timelike;
    i64::from(time.hour()) * 60 + i64::from(time.minute())
}
