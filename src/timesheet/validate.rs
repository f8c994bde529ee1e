use std::collections::BTreeSet;

use serde::Serialize;

use super::{is_complete, minutes_of, SessionTimes, TimeField};

/// Outcome of checking `start1 < end1 < start2`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SequenceValidation {
    pub is_valid: bool,
    pub field_errors: BTreeSet<TimeField>,
}

impl SequenceValidation {
    pub fn has_error(&self, field: TimeField) -> bool {
        self.field_errors.contains(&field)
    }
}

/// Checks the ordering of whichever fields are complete.
///
/// Incomplete fields are left out of the comparisons and never flagged on
/// their own, but `is_valid` requires all three to be complete. A complete
/// field that is not a real time (`"27:00"`) is flagged.
pub fn validate_sequence(times: &SessionTimes) -> SequenceValidation {
    let mut field_errors = BTreeSet::new();

    let mut minutes = |field: TimeField| -> Option<i64> {
        let value = times.field(field);
        if !is_complete(value) {
            return None;
        }
        match minutes_of(value) {
            Ok(m) => Some(m),
            Err(_) => {
                field_errors.insert(field);
                None
            }
        }
    };

    let start1 = minutes(TimeField::Start1);
    let end1 = minutes(TimeField::End1);
    let start2 = minutes(TimeField::Start2);

    if let (Some(s1), Some(e1)) = (start1, end1) {
        if s1 >= e1 {
            field_errors.insert(TimeField::Start1);
            field_errors.insert(TimeField::End1);
        }
    }

    if let (Some(s2), Some(s1)) = (start2, start1) {
        if s2 == s1 {
            field_errors.insert(TimeField::Start2);
        }
    }

    if let (Some(s2), Some(e1)) = (start2, end1) {
        if s2 <= e1 {
            field_errors.insert(TimeField::Start2);
            field_errors.insert(TimeField::End1);
        }
    }

    let all_complete = TimeField::ALL
        .iter()
        .all(|field| is_complete(times.field(*field)));

    SequenceValidation {
        is_valid: all_complete && field_errors.is_empty(),
        field_errors,
    }
}
