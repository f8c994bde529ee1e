use std::collections::BTreeSet;

use thiserror::Error;

use crate::timesheet::{SequenceValidation, TimeField};

/// The session times cannot be monitored: incomplete or out of order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid session times (fields: {})", describe(.field_errors, .incomplete))]
pub struct ValidationError {
    pub field_errors: BTreeSet<TimeField>,
    pub incomplete: BTreeSet<TimeField>,
}

impl ValidationError {
    pub fn from_validation(validation: &SequenceValidation, incomplete: BTreeSet<TimeField>) -> Self {
        Self {
            field_errors: validation.field_errors.clone(),
            incomplete,
        }
    }
}

fn describe(errors: &BTreeSet<TimeField>, incomplete: &BTreeSet<TimeField>) -> String {
    let mut parts: Vec<String> = errors.iter().map(|f| format!("{f} out of order")).collect();
    parts.extend(incomplete.iter().map(|f| format!("{f} incomplete")));
    parts.join(", ")
}

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("monitoring already active")]
    AlreadyActive,
}
