use super::ProgressSnapshot;

/// Percentage as shown in the UI: floored, capped at 100.
pub fn display_percent(snapshot: &ProgressSnapshot) -> u8 {
    snapshot.percent_complete.floor().clamp(0.0, 100.0) as u8
}

pub fn format_status(snapshot: &ProgressSnapshot) -> String {
    if snapshot.is_complete {
        return format!(
            "Jornada completa, finalizada às {}",
            snapshot.projected_end_hhmm()
        );
    }

    let remaining = snapshot.display_remaining_minutes();
    format!(
        "Faltam {}h{:02}min · término previsto às {} · {}%",
        remaining / 60,
        remaining % 60,
        snapshot.projected_end_hhmm(),
        display_percent(snapshot)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::{compute_progress, DEFAULT_TARGET_MINUTES};
    use crate::timesheet::SessionTimes;
    use chrono::NaiveTime;

    fn snapshot_at(hhmm: &str) -> ProgressSnapshot {
        let now = NaiveTime::parse_from_str(hhmm, "%H:%M").unwrap();
        compute_progress(
            &SessionTimes::new("08:00", "12:00", "13:00"),
            now,
            DEFAULT_TARGET_MINUTES,
        )
        .unwrap()
    }

    #[test]
    fn in_progress_line() {
        assert_eq!(
            format_status(&snapshot_at("14:55")),
            "Faltam 2h05min · término previsto às 17:00 · 73%"
        );
    }

    #[test]
    fn completed_line() {
        assert_eq!(
            format_status(&snapshot_at("17:30")),
            "Jornada completa, finalizada às 17:00"
        );
    }

    #[test]
    fn percent_is_floored() {
        // 241 / 480 = 50.2%
        assert_eq!(display_percent(&snapshot_at("13:01")), 50);
        assert_eq!(display_percent(&snapshot_at("16:59")), 99);
    }
}
