use anyhow::Result;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::{
    progress::{compute_progress, ProgressSnapshot},
    timesheet::SessionTimes,
};

use super::MonitorConfig;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum MonitorStatus {
    #[default]
    Idle,
    Active,
    Stopped,
}

impl MonitorStatus {
    /// `Stopped` behaves exactly like `Idle` for transitions.
    pub fn is_active(&self) -> bool {
        matches!(self, MonitorStatus::Active)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Milestone {
    AlmostComplete { remaining_minutes: i64 },
    Complete,
}

/// Clock irregularities noticed while ticking. Logged, never fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockAnomaly {
    BeforeSecondPeriod,
    WentBackwards,
    DayRollover,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TickOutcome {
    pub snapshot: ProgressSnapshot,
    pub milestone: Option<Milestone>,
    pub anomalies: Vec<ClockAnomaly>,
}

/// One monitored workday. Both `*_fired` flags only ever go from false to
/// true; a fresh session is the only way to clear them.
#[derive(Debug, Clone)]
pub struct MonitorSession {
    pub id: String,
    pub times: SessionTimes,
    pub started_at: NaiveDateTime,
    pub almost_complete_fired: bool,
    pub complete_fired: bool,
    pub last_snapshot: Option<ProgressSnapshot>,
    last_tick_at: Option<NaiveDateTime>,
    before_second_period: bool,
}

impl MonitorSession {
    pub fn new(id: String, times: SessionTimes, started_at: NaiveDateTime) -> Self {
        Self {
            id,
            times,
            started_at,
            almost_complete_fired: false,
            complete_fired: false,
            last_snapshot: None,
            last_tick_at: None,
            before_second_period: false,
        }
    }

    pub fn session_date(&self) -> NaiveDate {
        self.started_at.date()
    }

    /// Recomputes progress for `now` and decides which milestone, if any,
    /// this tick fires. On error the session is left untouched.
    pub fn advance(&mut self, now: NaiveDateTime, config: &MonitorConfig) -> Result<TickOutcome> {
        let snapshot = compute_progress(&self.times, now.time(), config.target_minutes)?;

        let mut anomalies = Vec::new();
        if snapshot.before_second_period && !self.before_second_period {
            anomalies.push(ClockAnomaly::BeforeSecondPeriod);
        }
        if self.last_tick_at.is_some_and(|last| now < last) {
            anomalies.push(ClockAnomaly::WentBackwards);
        }
        if now.date() != self.session_date()
            && self.last_tick_at.map_or(true, |last| last.date() != now.date())
        {
            anomalies.push(ClockAnomaly::DayRollover);
        }

        let remaining = snapshot.remaining_minutes;
        let milestone = if remaining <= 0 {
            if self.complete_fired {
                None
            } else {
                self.complete_fired = true;
                // A late "almost" after completion would be noise.
                self.almost_complete_fired = true;
                Some(Milestone::Complete)
            }
        } else if remaining <= config.almost_complete_minutes && !self.almost_complete_fired {
            self.almost_complete_fired = true;
            Some(Milestone::AlmostComplete {
                remaining_minutes: remaining,
            })
        } else {
            None
        };

        self.before_second_period = snapshot.before_second_period;
        self.last_tick_at = Some(now);
        self.last_snapshot = Some(snapshot.clone());

        Ok(TickOutcome {
            snapshot,
            milestone,
            anomalies,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct MonitorState {
    pub status: MonitorStatus,
    pub session: Option<MonitorSession>,
}

impl MonitorState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_session(&mut self, session: MonitorSession) {
        *self = Self {
            status: MonitorStatus::Active,
            session: Some(session),
        };
    }

    /// Discards the session. Returns it if one was active.
    pub fn stop(&mut self) -> Option<MonitorSession> {
        let session = self.session.take();
        self.status = if session.is_some() {
            MonitorStatus::Stopped
        } else {
            self.status
        };
        session
    }

    pub fn active_session_mut(&mut self, session_id: &str) -> Option<&mut MonitorSession> {
        if !self.status.is_active() {
            return None;
        }
        self.session.as_mut().filter(|session| session.id == session_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};

    fn at(hhmm: &str) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 11)
            .unwrap()
            .and_time(NaiveTime::parse_from_str(hhmm, "%H:%M").unwrap())
    }

    fn session() -> MonitorSession {
        MonitorSession::new(
            "s-1".into(),
            SessionTimes::new("08:00", "12:00", "13:00"),
            at("13:00"),
        )
    }

    #[test]
    fn almost_complete_fires_once_inside_band() {
        let config = MonitorConfig::default();
        let mut session = session();

        assert_eq!(session.advance(at("16:56"), &config).unwrap().milestone, None);
        assert_eq!(
            session.advance(at("16:57"), &config).unwrap().milestone,
            Some(Milestone::AlmostComplete { remaining_minutes: 3 })
        );
        assert_eq!(session.advance(at("16:58"), &config).unwrap().milestone, None);
        assert_eq!(session.advance(at("16:59"), &config).unwrap().milestone, None);
        assert!(session.almost_complete_fired);
        assert!(!session.complete_fired);
    }

    #[test]
    fn complete_fires_once_and_never_again() {
        let config = MonitorConfig::default();
        let mut session = session();

        session.advance(at("16:58"), &config).unwrap();
        assert_eq!(
            session.advance(at("17:00"), &config).unwrap().milestone,
            Some(Milestone::Complete)
        );
        for minute in 1..=59 {
            let now = at("17:00") + chrono::Duration::minutes(minute);
            assert_eq!(session.advance(now, &config).unwrap().milestone, None);
        }
    }

    #[test]
    fn complete_takes_precedence_when_band_is_skipped() {
        let config = MonitorConfig::default();
        let mut session = session();

        let outcome = session.advance(at("18:00"), &config).unwrap();
        assert_eq!(outcome.milestone, Some(Milestone::Complete));

        // Clock moved back into the "almost" band: nothing fires.
        let outcome = session.advance(at("16:58"), &config).unwrap();
        assert_eq!(outcome.milestone, None);
        assert!(outcome.anomalies.contains(&ClockAnomaly::WentBackwards));
    }

    #[test]
    fn band_reentry_after_clock_change_does_not_refire() {
        let config = MonitorConfig::default();
        let mut session = session();

        session.advance(at("16:57"), &config).unwrap();
        session.advance(at("16:40"), &config).unwrap();
        assert_eq!(session.advance(at("16:58"), &config).unwrap().milestone, None);
    }

    #[test]
    fn reports_time_before_second_period_once() {
        let config = MonitorConfig::default();
        let mut session = session();

        let first = session.advance(at("12:30"), &config).unwrap();
        assert_eq!(first.anomalies, vec![ClockAnomaly::BeforeSecondPeriod]);
        assert_eq!(first.snapshot.remaining_minutes, 240);

        let second = session.advance(at("12:31"), &config).unwrap();
        assert!(second.anomalies.is_empty());
    }

    #[test]
    fn reports_day_rollover_once() {
        let config = MonitorConfig::default();
        let mut session = session();

        let next_day = at("13:30") + chrono::Duration::days(1);
        let first = session.advance(next_day, &config).unwrap();
        assert!(first.anomalies.contains(&ClockAnomaly::DayRollover));
        let second = session
            .advance(next_day + chrono::Duration::minutes(1), &config)
            .unwrap();
        assert!(second.anomalies.is_empty());
    }

    #[test]
    fn failed_tick_leaves_flags_alone() {
        let config = MonitorConfig::default();
        let mut session = session();
        session.times.start2 = "13:0".into();

        assert!(session.advance(at("17:00"), &config).is_err());
        assert!(!session.complete_fired);
        assert!(session.last_snapshot.is_none());
    }

    #[test]
    fn threshold_is_configurable() {
        let config = MonitorConfig {
            almost_complete_minutes: 10,
            ..MonitorConfig::default()
        };
        let mut session = session();

        assert_eq!(
            session.advance(at("16:50"), &config).unwrap().milestone,
            Some(Milestone::AlmostComplete { remaining_minutes: 10 })
        );
    }

    #[test]
    fn stop_discards_session() {
        let mut state = MonitorState::new();
        state.begin_session(session());
        assert!(state.active_session_mut("s-1").is_some());
        assert!(state.active_session_mut("other").is_none());

        assert!(state.stop().is_some());
        assert_eq!(state.status, MonitorStatus::Stopped);
        assert!(state.session.is_none());
        assert!(state.active_session_mut("s-1").is_none());

        assert!(state.stop().is_none());
        assert_eq!(state.status, MonitorStatus::Stopped);
    }
}
