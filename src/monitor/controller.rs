use std::{collections::BTreeSet, sync::Arc, time::Duration};

use chrono::{NaiveDateTime, Timelike};
use log::{info, warn};
use tokio::{
    sync::{broadcast, watch, Mutex},
    task::JoinHandle,
    time,
};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{
    error::{MonitorError, ValidationError},
    notify::MonitorEvent,
    progress::{compute_progress, ProgressSnapshot},
    timesheet::{is_complete, validate_sequence, SessionTimes, TimeField},
};

use super::{
    state::{ClockAnomaly, Milestone, MonitorSession, MonitorState},
    Clock, MonitorConfig, MonitorStatus, SystemClock,
};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

struct Ticker {
    handle: JoinHandle<()>,
    cancel_token: CancellationToken,
}

/// Owns the single monitored workday and its background tick task.
///
/// Cloning is cheap and every clone drives the same monitor.
#[derive(Clone)]
pub struct WorkMonitor {
    state: Arc<Mutex<MonitorState>>,
    /// Held across whole start/stop transitions so they never interleave.
    ticker: Arc<Mutex<Option<Ticker>>>,
    events: broadcast::Sender<MonitorEvent>,
    progress: Arc<watch::Sender<Option<ProgressSnapshot>>>,
    clock: Arc<dyn Clock>,
    config: MonitorConfig,
}

impl WorkMonitor {
    pub fn new(config: MonitorConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: MonitorConfig, clock: Arc<dyn Clock>) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        let (progress, _) = watch::channel(None);
        Self {
            state: Arc::new(Mutex::new(MonitorState::new())),
            ticker: Arc::new(Mutex::new(None)),
            events,
            progress: Arc::new(progress),
            clock,
            config,
        }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Milestone events. Subscribe before starting to see every event.
    pub fn subscribe(&self) -> broadcast::Receiver<MonitorEvent> {
        self.events.subscribe()
    }

    /// Latest snapshot, updated after every tick; `None` while idle.
    pub fn subscribe_progress(&self) -> watch::Receiver<Option<ProgressSnapshot>> {
        self.progress.subscribe()
    }

    pub async fn status(&self) -> MonitorStatus {
        self.state.lock().await.status
    }

    pub async fn session_times(&self) -> Option<SessionTimes> {
        let guard = self.state.lock().await;
        guard.session.as_ref().map(|session| session.times.clone())
    }

    /// Progress at the current instant, or `None` when not monitoring.
    /// Does not fire milestones.
    pub async fn get_snapshot(&self) -> Option<ProgressSnapshot> {
        let now = self.clock.now();
        let guard = self.state.lock().await;
        if !guard.status.is_active() {
            return None;
        }
        let session = guard.session.as_ref()?;
        match compute_progress(&session.times, now.time(), self.config.target_minutes) {
            Ok(snapshot) => Some(snapshot),
            Err(err) => {
                warn!("snapshot fell back to last tick: {err:?}");
                session.last_snapshot.clone()
            }
        }
    }

    /// Starts monitoring `times`. Rejected if already active or if the
    /// times are not a complete `start1 < end1 < start2` sequence.
    pub async fn start(&self, times: SessionTimes) -> Result<(), MonitorError> {
        let mut ticker_guard = self.ticker.lock().await;
        self.start_locked(&mut ticker_guard, times).await
    }

    /// Stops monitoring. The tick task is gone when this returns. No-op when
    /// nothing is being monitored.
    pub async fn stop(&self) {
        let mut ticker_guard = self.ticker.lock().await;
        self.stop_locked(&mut ticker_guard).await;
    }

    /// Replaces the current session (if any) with a fresh one for `times`.
    /// On validation failure the current session keeps running.
    pub async fn restart(&self, times: SessionTimes) -> Result<(), MonitorError> {
        let mut ticker_guard = self.ticker.lock().await;
        check_times(&times)?;
        self.stop_locked(&mut ticker_guard).await;
        self.start_locked(&mut ticker_guard, times).await
    }

    /// Evaluates one tick now. Returns the fresh snapshot, or `None` when
    /// idle or when the tick failed.
    pub async fn tick(&self) -> Option<ProgressSnapshot> {
        let session_id = {
            let guard = self.state.lock().await;
            guard.session.as_ref().map(|session| session.id.clone())?
        };
        run_tick(
            &self.state,
            &session_id,
            self.clock.as_ref(),
            &self.config,
            &self.events,
            &self.progress,
        )
        .await
    }

    async fn start_locked(
        &self,
        ticker_guard: &mut Option<Ticker>,
        times: SessionTimes,
    ) -> Result<(), MonitorError> {
        let session_id = {
            let mut state = self.state.lock().await;
            if state.status.is_active() {
                log_warn!("start rejected: monitoring already active");
                return Err(MonitorError::AlreadyActive);
            }
            if let Err(err) = check_times(&times) {
                log_warn!("start rejected: {}", err);
                return Err(err.into());
            }

            let session_id = Uuid::new_v4().to_string();
            let session = MonitorSession::new(session_id.clone(), times.clone(), self.clock.now());
            state.begin_session(session);
            session_id
        };

        info!(
            "Monitoring workday {} ({} - {}, {} onwards)",
            session_id, times.start1, times.end1, times.start2
        );

        run_tick(
            &self.state,
            &session_id,
            self.clock.as_ref(),
            &self.config,
            &self.events,
            &self.progress,
        )
        .await;

        *ticker_guard = Some(self.spawn_ticker(session_id));
        Ok(())
    }

    async fn stop_locked(&self, ticker_guard: &mut Option<Ticker>) {
        let stopped = self.state.lock().await.stop();

        if let Some(ticker) = ticker_guard.take() {
            ticker.cancel_token.cancel();
            ticker.handle.abort();
            // Cancellation is the expected outcome; anything else already logged.
            let _ = ticker.handle.await;
        }

        if let Some(session) = stopped {
            info!("Stopped monitoring workday {}", session.id);
            self.progress.send_replace(None);
        }
    }

    fn spawn_ticker(&self, session_id: String) -> Ticker {
        let cancel_token = CancellationToken::new();
        let token = cancel_token.clone();
        let state = self.state.clone();
        let clock = self.clock.clone();
        let config = self.config.clone();
        let events = self.events.clone();
        let progress = self.progress.clone();

        let handle = tokio::spawn(async move {
            loop {
                let delay = delay_until_next_tick(clock.now(), config.tick_period);
                tokio::select! {
                    _ = time::sleep(delay) => {}
                    _ = token.cancelled() => break,
                }

                if !is_current(&state, &session_id).await {
                    break;
                }
                run_tick(&state, &session_id, clock.as_ref(), &config, &events, &progress).await;
            }
            log_info!("tick loop for workday {} finished", session_id);
        });

        Ticker {
            handle,
            cancel_token,
        }
    }
}

async fn is_current(state: &Mutex<MonitorState>, session_id: &str) -> bool {
    let guard = state.lock().await;
    guard.status.is_active()
        && guard
            .session
            .as_ref()
            .is_some_and(|session| session.id == session_id)
}

fn check_times(times: &SessionTimes) -> Result<(), ValidationError> {
    let validation = validate_sequence(times);
    if validation.is_valid {
        return Ok(());
    }
    let incomplete: BTreeSet<TimeField> = TimeField::ALL
        .into_iter()
        .filter(|field| !is_complete(times.field(*field)))
        .collect();
    Err(ValidationError::from_validation(&validation, incomplete))
}

async fn run_tick(
    state: &Mutex<MonitorState>,
    session_id: &str,
    clock: &dyn Clock,
    config: &MonitorConfig,
    events: &broadcast::Sender<MonitorEvent>,
    progress: &watch::Sender<Option<ProgressSnapshot>>,
) -> Option<ProgressSnapshot> {
    let now = clock.now();

    // Evaluate and publish under the lock so a concurrent stop cannot slip
    // in between the flag update and the event.
    let mut guard = state.lock().await;
    let session = guard.active_session_mut(session_id)?;

    let outcome = match session.advance(now, config) {
        Ok(outcome) => outcome,
        Err(err) => {
            log_error!("tick skipped for workday {}: {:?}", session_id, err);
            return None;
        }
    };

    for anomaly in &outcome.anomalies {
        match anomaly {
            ClockAnomaly::BeforeSecondPeriod => log_warn!(
                "clock is before start2 ({}) for workday {}; counting second period as zero",
                session.times.start2,
                session_id
            ),
            ClockAnomaly::WentBackwards => {
                log_warn!("wall clock moved backwards to {} for workday {}", now, session_id)
            }
            ClockAnomaly::DayRollover => log_warn!(
                "calendar day changed since workday {} started on {}; times are read as today's",
                session_id,
                session.session_date()
            ),
        }
    }

    if let Some(milestone) = outcome.milestone {
        let event = match milestone {
            Milestone::AlmostComplete { remaining_minutes } => {
                log_info!("Work almost complete: {} minutes remaining", remaining_minutes);
                MonitorEvent::WorkAlmostComplete {
                    session_id: session_id.to_string(),
                    remaining_minutes,
                }
            }
            Milestone::Complete => {
                log_info!("Work complete for workday {}", session_id);
                MonitorEvent::WorkComplete {
                    session_id: session_id.to_string(),
                }
            }
        };
        // Err only means nobody is subscribed right now.
        let _ = events.send(event);
    }

    progress.send_replace(Some(outcome.snapshot.clone()));
    drop(guard);

    Some(outcome.snapshot)
}

/// Time left until the wall clock reaches the next multiple of `period`
/// (counted from midnight). Re-derived before every sleep, so ticks stay on
/// whole minutes across sleep/resume and clock adjustments.
pub fn delay_until_next_tick(now: NaiveDateTime, period: Duration) -> Duration {
    let period_ms = period.as_millis().max(1);
    let since_midnight_ms = u128::from(now.num_seconds_from_midnight()) * 1000
        + u128::from(now.nanosecond() % 1_000_000_000) / 1_000_000;
    let into_period = since_midnight_ms % period_ms;
    Duration::from_millis((period_ms - into_period) as u64)
}
