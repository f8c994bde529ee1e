use serde::Serialize;

use crate::{
    progress::ProgressSnapshot,
    store::SESSION_TIMES_KEY,
    timesheet::{normalize, validate_sequence, SequenceValidation, SessionTimes, TimeField},
    AppState,
};

use super::{MonitorStatus, WorkMonitor};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldUpdate {
    pub field: TimeField,
    pub value: String,
    pub validation: SequenceValidation,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkStatus {
    pub status: MonitorStatus,
    pub times: Option<SessionTimes>,
    pub progress: Option<ProgressSnapshot>,
}

fn monitor_from_state(state: &AppState) -> WorkMonitor {
    state.monitor.clone()
}

/// Queues `times` for the background writer; never waits for the disk.
fn persist_in_background(state: &AppState, times: SessionTimes) {
    state.persist.send_replace(Some(times));
}

/// Loads the stored times (normalized) into the editing draft.
pub async fn load_session_times(state: &AppState) -> Result<SessionTimes, String> {
    let store = state.store.clone();
    let loaded = tokio::task::spawn_blocking(move || store.get(SESSION_TIMES_KEY))
        .await
        .map_err(|e| e.to_string())?
        .map_err(|e| e.to_string())?
        .unwrap_or_default()
        .normalized();

    *state.draft.lock().await = loaded.clone();
    Ok(loaded)
}

/// Applies one keystroke's worth of input to a field.
pub async fn update_time_field(
    state: &AppState,
    field: String,
    raw: String,
) -> Result<FieldUpdate, String> {
    let field = field.parse::<TimeField>().map_err(|e| e.to_string())?;
    let value = normalize(&raw);

    let times = {
        let mut draft = state.draft.lock().await;
        *draft.field_mut(field) = value.clone();
        draft.clone()
    };

    let validation = validate_sequence(&times);
    persist_in_background(state, times);

    Ok(FieldUpdate {
        field,
        value,
        validation,
    })
}

pub async fn start_work_monitoring(
    state: &AppState,
    start1: String,
    end1: String,
    start2: String,
) -> Result<(), String> {
    let times = SessionTimes::new(start1, end1, start2).normalized();
    *state.draft.lock().await = times.clone();
    persist_in_background(state, times.clone());

    let monitor = monitor_from_state(state);
    monitor.start(times).await.map_err(|e| e.to_string())
}

pub async fn stop_work_monitoring(state: &AppState) -> Result<(), String> {
    let monitor = monitor_from_state(state);
    monitor.stop().await;
    Ok(())
}

pub async fn get_work_status(state: &AppState) -> Result<WorkStatus, String> {
    let monitor = monitor_from_state(state);
    Ok(WorkStatus {
        status: monitor.status().await,
        times: monitor.session_times().await,
        progress: monitor.get_snapshot().await,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        monitor::MonitorConfig,
        store::{MemoryStore, SessionStore},
    };
    use std::{sync::Arc, time::Duration};

    fn app_state() -> (AppState, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let state = AppState::new(WorkMonitor::new(MonitorConfig::default()), store.clone());
        (state, store)
    }

    async fn wait_for_stored(store: &MemoryStore, expected: &SessionTimes) -> bool {
        for _ in 0..100 {
            if store.get(SESSION_TIMES_KEY).unwrap().as_ref() == Some(expected) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }

    #[tokio::test]
    async fn keystrokes_are_normalized_and_persisted() {
        let (state, store) = app_state();

        let update = update_time_field(&state, "start1".into(), "0 8 3 0".into())
            .await
            .unwrap();
        assert_eq!(update.value, "08:30");
        assert!(!update.validation.is_valid);

        update_time_field(&state, "end1".into(), "1200".into()).await.unwrap();
        let update = update_time_field(&state, "start2".into(), "1300".into())
            .await
            .unwrap();
        assert!(update.validation.is_valid);

        assert!(wait_for_stored(&store, &SessionTimes::new("08:30", "12:00", "13:00")).await);
    }

    #[tokio::test]
    async fn unknown_field_is_an_error() {
        let (state, _) = app_state();
        assert!(update_time_field(&state, "lunch".into(), "12".into())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn load_normalizes_stored_values() {
        let (state, store) = app_state();
        store
            .set(SESSION_TIMES_KEY, &SessionTimes::new("0800", "12:00", "x13:00"))
            .unwrap();

        let loaded = load_session_times(&state).await.unwrap();
        assert_eq!(loaded, SessionTimes::new("08:00", "12:00", "13:00"));
    }

    #[tokio::test]
    async fn start_rejects_bad_order_and_reports_status() {
        let (state, _) = app_state();

        let err = start_work_monitoring(&state, "08:00".into(), "12:00".into(), "11:00".into())
            .await
            .unwrap_err();
        assert!(err.contains("start2"));

        let status = get_work_status(&state).await.unwrap();
        assert_eq!(status.status, MonitorStatus::Idle);
        assert!(status.progress.is_none());
    }

    #[tokio::test]
    async fn start_and_stop() {
        let (state, store) = app_state();

        start_work_monitoring(&state, "0800".into(), "1200".into(), "1300".into())
            .await
            .unwrap();
        let status = get_work_status(&state).await.unwrap();
        assert_eq!(status.status, MonitorStatus::Active);
        assert_eq!(status.times, Some(SessionTimes::new("08:00", "12:00", "13:00")));
        assert!(wait_for_stored(&store, &SessionTimes::new("08:00", "12:00", "13:00")).await);

        stop_work_monitoring(&state).await.unwrap();
        let status = get_work_status(&state).await.unwrap();
        assert_eq!(status.status, MonitorStatus::Stopped);
        assert!(status.times.is_none());
    }
}
