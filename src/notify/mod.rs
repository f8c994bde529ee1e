//! Milestone events and their delivery to notification sinks.
//!
//! The monitor publishes [`MonitorEvent`]s on a broadcast channel and never
//! waits on delivery. Each sink gets its own forwarding task, so a slow or
//! failing sink only delays itself.

use std::{collections::HashSet, sync::Arc};

use anyhow::Result;
use serde::Serialize;
use tokio::{sync::broadcast, task::JoinHandle};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MonitorEvent {
    #[serde(rename_all = "camelCase")]
    WorkAlmostComplete {
        session_id: String,
        remaining_minutes: i64,
    },
    #[serde(rename_all = "camelCase")]
    WorkComplete { session_id: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MilestoneKind {
    AlmostComplete,
    Complete,
}

impl MonitorEvent {
    pub fn session_id(&self) -> &str {
        match self {
            MonitorEvent::WorkAlmostComplete { session_id, .. } => session_id,
            MonitorEvent::WorkComplete { session_id } => session_id,
        }
    }

    pub fn kind(&self) -> MilestoneKind {
        match self {
            MonitorEvent::WorkAlmostComplete { .. } => MilestoneKind::AlmostComplete,
            MonitorEvent::WorkComplete { .. } => MilestoneKind::Complete,
        }
    }

    /// Event name used by the desktop frontend.
    pub fn name(&self) -> &'static str {
        match self {
            MonitorEvent::WorkAlmostComplete { .. } => "work_almost_complete",
            MonitorEvent::WorkComplete { .. } => "work_complete",
        }
    }

    pub fn notification(&self) -> Notification {
        match self {
            MonitorEvent::WorkAlmostComplete {
                remaining_minutes, ..
            } => Notification {
                title: "⏰ Quase Acabando!".into(),
                message: format!(
                    "Faltam apenas {} minutos para completar sua jornada!",
                    remaining_minutes
                ),
            },
            MonitorEvent::WorkComplete { .. } => Notification {
                title: "🎉 Jornada Completa!".into(),
                message: "Parabéns! Você completou suas 8 horas de trabalho. Tenha um ótimo resto do dia!"
                    .into(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub title: String,
    pub message: String,
}

/// Something that renders milestone notifications (native toast, overlay,
/// terminal). Implementations may block; they run off the tick loop.
pub trait NotificationSink: Send + Sync + 'static {
    fn deliver(&self, event: &MonitorEvent, notification: &Notification) -> Result<()>;
}

/// Writes notifications to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn deliver(&self, event: &MonitorEvent, notification: &Notification) -> Result<()> {
        log::info!(
            "[{}] {} - {}",
            event.name(),
            notification.title,
            notification.message
        );
        Ok(())
    }
}

/// Remembers which milestones were already delivered per session.
#[derive(Debug, Default)]
pub struct DeliveryLedger {
    delivered: HashSet<(String, MilestoneKind)>,
}

impl DeliveryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true the first time an event's (session, milestone) is seen.
    pub fn first_delivery(&mut self, event: &MonitorEvent) -> bool {
        self.delivered
            .insert((event.session_id().to_string(), event.kind()))
    }
}

/// Spawns a task that feeds events from `rx` into `sink`, dropping duplicates.
/// The task ends when the sending side is dropped.
pub fn spawn_notification_forwarder(
    mut rx: broadcast::Receiver<MonitorEvent>,
    sink: Arc<dyn NotificationSink>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ledger = DeliveryLedger::new();
        loop {
            let event = match rx.recv().await {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    log_warn!("notification forwarder lagged, {} events skipped", skipped);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };

            if !ledger.first_delivery(&event) {
                log_info!(
                    "duplicate {} for session {} ignored",
                    event.name(),
                    event.session_id()
                );
                continue;
            }

            let sink = Arc::clone(&sink);
            let notification = event.notification();
            let delivery = tokio::task::spawn_blocking(move || sink.deliver(&event, &notification));
            match delivery.await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => log::error!("notification delivery failed: {err:?}"),
                Err(err) => log::error!("notification sink panicked: {err}"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        seen: Mutex<Vec<MonitorEvent>>,
    }

    impl NotificationSink for RecordingSink {
        fn deliver(&self, event: &MonitorEvent, _notification: &Notification) -> Result<()> {
            self.seen.lock().unwrap().push(event.clone());
            Ok(())
        }
    }

    struct FailingSink;

    impl NotificationSink for FailingSink {
        fn deliver(&self, _event: &MonitorEvent, _notification: &Notification) -> Result<()> {
            anyhow::bail!("display unavailable")
        }
    }

    fn complete(session: &str) -> MonitorEvent {
        MonitorEvent::WorkComplete {
            session_id: session.into(),
        }
    }

    #[test]
    fn serializes_with_frontend_names() {
        let event = MonitorEvent::WorkAlmostComplete {
            session_id: "abc".into(),
            remaining_minutes: 3,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "work_almost_complete");
        assert_eq!(json["remainingMinutes"], 3);
        assert_eq!(json["sessionId"], "abc");
        assert_eq!(event.name(), "work_almost_complete");
    }

    #[test]
    fn notification_texts() {
        let almost = MonitorEvent::WorkAlmostComplete {
            session_id: "abc".into(),
            remaining_minutes: 2,
        };
        assert_eq!(
            almost.notification().message,
            "Faltam apenas 2 minutos para completar sua jornada!"
        );
        assert_eq!(complete("abc").notification().title, "🎉 Jornada Completa!");
    }

    #[test]
    fn ledger_is_per_session_and_kind() {
        let mut ledger = DeliveryLedger::new();
        assert!(ledger.first_delivery(&complete("a")));
        assert!(!ledger.first_delivery(&complete("a")));
        assert!(ledger.first_delivery(&complete("b")));
        assert!(ledger.first_delivery(&MonitorEvent::WorkAlmostComplete {
            session_id: "a".into(),
            remaining_minutes: 1,
        }));
    }

    #[tokio::test]
    async fn forwarder_drops_duplicates() {
        let (tx, rx) = broadcast::channel(8);
        let sink = Arc::new(RecordingSink::default());
        let handle = spawn_notification_forwarder(rx, sink.clone());

        tx.send(complete("a")).unwrap();
        tx.send(complete("a")).unwrap();
        tx.send(complete("b")).unwrap();
        drop(tx);
        handle.await.unwrap();

        assert_eq!(*sink.seen.lock().unwrap(), vec![complete("a"), complete("b")]);
    }

    #[tokio::test]
    async fn forwarder_survives_sink_errors() {
        let (tx, rx) = broadcast::channel(8);
        let handle = spawn_notification_forwarder(rx, Arc::new(FailingSink));

        tx.send(complete("a")).unwrap();
        tx.send(complete("b")).unwrap();
        drop(tx);
        handle.await.unwrap();
    }
}
