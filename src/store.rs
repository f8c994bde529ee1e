use anyhow::{anyhow, Context, Result};
use serde_json::{Map, Value};
use std::{
    collections::HashMap,
    fs,
    path::PathBuf,
    sync::{Arc, RwLock},
};
use tokio::sync::watch;

use crate::timesheet::SessionTimes;

/// Key the desktop app used for the workday times.
pub const SESSION_TIMES_KEY: &str = "timeData";

/// Durable key-value storage for session times.
pub trait SessionStore: Send + Sync + 'static {
    fn get(&self, key: &str) -> Result<Option<SessionTimes>>;
    fn set(&self, key: &str, times: &SessionTimes) -> Result<()>;
}

/// Spawns the single writer for `store`. Send the latest times on the
/// returned channel; writes happen in order and intermediate values that
/// were superseded before being written are skipped.
pub fn spawn_persister(store: Arc<dyn SessionStore>) -> watch::Sender<Option<SessionTimes>> {
    let (tx, mut rx) = watch::channel::<Option<SessionTimes>>(None);
    tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let Some(times) = rx.borrow_and_update().clone() else {
                continue;
            };
            let store = Arc::clone(&store);
            let written = tokio::task::spawn_blocking(move || store.set(SESSION_TIMES_KEY, &times)).await;
            match written {
                Ok(Ok(())) => {}
                Ok(Err(err)) => log::error!("failed to persist session times: {err:?}"),
                Err(err) => log::error!("session persister panicked: {err}"),
            }
        }
    });
    tx
}

#[derive(Default)]
pub struct MemoryStore {
    data: RwLock<HashMap<String, SessionTimes>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<SessionTimes>> {
        let guard = self.data.read().map_err(|_| anyhow!("store lock poisoned"))?;
        Ok(guard.get(key).cloned())
    }

    fn set(&self, key: &str, times: &SessionTimes) -> Result<()> {
        let mut guard = self.data.write().map_err(|_| anyhow!("store lock poisoned"))?;
        guard.insert(key.to_string(), times.clone());
        Ok(())
    }
}

/// A JSON object on disk, rewritten on every `set`. Keys it does not
/// understand are preserved.
pub struct JsonFileStore {
    path: PathBuf,
    data: RwLock<Map<String, Value>>,
}

impl JsonFileStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read store from {}", path.display()))?;
            match serde_json::from_str(&contents) {
                Ok(data) => data,
                Err(err) => {
                    log::warn!("ignoring unreadable store {}: {err}", path.display());
                    Map::new()
                }
            }
        } else {
            Map::new()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    fn persist(&self, data: &Map<String, Value>) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write store to {}", self.path.display()))
    }
}

impl SessionStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<SessionTimes>> {
        let guard = self.data.read().map_err(|_| anyhow!("store lock poisoned"))?;
        match guard.get(key) {
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .with_context(|| format!("stored {key} is not a session")),
            None => Ok(None),
        }
    }

    fn set(&self, key: &str, times: &SessionTimes) -> Result<()> {
        let mut guard = self.data.write().map_err(|_| anyhow!("store lock poisoned"))?;
        guard.insert(key.to_string(), serde_json::to_value(times)?);
        self.persist(&guard)
    }
}
