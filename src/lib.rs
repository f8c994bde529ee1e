pub mod error;
pub mod monitor;
pub mod notify;
pub mod progress;
pub mod store;
pub mod timesheet;
mod utils;

use std::{env, path::PathBuf, sync::Arc};

use anyhow::{bail, Context, Result};
use log::{error, info};
use tokio::sync::{watch, Mutex};

use monitor::{
    commands::{load_session_times, start_work_monitoring, stop_work_monitoring},
    MonitorConfig, WorkMonitor,
};
use notify::{spawn_notification_forwarder, LogSink};
use progress::format_status;
use store::{spawn_persister, JsonFileStore, SessionStore};
use timesheet::SessionTimes;

pub use error::{MonitorError, ValidationError};

const STORE_FILE: &str = "noponto.json";

/// Everything a host shell needs to drive the monitor.
pub struct AppState {
    pub(crate) monitor: WorkMonitor,
    pub(crate) store: Arc<dyn SessionStore>,
    /// Times as currently typed, before monitoring picks them up.
    pub(crate) draft: Mutex<SessionTimes>,
    pub(crate) persist: watch::Sender<Option<SessionTimes>>,
}

impl AppState {
    /// Must be called inside a tokio runtime: spawns the store writer.
    pub fn new(monitor: WorkMonitor, store: Arc<dyn SessionStore>) -> Self {
        let persist = spawn_persister(store.clone());
        Self {
            monitor,
            store,
            draft: Mutex::new(SessionTimes::default()),
            persist,
        }
    }

    pub fn monitor(&self) -> &WorkMonitor {
        &self.monitor
    }
}

fn data_dir() -> PathBuf {
    env::var_os("NOPONTO_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}

fn print_usage() {
    println!("usage: noponto [START1 END1 START2]");
    println!();
    println!("Monitors an 8-hour workday split by a break. Times are HH:MM.");
    println!("Without arguments the last saved times are used.");
}

async fn run_headless(args: Vec<String>) -> Result<()> {
    let config = MonitorConfig::from_env();
    let store_path = data_dir().join(STORE_FILE);
    let store = JsonFileStore::new(store_path.clone())
        .with_context(|| format!("opening {}", store_path.display()))?;

    let state = AppState::new(WorkMonitor::new(config), Arc::new(store));
    let forwarder = spawn_notification_forwarder(state.monitor.subscribe(), Arc::new(LogSink));
    let mut progress = state.monitor.subscribe_progress();

    let times = match args.as_slice() {
        [start1, end1, start2] => SessionTimes::new(start1.as_str(), end1.as_str(), start2.as_str()),
        [] => load_session_times(&state).await.map_err(anyhow::Error::msg)?,
        _ => {
            print_usage();
            bail!("expected three times or none");
        }
    };

    start_work_monitoring(&state, times.start1, times.end1, times.start2)
        .await
        .map_err(anyhow::Error::msg)?;

    loop {
        tokio::select! {
            changed = progress.changed() => {
                if changed.is_err() {
                    break;
                }
                if let Some(snapshot) = progress.borrow_and_update().clone() {
                    println!("{}", format_status(&snapshot));
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, stopping monitor");
                break;
            }
        }
    }

    stop_work_monitoring(&state).await.map_err(anyhow::Error::msg)?;
    forwarder.abort();
    Ok(())
}

pub fn run() {
    // Initialize logging (RUST_LOG overrides the default level)
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = env::args().skip(1).collect();
    if args.iter().any(|arg| arg == "-h" || arg == "--help") {
        print_usage();
        return;
    }

    info!("NoPonto starting up...");

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(err) => {
            error!("failed to start async runtime: {err}");
            std::process::exit(1);
        }
    };

    if let Err(err) = runtime.block_on(run_headless(args)) {
        error!("{err:#}");
        std::process::exit(1);
    }
}
