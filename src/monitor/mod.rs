pub mod clock;
pub mod commands;
pub mod config;
pub mod controller;
pub mod state;

pub use clock::{Clock, SystemClock};
pub use config::MonitorConfig;
pub use controller::{delay_until_next_tick, WorkMonitor};
pub use state::{MonitorSession, MonitorStatus};
