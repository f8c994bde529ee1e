use std::{env, str::FromStr, time::Duration};

use log::warn;

use crate::progress::DEFAULT_TARGET_MINUTES;

/// Tunables for the work monitor.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Ticks are aligned to multiples of this period on the wall clock.
    pub tick_period: Duration,

    /// "Almost complete" fires once remaining minutes fall to this value.
    pub almost_complete_minutes: i64,

    /// Length of the workday.
    pub target_minutes: i64,

    /// Buffer size of the milestone event channel.
    pub event_capacity: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            tick_period: Duration::from_secs(60),
            almost_complete_minutes: 3,
            target_minutes: DEFAULT_TARGET_MINUTES,
            event_capacity: 32,
        }
    }
}

impl MonitorConfig {
    /// Defaults overridden by `NOPONTO_*` environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        let debug_mode = env::var("NOPONTO_DEBUG")
            .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        if debug_mode {
            config.tick_period = Duration::from_secs(1);
        }

        if let Some(secs) = read_var::<u64>("NOPONTO_TICK_SECS").filter(|secs| *secs > 0) {
            config.tick_period = Duration::from_secs(secs);
        }
        if let Some(minutes) = read_var::<i64>("NOPONTO_ALMOST_COMPLETE_MINUTES") {
            config.almost_complete_minutes = minutes;
        }
        if let Some(minutes) = read_var::<i64>("NOPONTO_TARGET_MINUTES").filter(|m| *m > 0) {
            config.target_minutes = minutes;
        }

        config
    }
}

fn read_var<T: FromStr>(name: &str) -> Option<T> {
    let raw = env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("ignoring {name}={raw:?}: not a valid number");
            None
        }
    }
}
