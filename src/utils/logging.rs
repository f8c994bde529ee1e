//! Logging macros gated by a module-level switch.
//!
//! A module opts in by declaring the switch and importing the macros from
//! the crate root:
//!
//! ```ignore
//! const ENABLE_LOGS: bool = true;
//! use crate::{log_error, log_info, log_warn};
//!
//! log_warn!("tick skipped: {}", reason);
//! ```
//!
//! Flipping `ENABLE_LOGS` to false silences the background loops of that
//! module without touching `RUST_LOG`.

#[doc(hidden)]
#[macro_export]
macro_rules! log_gated {
    ($level:ident, $($arg:tt)*) => {
        if ENABLE_LOGS {
            log::$level!($($arg)*);
        }
    };
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => { $crate::log_gated!(info, $($arg)*) };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => { $crate::log_gated!(warn, $($arg)*) };
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => { $crate::log_gated!(error, $($arg)*) };
}
