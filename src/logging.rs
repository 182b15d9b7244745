//! Logging initialization
//!
//! Both binaries log through the `log` facade. The filter is read from
//! `GESTURE_VISION_LOG` (e.g. "debug", "info,gesture_vision=trace") and
//! falls back to `info`, or `debug` when verbose output is requested.

/// Environment variable holding the log filter
pub const LOG_ENV: &str = "GESTURE_VISION_LOG";

/// Initialize env_logger for a binary.
///
/// Safe to call more than once; later calls are ignored.
pub fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };

    let _ = env_logger::Builder::from_env(
        env_logger::Env::default().filter_or(LOG_ENV, default_level),
    )
    .format_timestamp_millis()
    .try_init();

    log::debug!("Logging initialized (default level: {})", default_level);
}
